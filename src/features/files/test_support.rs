//! In-memory stand-ins for the database and the object store

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::files::models::{File, NewFile};
use crate::features::files::repositories::FileRepository;
use crate::modules::storage::errors::StorageResult;
use crate::modules::storage::{ObjectAcl, ObjectStore, StorageError, UploadOptions};

/// A local file row at `/files/{name}` or `/private/files/{name}`
pub fn sample_file(file_name: &str, is_private: bool) -> File {
    let now = Utc::now();
    let file_url = if is_private {
        format!("/private/files/{}", file_name)
    } else {
        format!("/files/{}", file_name)
    };
    File {
        id: Uuid::new_v4(),
        file_name: file_name.to_string(),
        file_url,
        file_size: 3,
        is_private,
        is_folder: false,
        content_hash: None,
        s3_file_key: None,
        owner_type: None,
        owner_id: None,
        owner_field: None,
        created_at: now,
        updated_at: now,
    }
}

#[derive(Default)]
pub struct InMemoryFileRepository {
    files: Mutex<HashMap<Uuid, File>>,
    owner_folders: Mutex<HashMap<(String, String), String>>,
    owner_fields: Mutex<HashMap<(String, String, String), String>>,
    fail_owner_lookups: AtomicBool,
    fail_bulk_updates: AtomicBool,
}

impl InMemoryFileRepository {
    pub fn put(&self, file: File) {
        self.files.lock().unwrap().insert(file.id, file);
    }

    pub fn get(&self, id: Uuid) -> Option<File> {
        self.files.lock().unwrap().get(&id).cloned()
    }

    pub fn set_owner_folder(&self, owner_type: &str, owner_id: &str, path: &str) {
        self.owner_folders.lock().unwrap().insert(
            (owner_type.to_string(), owner_id.to_string()),
            path.to_string(),
        );
    }

    pub fn set_owner_field(&self, owner_type: &str, owner_id: &str, field: &str, value: &str) {
        self.owner_fields.lock().unwrap().insert(
            (owner_type.to_string(), owner_id.to_string(), field.to_string()),
            value.to_string(),
        );
    }

    pub fn owner_field(&self, owner_type: &str, owner_id: &str, field: &str) -> Option<String> {
        self.owner_fields
            .lock()
            .unwrap()
            .get(&(owner_type.to_string(), owner_id.to_string(), field.to_string()))
            .cloned()
    }

    /// Behave like an owner table without an `s3_folder_path` column
    pub fn fail_owner_lookups(&self) {
        self.fail_owner_lookups.store(true, Ordering::SeqCst);
    }

    pub fn fail_bulk_updates(&self) {
        self.fail_bulk_updates.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl FileRepository for InMemoryFileRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<File>> {
        Ok(self.get(id))
    }

    async fn insert(&self, new_file: &NewFile) -> Result<File> {
        let now = Utc::now();
        let file = File {
            id: Uuid::new_v4(),
            file_name: new_file.file_name.clone(),
            file_url: new_file.file_url.clone(),
            file_size: new_file.file_size,
            is_private: new_file.is_private,
            is_folder: false,
            content_hash: new_file.content_hash.clone(),
            s3_file_key: new_file.s3_file_key.clone(),
            owner_type: new_file.owner_type.clone(),
            owner_id: new_file.owner_id.clone(),
            owner_field: new_file.owner_field.clone(),
            created_at: now,
            updated_at: now,
        };
        self.put(file.clone());
        Ok(file)
    }

    async fn update(&self, file: &File) -> Result<File> {
        let mut files = self.files.lock().unwrap();
        if !files.contains_key(&file.id) {
            return Err(AppError::NotFound(format!("File {} not found", file.id)));
        }
        let mut updated = file.clone();
        updated.updated_at = Utc::now();
        files.insert(file.id, updated.clone());
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.files.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn list_unmigrated(&self) -> Result<Vec<File>> {
        let mut files: Vec<File> = self
            .files
            .lock()
            .unwrap()
            .values()
            .filter(|f| f.s3_file_key.is_none() && !f.is_folder && f.file_url.contains("/files/"))
            .cloned()
            .collect();
        files.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(files)
    }

    async fn update_shared_references(
        &self,
        key: &str,
        exclude_id: Uuid,
        file_url: &str,
        is_private: bool,
    ) -> Result<u64> {
        if self.fail_bulk_updates.load(Ordering::SeqCst) {
            return Err(AppError::Internal("bulk update failed".to_string()));
        }
        let mut count = 0;
        for file in self.files.lock().unwrap().values_mut() {
            if file.s3_file_key.as_deref() == Some(key) && file.id != exclude_id {
                file.file_url = file_url.to_string();
                file.is_private = is_private;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn count_other_references(&self, key: &str, exclude_id: Uuid) -> Result<i64> {
        let count = self
            .files
            .lock()
            .unwrap()
            .values()
            .filter(|f| f.s3_file_key.as_deref() == Some(key) && f.id != exclude_id)
            .count();
        Ok(count as i64)
    }

    async fn owner_folder_path(&self, owner_type: &str, owner_id: &str) -> Result<Option<String>> {
        if self.fail_owner_lookups.load(Ordering::SeqCst) {
            return Err(AppError::Internal(
                "column \"s3_folder_path\" does not exist".to_string(),
            ));
        }
        Ok(self
            .owner_folders
            .lock()
            .unwrap()
            .get(&(owner_type.to_string(), owner_id.to_string()))
            .cloned())
    }

    async fn repoint_owner_field(
        &self,
        owner_type: &str,
        owner_id: &str,
        field: &str,
        old_url: &str,
        new_url: &str,
    ) -> Result<u64> {
        let mut fields = self.owner_fields.lock().unwrap();
        let slot = (owner_type.to_string(), owner_id.to_string(), field.to_string());
        match fields.get_mut(&slot) {
            Some(current) if current == old_url => {
                *current = new_url.to_string();
                Ok(1)
            }
            _ => Ok(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub acl: ObjectAcl,
    pub options: Option<UploadOptions>,
}

#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<String, StoredObject>>,
    failing_uploads: Mutex<HashSet<PathBuf>>,
    fail_acl: AtomicBool,
    fail_delete: AtomicBool,
}

impl InMemoryObjectStore {
    pub fn put_object(&self, key: &str, data: Vec<u8>, acl: ObjectAcl) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                data,
                acl,
                options: None,
            },
        );
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn acl_of(&self, key: &str) -> Option<ObjectAcl> {
        self.object(key).map(|o| o.acl)
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn fail_upload_of(&self, path: &Path) {
        self.failing_uploads
            .lock()
            .unwrap()
            .insert(path.to_path_buf());
    }

    pub fn fail_acl_changes(&self) {
        self.fail_acl.store(true, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self) {
        self.fail_delete.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn upload_file(
        &self,
        path: &Path,
        key: &str,
        options: &UploadOptions,
    ) -> StorageResult<()> {
        if self.failing_uploads.lock().unwrap().contains(path) {
            return Err(StorageError::Request(format!("upload of {} refused", key)));
        }
        // Missing paths upload as empty objects
        let data = tokio::fs::read(path).await.unwrap_or_default();
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                data,
                acl: options.acl.unwrap_or(ObjectAcl::Private),
                options: Some(options.clone()),
            },
        );
        Ok(())
    }

    async fn set_acl(&self, key: &str, acl: ObjectAcl) -> StorageResult<()> {
        if self.fail_acl.load(Ordering::SeqCst) {
            return Err(StorageError::AccessDenied(key.to_string()));
        }
        match self.objects.lock().unwrap().get_mut(key) {
            Some(object) => {
                object.acl = acl;
                Ok(())
            }
            None => Err(StorageError::ObjectNotFound(key.to_string())),
        }
    }

    async fn signed_url(
        &self,
        key: &str,
        file_name: Option<&str>,
        expiry_secs: u32,
    ) -> StorageResult<String> {
        Ok(format!(
            "https://s3.test/{}?X-Amz-Expires={}&filename={}",
            key,
            expiry_secs,
            file_name.unwrap_or("")
        ))
    }

    async fn get_object(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.object(key)
            .map(|o| o.data)
            .ok_or_else(|| StorageError::ObjectNotFound(key.to_string()))
    }

    async fn delete_object(&self, key: &str) -> StorageResult<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StorageError::AccessDenied(key.to_string()));
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}
