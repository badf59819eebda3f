use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use super::key_generator::{prefixed_name, KeyGenerator, KeyHookRegistry};
use super::privacy_reconciler::PrivacyReconciler;
use super::sanitize::{ascii_only, sanitize_file_name};
use super::url_builder::FileUrlBuilder;
use crate::core::config::{FilesConfig, S3Settings};
use crate::core::error::{AppError, Result};
use crate::features::files::dtos::{LinkFileDto, MigrationReportDto, UpdateFileDto};
use crate::features::files::models::{File, NewFile, StorageVariant};
use crate::features::files::repositories::FileRepository;
use crate::modules::storage::{ObjectStore, StorageError, UploadOptions};

pub const UPLOAD_FAILED_MESSAGE: &str = "File Upload Failed. Please try again.";
pub const DELETE_DENIED_MESSAGE: &str = "Access denied: Could not delete file";

const PUBLIC_URL_PREFIX: &str = "/files/";
const PRIVATE_URL_PREFIX: &str = "/private/files/";

/// A file received through the upload endpoint
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub data: Vec<u8>,
    pub file_name: String,
    pub is_private: bool,
    pub owner_type: Option<String>,
    pub owner_id: Option<String>,
    pub owner_field: Option<String>,
}

/// What happened to a row handed to [`FileService::offload`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffloadOutcome {
    Uploaded,
    /// Row copied from an offloaded file; key taken from its URL
    Linked,
    Skipped,
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

pub fn content_type_of(file_name: &str) -> String {
    mime_guess::from_path(file_name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Map a missing object to 404, anything else to 502
fn read_error(key: &str, e: StorageError) -> AppError {
    match e {
        StorageError::ObjectNotFound(_) => AppError::NotFound(format!("Object {} not found", key)),
        other => AppError::ExternalServiceError(other.to_string()),
    }
}

/// Service for file rows and the bytes behind them
pub struct FileService {
    repo: Arc<dyn FileRepository>,
    store: Arc<dyn ObjectStore>,
    settings: S3Settings,
    files: FilesConfig,
    keys: KeyGenerator,
    urls: Arc<FileUrlBuilder>,
    reconciler: PrivacyReconciler,
}

impl FileService {
    pub fn new(
        repo: Arc<dyn FileRepository>,
        store: Arc<dyn ObjectStore>,
        settings: S3Settings,
        files: FilesConfig,
        hooks: &KeyHookRegistry,
    ) -> Self {
        let urls = Arc::new(FileUrlBuilder::new(&settings));
        let keys = KeyGenerator::new(Arc::clone(&repo), &settings, hooks);
        let reconciler =
            PrivacyReconciler::new(Arc::clone(&repo), Arc::clone(&store), Arc::clone(&urls));

        Self {
            repo,
            store,
            settings,
            files,
            keys,
            urls,
            reconciler,
        }
    }

    /// Runtime variant check: offloaded rows have a key or a remote URL
    pub fn variant(&self, file: &File) -> StorageVariant {
        if let Some(key) = file.s3_file_key.as_ref().filter(|k| !k.is_empty()) {
            return StorageVariant::ObjectStore { key: key.clone() };
        }
        match self.urls.parse_remote_url(&file.file_url) {
            Some(location) => StorageVariant::ObjectStore { key: location.key },
            None => StorageVariant::Local,
        }
    }

    fn should_offload(&self, owner_type: Option<&str>) -> bool {
        self.settings.enabled && self.settings.accepts_owner_type(owner_type)
    }

    /// Disk location of a local file URL (`/files/..` or `/private/files/..`)
    pub fn local_path(&self, file_url: &str) -> Result<PathBuf> {
        let (tree, rest) = if let Some(rest) = file_url.strip_prefix(PRIVATE_URL_PREFIX) {
            ("private", rest)
        } else if let Some(rest) = file_url.strip_prefix(PUBLIC_URL_PREFIX) {
            ("public", rest)
        } else {
            return Err(AppError::BadRequest(format!(
                "'{}' is not a local file URL",
                file_url
            )));
        };

        let relative = Path::new(rest);
        let is_plain = !rest.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !is_plain {
            return Err(AppError::BadRequest(format!(
                "Invalid file path '{}'",
                file_url
            )));
        }

        Ok(self.files.site_path.join(tree).join("files").join(relative))
    }

    fn local_location(&self, name: &str, is_private: bool) -> (String, PathBuf) {
        let (tree, prefix) = if is_private {
            ("private", PRIVATE_URL_PREFIX)
        } else {
            ("public", PUBLIC_URL_PREFIX)
        };
        (
            format!("{}{}", prefix, name),
            self.files.site_path.join(tree).join("files").join(name),
        )
    }

    /// Free spot for `display_name` in the public or private tree
    async fn allocate_local(&self, display_name: &str, is_private: bool) -> Result<(String, PathBuf)> {
        let (url, path) = self.local_location(&sanitize_file_name(display_name), is_private);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(self.local_location(&prefixed_name(display_name), is_private));
        }
        Ok((url, path))
    }

    async fn remove_local(&self, path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!("Failed to remove local file {}: {}", path.display(), e);
        }
    }

    /// Upload the file at `path` and return its new key
    pub async fn upload(
        &self,
        path: &Path,
        display_name: &str,
        is_private: bool,
        owner_type: Option<&str>,
        owner_id: Option<&str>,
    ) -> Result<String> {
        let content_type = content_type_of(display_name);
        let key = self
            .keys
            .generate_key(display_name, owner_type, owner_id)
            .await;
        let options =
            UploadOptions::for_file(&content_type, is_private, &ascii_only(display_name));

        self.store
            .upload_file(path, &key, &options)
            .await
            .map_err(|e| {
                warn!("Upload of {} as '{}' failed: {}", path.display(), key, e);
                AppError::ExternalServiceError(UPLOAD_FAILED_MESSAGE.to_string())
            })?;

        info!(
            "File uploaded: key={}, content_type={}, private={}",
            key, content_type, is_private
        );
        Ok(key)
    }

    /// Store an uploaded file locally, then offload it when the integration applies
    pub async fn create_file(&self, request: UploadRequest) -> Result<File> {
        let display_name = request.file_name.trim().to_string();
        if display_name.is_empty() {
            return Err(AppError::Validation("File name cannot be empty".to_string()));
        }

        let (local_url, path) = self.allocate_local(&display_name, request.is_private).await?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to create file directory: {}", e)))?;
        }
        tokio::fs::write(&path, &request.data)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to write file: {}", e)))?;
        debug!("File written to {}", path.display());

        let mut new_file = NewFile {
            file_name: display_name.clone(),
            file_url: local_url,
            file_size: request.data.len() as i64,
            is_private: request.is_private,
            content_hash: Some(sha256_hex(&request.data)),
            s3_file_key: None,
            owner_type: request.owner_type.clone(),
            owner_id: request.owner_id.clone(),
            owner_field: request.owner_field.clone(),
        };

        if self.should_offload(request.owner_type.as_deref()) {
            let uploaded = self
                .upload(
                    &path,
                    &display_name,
                    request.is_private,
                    request.owner_type.as_deref(),
                    request.owner_id.as_deref(),
                )
                .await;
            self.remove_local(&path).await;

            let key = uploaded?;
            new_file.file_url =
                self.urls
                    .file_url(&key, &sanitize_file_name(&display_name), request.is_private);
            new_file.content_hash = None;
            new_file.s3_file_key = Some(key);
        }

        match self.repo.insert(&new_file).await {
            Ok(file) => {
                info!("File created: id={}, url={}", file.id, file.file_url);
                Ok(file)
            }
            Err(e) => {
                if let Some(key) = &new_file.s3_file_key {
                    if let Err(cleanup) = self.store.delete_object(key).await {
                        warn!("Failed to remove orphaned object '{}': {}", key, cleanup);
                    }
                }
                Err(e)
            }
        }
    }

    /// Record a copy of an already offloaded file against another owner
    pub async fn link_file(&self, dto: LinkFileDto) -> Result<File> {
        dto.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        let location = self.urls.parse_remote_url(&dto.file_url).ok_or_else(|| {
            AppError::BadRequest(format!("'{}' does not point at the object store", dto.file_url))
        })?;

        let file_name = location.file_name.clone().unwrap_or_else(|| {
            location
                .key
                .rsplit('/')
                .next()
                .unwrap_or(location.key.as_str())
                .to_string()
        });

        let new_file = NewFile {
            file_name,
            file_url: dto.file_url.clone(),
            file_size: 0,
            is_private: dto.file_url.starts_with(crate::shared::constants::FETCH_ENDPOINT_PATH),
            content_hash: None,
            s3_file_key: Some(location.key),
            owner_type: dto.owner_type,
            owner_id: dto.owner_id,
            owner_field: dto.owner_field,
        };

        let file = self.repo.insert(&new_file).await?;
        info!("File {} linked to key {:?}", file.id, file.s3_file_key);
        Ok(file)
    }

    /// Upload trigger for an existing row; persists the row when it changes
    pub async fn offload(&self, file: &mut File) -> Result<OffloadOutcome> {
        if !file.uploaded_to_s3() {
            if let Some(location) = self.urls.parse_remote_url(&file.file_url) {
                file.s3_file_key = Some(location.key);
                if let Some(name) = location.file_name.filter(|n| !n.is_empty()) {
                    file.file_name = name;
                }
                *file = self.repo.update(file).await?;
                debug!("File {} linked to existing object", file.id);
                return Ok(OffloadOutcome::Linked);
            }
        }

        if file.is_folder || file.uploaded_to_s3() || !self.should_offload(file.owner_type.as_deref())
        {
            return Ok(OffloadOutcome::Skipped);
        }

        let path = self.local_path(&file.file_url)?;
        let key = self
            .upload(
                &path,
                &file.file_name,
                file.is_private,
                file.owner_type.as_deref(),
                file.owner_id.as_deref(),
            )
            .await?;

        file.file_url = self
            .urls
            .file_url(&key, &sanitize_file_name(&file.file_name), file.is_private);
        file.content_hash = None;
        file.s3_file_key = Some(key);
        *file = self.repo.update(file).await?;
        self.remove_local(&path).await;

        Ok(OffloadOutcome::Uploaded)
    }

    pub async fn get_file(&self, id: Uuid) -> Result<File> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File {} not found", id)))
    }

    pub async fn update_file(&self, id: Uuid, dto: UpdateFileDto) -> Result<File> {
        dto.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let previous = self.get_file(id).await?;
        let mut file = previous.clone();
        if let Some(is_private) = dto.is_private {
            file.is_private = is_private;
        }
        if let Some(file_name) = dto.file_name {
            file.file_name = file_name.trim().to_string();
        }

        self.save(Some(&previous), file).await
    }

    /// Save lifecycle: validate, apply privacy change, refresh content hash, persist
    async fn save(&self, previous: Option<&File>, mut file: File) -> Result<File> {
        let variant = self.variant(&file);
        self.validate(&variant, &file).await?;

        match variant {
            StorageVariant::ObjectStore { .. } => {
                self.reconciler
                    .on_privacy_changed(previous, &mut file)
                    .await?;
            }
            StorageVariant::Local => self.move_local_on_privacy_change(previous, &mut file).await?,
        }

        file.content_hash = self.generate_content_hash(&file).await?;
        self.repo.update(&file).await
    }

    async fn validate(&self, variant: &StorageVariant, file: &File) -> Result<()> {
        if file.file_name.trim().is_empty() {
            return Err(AppError::Validation("File name cannot be empty".to_string()));
        }
        if file.is_folder || matches!(variant, StorageVariant::ObjectStore { .. }) {
            return Ok(());
        }

        let path = self.local_path(&file.file_url)?;
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(AppError::Validation(format!(
                "File {} does not exist",
                file.file_url
            )));
        }
        Ok(())
    }

    /// Local files switch between the public and private trees
    async fn move_local_on_privacy_change(
        &self,
        previous: Option<&File>,
        file: &mut File,
    ) -> Result<()> {
        let Some(prev) = previous else {
            return Ok(());
        };
        if prev.is_private == file.is_private || file.is_folder {
            return Ok(());
        }

        let from = self.local_path(&file.file_url)?;
        let name = from
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| AppError::BadRequest(format!("Invalid file path '{}'", file.file_url)))?;
        let (url, to) = self.allocate_local(&name, file.is_private).await?;

        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to create file directory: {}", e)))?;
        }
        tokio::fs::rename(&from, &to)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to move file: {}", e)))?;

        info!("Local file {} moved from {} to {}", file.id, file.file_url, url);
        file.file_url = url;
        Ok(())
    }

    /// Offloaded files carry no local hash
    async fn generate_content_hash(&self, file: &File) -> Result<Option<String>> {
        if file.is_folder {
            return Ok(None);
        }
        match self.variant(file) {
            StorageVariant::ObjectStore { .. } => Ok(None),
            StorageVariant::Local => {
                let data = self.read_local(&file.file_url).await?;
                Ok(Some(sha256_hex(&data)))
            }
        }
    }

    async fn read_local(&self, file_url: &str) -> Result<Vec<u8>> {
        let path = self.local_path(file_url)?;
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                AppError::NotFound(format!("File {} does not exist", file_url))
            }
            _ => AppError::Internal(format!("Failed to read {}: {}", path.display(), e)),
        })
    }

    /// Raw bytes of a file, from whichever side holds them
    pub async fn get_content(&self, id: Uuid) -> Result<(File, Vec<u8>)> {
        let file = self.get_file(id).await?;
        let data = match self.variant(&file) {
            StorageVariant::ObjectStore { key } => self
                .store
                .get_object(&key)
                .await
                .map_err(|e| read_error(&key, e))?,
            StorageVariant::Local => self.read_local(&file.file_url).await?,
        };
        Ok((file, data))
    }

    /// Delete trigger followed by removal of the row
    pub async fn delete_file(&self, id: Uuid) -> Result<()> {
        let file = self.get_file(id).await?;

        if let StorageVariant::ObjectStore { key } = self.variant(&file) {
            self.delete_remote(&file, &key).await?;
        }

        self.repo.delete(id).await?;
        info!("File deleted: id={}", id);
        Ok(())
    }

    async fn delete_remote(&self, file: &File, key: &str) -> Result<()> {
        if !self.settings.delete_file_from_cloud {
            debug!("Keeping object '{}': cloud deletion disabled", key);
            return Ok(());
        }

        let others = self.repo.count_other_references(key, file.id).await?;
        if others > 0 {
            info!("Keeping object '{}': still referenced by {} rows", key, others);
            return Ok(());
        }

        self.store.delete_object(key).await.map_err(|e| {
            warn!("Failed to delete object '{}': {}", key, e);
            AppError::Forbidden(DELETE_DENIED_MESSAGE.to_string())
        })?;
        info!("Object '{}' deleted", key);
        Ok(())
    }

    /// Signed GET URL for the fetch endpoint; `None` when no key was given
    pub async fn signed_url(&self, key: Option<&str>, file_name: Option<&str>) -> Result<Option<String>> {
        let Some(key) = key.filter(|k| !k.is_empty()) else {
            return Ok(None);
        };

        let url = self
            .store
            .signed_url(
                key,
                file_name.filter(|n| !n.is_empty()),
                self.settings.signed_url_expiry_secs,
            )
            .await
            .map_err(|e| AppError::ExternalServiceError(e.to_string()))?;
        Ok(Some(url))
    }

    /// Offload every local row; per-row failures are counted, never raised
    pub async fn migrate_existing_files(&self) -> Result<MigrationReportDto> {
        let files = self.repo.list_unmigrated().await?;
        let mut report = MigrationReportDto {
            total: files.len(),
            ..Default::default()
        };
        info!("Migrating {} local files to the object store", report.total);

        for (index, mut file) in files.into_iter().enumerate() {
            match self.offload(&mut file).await {
                Ok(OffloadOutcome::Uploaded | OffloadOutcome::Linked) => report.migrated += 1,
                Ok(OffloadOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    warn!("Failed to migrate file {} ({}): {}", file.id, file.file_name, e);
                    report.failed += 1;
                }
            }
            debug!("Migrating {} ({}/{})", file.file_name, index + 1, report.total);
        }

        info!(
            "{} files out of {} migrated successfully ({} skipped, {} failed)",
            report.migrated, report.total, report.skipped, report.failed
        );
        Ok(report)
    }
}
