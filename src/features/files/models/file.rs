use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database model for a file reference row
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct File {
    pub id: Uuid,
    /// Display name shown to users
    pub file_name: String,
    /// Local path (`/files/..`, `/private/files/..`), signed-fetch endpoint, or public bucket URL
    pub file_url: String,
    pub file_size: i64,
    pub is_private: bool,
    pub is_folder: bool,
    /// Hash of local content; cleared once the bytes live in the object store
    pub content_hash: Option<String>,
    /// Object key, set once the file has been offloaded
    pub s3_file_key: Option<String>,
    /// Owning record type, e.g. "Invoice"
    pub owner_type: Option<String>,
    pub owner_id: Option<String>,
    /// Column on the owning record that holds this file's URL
    pub owner_field: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl File {
    pub fn uploaded_to_s3(&self) -> bool {
        self.s3_file_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    /// Owner type and id, when both are known
    pub fn owner(&self) -> Option<(&str, &str)> {
        match (self.owner_type.as_deref(), self.owner_id.as_deref()) {
            (Some(t), Some(id)) if !t.is_empty() && !id.is_empty() => Some((t, id)),
            _ => None,
        }
    }
}

/// Insert payload for a new file row
#[derive(Debug, Clone)]
pub struct NewFile {
    pub file_name: String,
    pub file_url: String,
    pub file_size: i64,
    pub is_private: bool,
    pub content_hash: Option<String>,
    pub s3_file_key: Option<String>,
    pub owner_type: Option<String>,
    pub owner_id: Option<String>,
    pub owner_field: Option<String>,
}

/// Where a file's bytes live, decided per row at runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageVariant {
    /// Offloaded; bytes are read through the object store under `key`
    ObjectStore { key: String },
    /// Still on the site's local disk
    Local,
}
