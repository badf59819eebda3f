use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::features::files::models::File;

/// Upload file request DTO for OpenAPI documentation
/// Note: This struct is for Swagger UI documentation only.
/// The actual handler uses axum's Multipart extractor directly.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadFileDto {
    /// The file to upload
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
    /// "true" to keep the file private (served through signed URLs)
    #[schema(example = "false")]
    pub is_private: Option<String>,
    /// Owning record type
    #[schema(example = "Invoice")]
    pub owner_type: Option<String>,
    /// Owning record identifier
    #[schema(example = "INV-0001")]
    pub owner_id: Option<String>,
    /// Column on the owning record that stores the file URL
    #[schema(example = "attachment")]
    pub owner_field: Option<String>,
}

/// Response DTO for file operations
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FileResponseDto {
    pub id: Uuid,
    pub file_name: String,
    /// Local path, signed-fetch endpoint URL (private) or direct bucket URL (public)
    pub file_url: String,
    pub file_size: i64,
    pub is_private: bool,
    /// Object key once the file has been offloaded
    pub s3_file_key: Option<String>,
    pub owner_type: Option<String>,
    pub owner_id: Option<String>,
    pub owner_field: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<File> for FileResponseDto {
    fn from(file: File) -> Self {
        Self {
            id: file.id,
            file_name: file.file_name,
            file_url: file.file_url,
            file_size: file.file_size,
            is_private: file.is_private,
            s3_file_key: file.s3_file_key,
            owner_type: file.owner_type,
            owner_id: file.owner_id,
            owner_field: file.owner_field,
            created_at: file.created_at,
            updated_at: file.updated_at,
        }
    }
}

/// Request DTO for editing a file
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateFileDto {
    /// New privacy flag; changing it re-permissions the stored object
    pub is_private: Option<bool>,
    /// New display name
    #[validate(length(min = 1, max = 255, message = "file_name must be 1-255 characters"))]
    pub file_name: Option<String>,
}

/// Query parameters of the signed-fetch endpoint
#[derive(Debug, Deserialize, IntoParams)]
pub struct FetchFileQuery {
    /// Object key
    pub key: Option<String>,
    /// Display name used for the download's content disposition
    pub file_name: Option<String>,
}

/// Response DTO for delete operations
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteFileResponseDto {
    pub deleted: bool,
}

/// Outcome of a bulk migration run
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MigrationReportDto {
    /// Rows considered
    pub total: usize,
    /// Rows uploaded or linked to an existing object
    pub migrated: usize,
    /// Rows left local (folders, ignored owner types)
    pub skipped: usize,
    /// Rows whose upload failed
    pub failed: usize,
}

/// Request DTO for recording a copy of an offloaded file against another record
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LinkFileDto {
    /// Fetch-endpoint or public bucket URL of the existing file
    #[validate(length(min = 1, message = "file_url is required"))]
    #[schema(example = "/api/files/generate?key=2024%2F03%2F05%2FInvoice%2Fab12cd34_scan.pdf&file_name=scan.pdf")]
    pub file_url: String,
    #[schema(example = "Invoice")]
    pub owner_type: Option<String>,
    pub owner_id: Option<String>,
    pub owner_field: Option<String>,
}
