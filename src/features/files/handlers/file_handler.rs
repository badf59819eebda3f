use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::core::error::AppError;
use crate::features::files::dtos::{
    DeleteFileResponseDto, FetchFileQuery, FileResponseDto, LinkFileDto, MigrationReportDto,
    UpdateFileDto, UploadFileDto,
};
use crate::features::files::services::{
    content_type_of, sanitize_file_name, FileService, UploadRequest,
};
use crate::shared::constants::MAX_FILE_SIZE;
use crate::shared::types::ApiResponse;

/// Body of the fetch endpoint when no key is given
pub const KEY_NOT_FOUND_BODY: &str = "Key not found.";

fn parse_bool(text: &str) -> bool {
    matches!(text.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Upload a file
///
/// Accepts multipart/form-data with:
/// - `file`: The file to upload (required)
/// - `is_private`: "true" to serve the file through signed URLs
/// - `owner_type`, `owner_id`, `owner_field`: the record the file is attached to
#[utoipa::path(
    post,
    path = "/api/files/upload",
    tag = "files",
    request_body(
        content = UploadFileDto,
        content_type = "multipart/form-data",
        description = "File upload form with privacy flag and owning record",
    ),
    responses(
        (status = 201, description = "File stored", body = ApiResponse<FileResponseDto>),
        (status = 400, description = "Invalid file or validation error"),
        (status = 502, description = "Upload to the object store failed")
    )
)]
pub async fn upload_file(
    State(service): State<Arc<FileService>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<FileResponseDto>>), AppError> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut is_private = false;
    let mut owner_type = None;
    let mut owner_id = None;
    let mut owner_field = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        debug!("Failed to read multipart field: {}", e);
        AppError::BadRequest(format!("Failed to read multipart data: {}", e))
    })? {
        let field_name = field.name().unwrap_or("").to_string();

        if field_name == "file" {
            file_name = field.file_name().map(|s| s.to_string());
            let data = field.bytes().await.map_err(|e| {
                debug!("Failed to read file bytes: {}", e);
                AppError::BadRequest(format!("Failed to read file data: {}", e))
            })?;
            file_data = Some(data.to_vec());
            continue;
        }

        let text = field.text().await.map_err(|e| {
            AppError::BadRequest(format!("Failed to read {} field: {}", field_name, e))
        })?;
        match field_name.as_str() {
            "is_private" => is_private = parse_bool(&text),
            "owner_type" => owner_type = non_empty(text),
            "owner_id" => owner_id = non_empty(text),
            "owner_field" => owner_field = non_empty(text),
            _ => debug!("Ignoring unknown field: {}", field_name),
        }
    }

    let data = file_data.ok_or_else(|| AppError::BadRequest("File is required".to_string()))?;
    let file_name =
        file_name.ok_or_else(|| AppError::BadRequest("Filename is required".to_string()))?;

    if data.len() > MAX_FILE_SIZE {
        return Err(AppError::BadRequest(format!(
            "File too large. Maximum size is {} bytes ({} MB)",
            MAX_FILE_SIZE,
            MAX_FILE_SIZE / 1024 / 1024
        )));
    }

    let file = service
        .create_file(UploadRequest {
            data,
            file_name,
            is_private,
            owner_type,
            owner_id,
            owner_field,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(Some(file.into()), None)),
    ))
}

/// Attach an already offloaded file to another record
#[utoipa::path(
    post,
    path = "/api/files/link",
    tag = "files",
    request_body = LinkFileDto,
    responses(
        (status = 201, description = "Reference created", body = ApiResponse<FileResponseDto>),
        (status = 400, description = "URL does not point at the object store")
    )
)]
pub async fn link_file(
    State(service): State<Arc<FileService>>,
    Json(dto): Json<LinkFileDto>,
) -> Result<(StatusCode, Json<ApiResponse<FileResponseDto>>), AppError> {
    let file = service.link_file(dto).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(Some(file.into()), None)),
    ))
}

#[utoipa::path(
    get,
    path = "/api/files/{id}",
    tag = "files",
    params(("id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "File metadata", body = ApiResponse<FileResponseDto>),
        (status = 404, description = "File not found")
    )
)]
pub async fn get_file(
    State(service): State<Arc<FileService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<FileResponseDto>>, AppError> {
    let file = service.get_file(id).await?;
    Ok(Json(ApiResponse::success(Some(file.into()), None)))
}

/// Rename a file or change its privacy
///
/// Changing `is_private` on an offloaded file updates the object's ACL and
/// every row sharing its key.
#[utoipa::path(
    patch,
    path = "/api/files/{id}",
    tag = "files",
    params(("id" = Uuid, Path, description = "File ID")),
    request_body = UpdateFileDto,
    responses(
        (status = 200, description = "File updated", body = ApiResponse<FileResponseDto>),
        (status = 403, description = "Object permission could not be changed"),
        (status = 404, description = "File not found")
    )
)]
pub async fn update_file(
    State(service): State<Arc<FileService>>,
    Path(id): Path<Uuid>,
    Json(dto): Json<UpdateFileDto>,
) -> Result<Json<ApiResponse<FileResponseDto>>, AppError> {
    let file = service.update_file(id, dto).await?;
    Ok(Json(ApiResponse::success(
        Some(file.into()),
        Some("File updated".to_string()),
    )))
}

#[utoipa::path(
    delete,
    path = "/api/files/{id}",
    tag = "files",
    params(("id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "File deleted", body = ApiResponse<DeleteFileResponseDto>),
        (status = 403, description = "Remote object could not be deleted"),
        (status = 404, description = "File not found")
    )
)]
pub async fn delete_file(
    State(service): State<Arc<FileService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<DeleteFileResponseDto>>, AppError> {
    service.delete_file(id).await?;

    Ok(Json(ApiResponse::success(
        Some(DeleteFileResponseDto { deleted: true }),
        Some("File deleted successfully".to_string()),
    )))
}

#[utoipa::path(
    get,
    path = "/api/files/{id}/content",
    tag = "files",
    params(("id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "Raw file bytes", content_type = "application/octet-stream"),
        (status = 404, description = "File not found")
    )
)]
pub async fn get_file_content(
    State(service): State<Arc<FileService>>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let (file, data) = service.get_content(id).await?;
    let content_type = content_type_of(&file.file_name);
    let disposition = format!("inline; filename=\"{}\"", sanitize_file_name(&file.file_name));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    )
        .into_response())
}

/// Fetch endpoint for private files
///
/// Redirects to a short-lived signed URL for `key`.
#[utoipa::path(
    get,
    path = "/api/files/generate",
    tag = "files",
    params(FetchFileQuery),
    responses(
        (status = 302, description = "Redirect to a signed URL"),
        (status = 200, description = "No key given", body = String, content_type = "text/plain")
    )
)]
pub async fn generate_file(
    State(service): State<Arc<FileService>>,
    Query(query): Query<FetchFileQuery>,
) -> Result<Response, AppError> {
    let signed = service
        .signed_url(query.key.as_deref(), query.file_name.as_deref())
        .await?;

    Ok(match signed {
        Some(url) => (StatusCode::FOUND, [(header::LOCATION, url)]).into_response(),
        None => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            KEY_NOT_FOUND_BODY,
        )
            .into_response(),
    })
}

/// Offload every local file to the object store
#[utoipa::path(
    post,
    path = "/api/admin/files/migrate",
    tag = "admin",
    responses(
        (status = 200, description = "Migration finished", body = ApiResponse<MigrationReportDto>),
        (status = 401, description = "Missing or invalid credentials")
    ),
    security(("basic_auth" = []))
)]
pub async fn migrate_files(
    State(service): State<Arc<FileService>>,
) -> Result<Json<ApiResponse<MigrationReportDto>>, AppError> {
    let report = service.migrate_existing_files().await?;
    let message = format!(
        "{} files out of {} migrated successfully.",
        report.migrated, report.total
    );

    Ok(Json(ApiResponse::success(Some(report), Some(message))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{FilesConfig, S3Settings};
    use crate::features::files::routes;
    use crate::features::files::services::KeyHookRegistry;
    use crate::features::files::test_support::{InMemoryFileRepository, InMemoryObjectStore};
    use axum_test::multipart::{MultipartForm, Part};
    use axum_test::TestServer;
    use tempfile::TempDir;

    fn server() -> (TempDir, TestServer) {
        let site = TempDir::new().unwrap();
        let service = Arc::new(FileService::new(
            Arc::new(InMemoryFileRepository::default()),
            Arc::new(InMemoryObjectStore::default()),
            S3Settings::default(),
            FilesConfig {
                site_path: site.path().to_path_buf(),
            },
            &KeyHookRegistry::empty(),
        ));
        (site, TestServer::new(routes::routes(service)).unwrap())
    }

    #[tokio::test]
    async fn test_fetch_without_key_returns_plain_message() {
        let (_site, server) = server();

        let response = server.get("/api/files/generate").await;

        response.assert_status_ok();
        response.assert_text(KEY_NOT_FOUND_BODY);
        assert!(response.headers().get(header::LOCATION).is_none());
    }

    #[tokio::test]
    async fn test_fetch_with_key_redirects_to_signed_url() {
        let (_site, server) = server();

        let response = server
            .get("/api/files/generate")
            .add_query_param("key", "docs/ab12cd34_scan.pdf")
            .add_query_param("file_name", "scan.pdf")
            .await;

        response.assert_status(StatusCode::FOUND);
        let location = response.header(header::LOCATION);
        let location = location.to_str().unwrap();
        assert!(location.starts_with("https://s3.test/docs/ab12cd34_scan.pdf?"));
        assert!(location.contains("X-Amz-Expires=120"));
    }

    #[tokio::test]
    async fn test_private_upload_gets_fetch_url() {
        let (_site, server) = server();
        let form = MultipartForm::new()
            .add_text("is_private", "true")
            .add_text("owner_type", "Invoice")
            .add_text("owner_id", "INV-1")
            .add_part("file", Part::bytes(b"abc".to_vec()).file_name("scan.pdf"));

        let response = server.post("/api/files/upload").multipart(form).await;

        response.assert_status(StatusCode::CREATED);
        let body: serde_json::Value = response.json();
        assert_eq!(body["data"]["is_private"], serde_json::Value::Bool(true));
        let file_url = body["data"]["file_url"].as_str().unwrap();
        assert!(file_url.starts_with("/api/files/generate?key="), "{}", file_url);
    }

    #[tokio::test]
    async fn test_content_is_served_with_guessed_type() {
        let (_site, server) = server();
        let form = MultipartForm::new()
            .add_text("is_private", "true")
            .add_part("file", Part::bytes(b"abc".to_vec()).file_name("scan copy.pdf"));
        let body: serde_json::Value = server.post("/api/files/upload").multipart(form).await.json();
        let id = body["data"]["id"].as_str().unwrap();

        let response = server.get(&format!("/api/files/{}/content", id)).await;

        response.assert_status_ok();
        assert_eq!(response.header(header::CONTENT_TYPE), "application/pdf");
        assert_eq!(
            response.header(header::CONTENT_DISPOSITION),
            "inline; filename=\"scan_copy.pdf\""
        );
        assert_eq!(response.as_bytes().to_vec(), b"abc".to_vec());
    }

    #[tokio::test]
    async fn test_upload_without_file_is_rejected() {
        let (_site, server) = server();
        let form = MultipartForm::new().add_text("is_private", "true");

        let response = server.post("/api/files/upload").multipart(form).await;

        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn test_unknown_file_is_not_found() {
        let (_site, server) = server();

        let response = server.get(&format!("/api/files/{}", Uuid::new_v4())).await;

        response.assert_status_not_found();
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool(" 1 "));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(""));
    }
}
