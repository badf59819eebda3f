use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::features::files::{dtos as files_dtos, handlers as files_handlers};
use crate::shared::types::ApiResponse;

#[derive(OpenApi)]
#[openapi(
    paths(
        // Files
        files_handlers::upload_file,
        files_handlers::link_file,
        files_handlers::get_file,
        files_handlers::update_file,
        files_handlers::delete_file,
        files_handlers::get_file_content,
        files_handlers::generate_file,
        // Admin
        files_handlers::migrate_files,
    ),
    components(
        schemas(
            files_dtos::UploadFileDto,
            files_dtos::LinkFileDto,
            files_dtos::UpdateFileDto,
            files_dtos::FileResponseDto,
            files_dtos::DeleteFileResponseDto,
            files_dtos::MigrationReportDto,
            ApiResponse<files_dtos::FileResponseDto>,
            ApiResponse<files_dtos::DeleteFileResponseDto>,
            ApiResponse<files_dtos::MigrationReportDto>,
        )
    ),
    tags(
        (name = "files", description = "File upload, privacy and signed fetch"),
        (name = "admin", description = "Maintenance endpoints (basic auth)"),
    ),
    modifiers(&SecurityAddon),
    info(
        title = "S3 Attachment API",
        version = "0.1.0",
        description = "API documentation for S3 attachment offloading",
    )
)]
pub struct ApiDoc;

/// Adds the Basic auth scheme guarding the admin routes
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "basic_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Basic).build()),
            );
        }
    }
}

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}
