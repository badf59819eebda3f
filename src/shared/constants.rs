/// Path of the redirect endpoint that serves private objects through signed URLs
pub const FETCH_ENDPOINT_PATH: &str = "/api/files/generate";

/// Column on owner tables that overrides the generated key folder
pub const OWNER_FOLDER_PATH_COLUMN: &str = "s3_folder_path";

/// Length of the random token prefixed to every generated file name
pub const KEY_TOKEN_LENGTH: usize = 8;

/// Upload size cap for the multipart endpoint (10MB)
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;
