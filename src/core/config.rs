use std::env;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub swagger: SwaggerConfig,
    pub s3: S3Settings,
    pub files: FilesConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub max_request_body_size: usize,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

#[derive(Debug, Clone)]
pub struct SwaggerConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub title: String,
    pub version: String,
    pub description: String,
}

/// A secret value that never shows up in `Debug` output.
///
/// The raw value is only reachable through [`SecretString::expose_secret`].
#[derive(Clone, Default)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(********)")
    }
}

/// S3/MinIO settings for attachment offloading
#[derive(Debug, Clone)]
pub struct S3Settings {
    /// Master switch; when off, uploads stay on local disk
    pub enabled: bool,
    /// Bucket name for storing files
    pub bucket: String,
    /// Access key for authentication
    pub access_key: String,
    /// Secret key for authentication
    pub secret_key: SecretString,
    /// S3 endpoint URL
    pub endpoint: String,
    /// Public endpoint URL used to build direct links to public files (defaults to endpoint)
    pub public_endpoint: String,
    /// AWS region (for S3 compatibility)
    pub region: String,
    /// Default folder prefix for generated keys
    pub folder_name: String,
    /// Signed URL expiry time in seconds
    pub signed_url_expiry_secs: u32,
    /// Delete remote objects when their file row is deleted
    pub delete_file_from_cloud: bool,
    /// Name of a registered key generator hook, if any
    pub key_generator_hook: Option<String>,
    /// Owner types whose attachments are never offloaded
    pub ignore_upload_for_types: Vec<String>,
}

/// Local file storage layout of the host site
#[derive(Debug, Clone)]
pub struct FilesConfig {
    /// Site root; public files live under `public/files`, private under `private/files`
    pub site_path: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if exists, ignore if not found (optional for production)
        if let Err(e) = dotenvy::dotenv() {
            if !e.to_string().contains("not found") {
                eprintln!("Warning: Error loading .env file: {}", e);
            }
        }

        Ok(Config {
            app: AppConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            swagger: SwaggerConfig::from_env()?,
            s3: S3Settings::from_env()?,
            files: FilesConfig::from_env()?,
        })
    }
}

impl AppConfig {
    const DEFAULT_MAX_REQUEST_BODY_SIZE: usize = 10 * 1024 * 1024; // 10MB

    pub fn from_env() -> Result<Self, String> {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|e| format!("Invalid PORT: {}", e))?;

        // Parse CORS allowed origins from comma-separated string
        let cors_allowed_origins = parse_list(
            &env::var("CORS_ALLOWED_ORIGINS").unwrap_or_else(|_| "*".to_string()),
        );

        let max_request_body_size = env::var("MAX_REQUEST_BODY_SIZE")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_REQUEST_BODY_SIZE.to_string())
            .parse::<usize>()
            .map_err(|_| "MAX_REQUEST_BODY_SIZE must be a valid number".to_string())?;

        Ok(Self {
            host,
            port,
            cors_allowed_origins,
            max_request_body_size,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl DatabaseConfig {
    const DEFAULT_MAX_CONNECTIONS: u32 = 10;
    const DEFAULT_MIN_CONNECTIONS: u32 = 1;
    const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;
    const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600; // 10 minutes
    const DEFAULT_MAX_LIFETIME_SECS: u64 = 1800; // 30 minutes

    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())?;

        let max_connections = env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_CONNECTIONS.to_string())
            .parse::<u32>()
            .map_err(|_| "DB_MAX_CONNECTIONS must be a valid number".to_string())?;

        let min_connections = env::var("DB_MIN_CONNECTIONS")
            .unwrap_or_else(|_| Self::DEFAULT_MIN_CONNECTIONS.to_string())
            .parse::<u32>()
            .map_err(|_| "DB_MIN_CONNECTIONS must be a valid number".to_string())?;

        let acquire_timeout_secs = env::var("DB_ACQUIRE_TIMEOUT_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_ACQUIRE_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_ACQUIRE_TIMEOUT_SECS must be a valid number".to_string())?;

        let idle_timeout_secs = env::var("DB_IDLE_TIMEOUT_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_IDLE_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_IDLE_TIMEOUT_SECS must be a valid number".to_string())?;

        let max_lifetime_secs = env::var("DB_MAX_LIFETIME_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_LIFETIME_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_MAX_LIFETIME_SECS must be a valid number".to_string())?;

        Ok(Self {
            url,
            max_connections,
            min_connections,
            acquire_timeout_secs,
            idle_timeout_secs,
            max_lifetime_secs,
        })
    }
}

impl SwaggerConfig {
    pub fn from_env() -> Result<Self, String> {
        // Only use credentials if they are non-empty
        let username = env::var("SWAGGER_USERNAME").ok().filter(|s| !s.is_empty());
        let password = env::var("SWAGGER_PASSWORD").ok().filter(|s| !s.is_empty());
        let title = env::var("SWAGGER_TITLE").unwrap_or_else(|_| "S3 Attachment API".to_string());
        let version = env::var("SWAGGER_VERSION").unwrap_or_else(|_| "0.1.0".to_string());
        let description = env::var("SWAGGER_DESCRIPTION")
            .unwrap_or_else(|_| "API documentation for S3 attachment offloading".to_string());

        Ok(Self {
            username,
            password,
            title,
            version,
            description,
        })
    }

    /// Returns credentials in "username:password" format if auth is enabled
    pub fn credentials(&self) -> Option<String> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some(format!("{}:{}", user, pass)),
            _ => None,
        }
    }
}

impl S3Settings {
    pub const DEFAULT_SIGNED_URL_EXPIRY_SECS: u32 = 120;
    const DEFAULT_IGNORED_TYPES: &'static str = "Data Import";

    pub fn from_env() -> Result<Self, String> {
        let enabled = parse_flag("S3_ENABLED", false)?;

        let endpoint =
            env::var("S3_ENDPOINT").unwrap_or_else(|_| "http://localhost:9000".to_string());

        // Public endpoint defaults to the main endpoint if not specified
        let public_endpoint = env::var("S3_PUBLIC_ENDPOINT").unwrap_or_else(|_| endpoint.clone());

        let bucket = env::var("S3_BUCKET").unwrap_or_else(|_| "attachments".to_string());
        let access_key = env::var("S3_ACCESS_KEY").unwrap_or_else(|_| "minioadmin".to_string());
        let secret_key = SecretString::new(
            env::var("S3_SECRET_KEY").unwrap_or_else(|_| "minioadmin".to_string()),
        );
        let region = env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string());
        let folder_name = env::var("S3_FOLDER_NAME").unwrap_or_default();

        let signed_url_expiry_secs = env::var("S3_SIGNED_URL_EXPIRY_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_SIGNED_URL_EXPIRY_SECS.to_string())
            .parse::<u32>()
            .map_err(|_| "S3_SIGNED_URL_EXPIRY_SECS must be a valid number".to_string())?;

        let delete_file_from_cloud = parse_flag("S3_DELETE_FILE_FROM_CLOUD", false)?;

        let key_generator_hook = env::var("S3_KEY_GENERATOR_HOOK")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let ignore_upload_for_types = parse_list(
            &env::var("S3_IGNORE_UPLOAD_FOR_TYPES")
                .unwrap_or_else(|_| Self::DEFAULT_IGNORED_TYPES.to_string()),
        );

        Ok(Self {
            enabled,
            bucket,
            access_key,
            secret_key,
            endpoint,
            public_endpoint,
            region,
            folder_name,
            signed_url_expiry_secs,
            delete_file_from_cloud,
            key_generator_hook,
            ignore_upload_for_types,
        })
    }

    /// Whether attachments of the given owner type should be offloaded at all
    pub fn accepts_owner_type(&self, owner_type: Option<&str>) -> bool {
        match owner_type {
            Some(t) => !self.ignore_upload_for_types.iter().any(|ignored| ignored == t),
            None => true,
        }
    }
}

impl Default for S3Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            bucket: "attachments".to_string(),
            access_key: String::new(),
            secret_key: SecretString::default(),
            endpoint: "http://localhost:9000".to_string(),
            public_endpoint: "http://localhost:9000".to_string(),
            region: "us-east-1".to_string(),
            folder_name: String::new(),
            signed_url_expiry_secs: Self::DEFAULT_SIGNED_URL_EXPIRY_SECS,
            delete_file_from_cloud: false,
            key_generator_hook: None,
            ignore_upload_for_types: vec![Self::DEFAULT_IGNORED_TYPES.to_string()],
        }
    }
}

impl FilesConfig {
    pub fn from_env() -> Result<Self, String> {
        let site_path = env::var("SITE_PATH").unwrap_or_else(|_| "./site".to_string());

        Ok(Self {
            site_path: PathBuf::from(site_path),
        })
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_flag(name: &str, default: bool) -> Result<bool, String> {
    match env::var(name) {
        Ok(value) => match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            _ => Err(format!("{} must be a boolean", name)),
        },
        Err(_) => Ok(default),
    }
}
