use thiserror::Error;

/// Result type for object store operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Object store errors
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Unexpected response status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Signing error: {0}")]
    Signing(String),
}

impl StorageError {
    /// Classify a non-success HTTP status returned by the store
    pub fn from_status(key: &str, status: u16, body: String) -> Self {
        match status {
            404 => StorageError::ObjectNotFound(key.to_string()),
            401 | 403 => StorageError::AccessDenied(key.to_string()),
            _ => StorageError::UnexpectedStatus { status, body },
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert!(matches!(
            StorageError::from_status("a/b.pdf", 404, String::new()),
            StorageError::ObjectNotFound(ref k) if k == "a/b.pdf"
        ));
        assert!(matches!(
            StorageError::from_status("a/b.pdf", 403, String::new()),
            StorageError::AccessDenied(_)
        ));
        assert!(matches!(
            StorageError::from_status("a/b.pdf", 500, "boom".to_string()),
            StorageError::UnexpectedStatus { status: 500, .. }
        ));
    }
}
