//! Object store seam
//!
//! Services talk to remote storage only through [`ObjectStore`], so the
//! S3 client can be swapped for an in-memory store in tests.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;

use super::errors::StorageResult;

/// Canned access-control setting of a stored object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectAcl {
    Private,
    PublicRead,
}

impl ObjectAcl {
    pub fn for_privacy(is_private: bool) -> Self {
        if is_private {
            ObjectAcl::Private
        } else {
            ObjectAcl::PublicRead
        }
    }

    /// Value of the `x-amz-acl` header
    pub fn as_header_value(&self) -> &'static str {
        match self {
            ObjectAcl::Private => "private",
            ObjectAcl::PublicRead => "public-read",
        }
    }
}

/// Headers sent along with an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    pub content_type: String,
    /// `None` leaves the bucket default in place
    pub acl: Option<ObjectAcl>,
    /// User metadata, sent as `x-amz-meta-{name}`
    pub metadata: BTreeMap<String, String>,
}

impl UploadOptions {
    /// Public files get a `public-read` ACL; private files keep the bucket
    /// default and record their display name in metadata instead.
    pub fn for_file(content_type: &str, is_private: bool, file_name: &str) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert("contenttype".to_string(), content_type.to_string());

        let acl = if is_private {
            metadata.insert("file_name".to_string(), file_name.to_string());
            None
        } else {
            Some(ObjectAcl::PublicRead)
        };

        Self {
            content_type: content_type.to_string(),
            acl,
            metadata,
        }
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload the file at `path` under `key`
    async fn upload_file(&self, path: &Path, key: &str, options: &UploadOptions)
        -> StorageResult<()>;

    /// Replace the canned ACL of an existing object
    async fn set_acl(&self, key: &str, acl: ObjectAcl) -> StorageResult<()>;

    /// Time-limited GET URL; `file_name` becomes the response content disposition
    async fn signed_url(
        &self,
        key: &str,
        file_name: Option<&str>,
        expiry_secs: u32,
    ) -> StorageResult<String>;

    async fn get_object(&self, key: &str) -> StorageResult<Vec<u8>>;

    async fn delete_object(&self, key: &str) -> StorageResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_upload_sets_acl_without_file_name() {
        let options = UploadOptions::for_file("application/pdf", false, "report.pdf");

        assert_eq!(options.acl, Some(ObjectAcl::PublicRead));
        assert_eq!(
            options.metadata.get("contenttype").map(String::as_str),
            Some("application/pdf")
        );
        assert!(!options.metadata.contains_key("file_name"));
    }

    #[test]
    fn test_private_upload_records_file_name() {
        let options = UploadOptions::for_file("image/png", true, "scan.png");

        assert_eq!(options.acl, None);
        assert_eq!(
            options.metadata.get("file_name").map(String::as_str),
            Some("scan.png")
        );
    }

    #[test]
    fn test_acl_header_values() {
        assert_eq!(ObjectAcl::for_privacy(true).as_header_value(), "private");
        assert_eq!(ObjectAcl::for_privacy(false).as_header_value(), "public-read");
    }
}
