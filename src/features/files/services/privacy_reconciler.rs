//! Keeps remote ACLs and every row sharing an object key in step when a
//! file's privacy flag changes.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::sanitize::sanitize_file_name;
use super::url_builder::FileUrlBuilder;
use crate::core::error::{AppError, Result};
use crate::features::files::models::File;
use crate::features::files::repositories::FileRepository;
use crate::modules::storage::{ObjectAcl, ObjectStore};

pub const ACL_DENIED_MESSAGE: &str = "Access denied: Could not change file permission";

pub struct PrivacyReconciler {
    repo: Arc<dyn FileRepository>,
    store: Arc<dyn ObjectStore>,
    urls: Arc<FileUrlBuilder>,
}

impl PrivacyReconciler {
    pub fn new(
        repo: Arc<dyn FileRepository>,
        store: Arc<dyn ObjectStore>,
        urls: Arc<FileUrlBuilder>,
    ) -> Self {
        Self { repo, store, urls }
    }

    /// Object key backing `file`, from its key column or its URL
    fn object_key(&self, file: &File) -> Option<String> {
        if file.uploaded_to_s3() {
            return file.s3_file_key.clone();
        }
        self.urls.parse_remote_url(&file.file_url).map(|l| l.key)
    }

    /// Only stored objects whose flag differs from the persisted row qualify.
    /// A row without a snapshot is new and never qualifies.
    pub fn should_reconcile(&self, previous: Option<&File>, file: &File) -> bool {
        match previous {
            Some(prev) => prev.is_private != file.is_private && self.object_key(file).is_some(),
            None => false,
        }
    }

    /// Apply a privacy change to the stored object and its references.
    ///
    /// `file` is updated in place (URL, key) and persisted by the caller.
    /// Returns `false` when nothing needed reconciling.
    pub async fn on_privacy_changed(&self, previous: Option<&File>, file: &mut File) -> Result<bool> {
        if !self.should_reconcile(previous, file) {
            return Ok(false);
        }
        let (Some(prev), Some(key)) = (previous, self.object_key(file)) else {
            return Ok(false);
        };

        let acl = ObjectAcl::for_privacy(file.is_private);
        self.store.set_acl(&key, acl).await.map_err(|e| {
            error!("Failed to set ACL of '{}' to {}: {}", key, acl.as_header_value(), e);
            AppError::Forbidden(ACL_DENIED_MESSAGE.to_string())
        })?;

        let old_url = prev.file_url.clone();
        let new_url = self
            .urls
            .file_url(&key, &sanitize_file_name(&file.file_name), file.is_private);
        file.file_url = new_url.clone();
        file.s3_file_key = Some(key.clone());

        // Remote and local row now agree; the rest is best-effort propagation
        match self
            .repo
            .update_shared_references(&key, file.id, &new_url, file.is_private)
            .await
        {
            Ok(count) => debug!("Propagated privacy of '{}' to {} other rows", key, count),
            Err(e) => warn!("Failed to propagate privacy of '{}' to other rows: {}", key, e),
        }

        if let (Some((owner_type, owner_id)), Some(field)) =
            (file.owner(), file.owner_field.as_deref())
        {
            match self
                .repo
                .repoint_owner_field(owner_type, owner_id, field, &old_url, &new_url)
                .await
            {
                Ok(0) => debug!(
                    "{} {}.{} no longer holds this file, left untouched",
                    owner_type, owner_id, field
                ),
                Ok(_) => debug!("Repointed {} {}.{}", owner_type, owner_id, field),
                Err(e) => warn!(
                    "Failed to repoint {} {}.{}: {}",
                    owner_type, owner_id, field, e
                ),
            }
        }

        info!(
            "Privacy of file {} changed: key={}, acl={}",
            file.id,
            key,
            acl.as_header_value()
        );

        Ok(true)
    }
}
