//! Storage module for attachment offloading
//!
//! Provides the object-store seam used by the files feature and its
//! S3/MinIO implementation.

pub mod errors;
mod object_store;
mod s3_client;
mod sigv4;

pub use errors::StorageError;
pub use object_store::{ObjectAcl, ObjectStore, UploadOptions};
pub use s3_client::S3Client;
