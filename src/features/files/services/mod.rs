mod file_service;
mod key_generator;
mod privacy_reconciler;
mod sanitize;
mod url_builder;

pub use file_service::{content_type_of, FileService, UploadRequest};
pub use key_generator::KeyHookRegistry;
pub use sanitize::sanitize_file_name;
