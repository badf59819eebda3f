mod file;

pub use file::{File, NewFile, StorageVariant};
