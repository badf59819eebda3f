//! File attachments and their offloading to an S3-compatible object store.
//!
//! Uploaded files land on local disk first and are moved to the bucket
//! unless the integration is disabled or the owner type is ignored.
//!
//! ## Endpoints
//!
//! | Method | Endpoint | Auth | Description |
//! |--------|----------|------|-------------|
//! | POST | `/api/files/upload` | No | Upload a file |
//! | POST | `/api/files/link` | No | Attach an offloaded file to another record |
//! | GET | `/api/files/{id}` | No | File metadata |
//! | PATCH | `/api/files/{id}` | No | Rename or change privacy |
//! | DELETE | `/api/files/{id}` | No | Delete a file |
//! | GET | `/api/files/{id}/content` | No | Raw file bytes |
//! | GET | `/api/files/generate` | No | Redirect to a signed URL |
//! | POST | `/api/admin/files/migrate` | Basic | Offload all local files |

pub mod dtos;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;

#[cfg(test)]
pub mod test_support;

pub use services::FileService;
