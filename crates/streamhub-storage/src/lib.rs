//! StreamHub Storage Library
//!
//! The `ObjectStorage` trait and its S3 implementation. Clients upload and
//! download bytes directly through presigned URLs; this crate only manages
//! multipart sessions, signing and deletion.
//!
//! # Storage key format
//!
//! Key generation is centralized in the `keys` module. Source uploads are
//! namespaced by owner so the open-upload listing under `uploads/{owner_id}/`
//! doubles as the ownership check.

pub mod keys;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{MultipartUpload, ObjectStorage, StorageError, StorageResult};
