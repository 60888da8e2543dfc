//! StreamHub Core Library
//!
//! Domain models, error types, configuration and the role/capability table
//! shared by every StreamHub crate.

pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::role::{Capability, Role};
