//! HTTP handlers, one module per resource router.

pub mod address;
pub mod artist;
pub mod auth;
pub mod library;
pub mod media;
pub mod payment;
pub mod store;
pub mod subscription;
