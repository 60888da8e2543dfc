//! Database repositories for data access layer
//!
//! Repositories are organized into account/ (users, sessions, verification
//! codes), media/ (catalog, variants, library, artists) and commerce/ (store,
//! addresses, subscriptions, payments).
//
// Account repositories
pub mod account;
//
// Catalog and engagement repositories
pub mod media;
//
// Store, subscription and payment repositories
pub mod commerce;
//
// Transaction utilities
pub mod transaction;
