//! StreamHub API Library
//!
//! HTTP handlers, middleware, orchestration services and application setup.

// Module declarations
mod api_doc;
pub mod constants;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod services;
pub mod setup;
pub mod utils;

// Public modules
pub mod auth;
pub mod error;
pub mod state;

// Re-exports
pub use error::{ErrorResponse, HttpAppError};
pub use response::ApiResponse;
pub use setup::routes::setup_routes;
pub use state::AppState;
