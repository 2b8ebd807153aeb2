//! Shelf API server
//!
//! HTTP surface over the `shelf-authz` policy engine: authentication,
//! route-level authorization guards, and a small file/project API that
//! exercises them.

pub mod authorization;
pub mod context;
pub mod error;
pub mod fixtures;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod server;
pub mod state;

pub use context::{ApiKeyClaims, Identity};
pub use error::{ApiError, Result};
pub use server::Server;
pub use state::AppState;

/// API version
pub const API_VERSION: &str = "v1";
