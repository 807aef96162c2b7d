//! LeafScan Server
//!
//! HTTP API for plant-leaf disease diagnosis. Uploads are diagnosed by the
//! inference pipeline and stored as detection records scoped to the caller.

pub mod config;
pub mod identity;
pub mod routes;
pub mod state;

pub use config::{ConfigOverrides, ServerConfig};
pub use identity::CallerIdentity;
pub use routes::{create_router, AppError};
pub use state::AppState;
