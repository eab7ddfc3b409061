//! credgate REST API
//!
//! Axum routes for login, registration, password rotation and the
//! user/role management surface, guarded by the credgate-auth middleware.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{AppState, MetricsHandle};
