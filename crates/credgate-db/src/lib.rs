//! credgate database layer
//!
//! Persistence for users, roles and the login audit trail, backed by
//! SQLite via sqlx.

pub mod error;
pub mod models;
pub mod repository;
pub mod utils;

pub use error::DbError;
pub use models::*;
pub use repository::{Database, LoginRecordQuery};

/// Re-export sqlx types for convenience
pub use sqlx::SqlitePool;
