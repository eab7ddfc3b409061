//! Database repository implementation

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::DbError;
use crate::utils::redact_database_url;

// Submodules
mod logins;
mod roles;
mod users;

pub use logins::LoginRecordQuery;

/// Default pool size for file-backed databases
const DEFAULT_MAX_CONNECTIONS: u32 = 8;

/// Database connection and operations
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection and run migrations
    pub async fn new(database_url: &str) -> Result<Self, DbError> {
        info!("Connecting to database: {}", redact_database_url(database_url));

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to `:memory:` opens a distinct database, so an
        // in-memory store must live on exactly one connection that is never recycled.
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(DEFAULT_MAX_CONNECTIONS)
                .connect_with(options)
                .await?
        };

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Connect, retrying on failure
    ///
    /// Connection setup is the only place in the service where a failure is
    /// retried. Gives up after `max_attempts` and returns the last error.
    pub async fn connect_with_retry(
        database_url: &str,
        max_attempts: u32,
        interval: Duration,
    ) -> Result<Self, DbError> {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match Self::new(database_url).await {
                Ok(db) => {
                    info!("Successfully connected to the database");
                    return Ok(db);
                }
                Err(e) if attempt < max_attempts => {
                    warn!(
                        "Failed to connect to database (attempt {}/{}): {}. Retrying in {:?}",
                        attempt, max_attempts, e, interval
                    );
                    tokio::time::sleep(interval).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<(), DbError> {
        info!("Running database migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS roles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                permissions TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::Migration(format!("roles: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                first TEXT NOT NULL DEFAULT '',
                last TEXT NOT NULL DEFAULT '',
                phone TEXT NOT NULL DEFAULT '',
                password_hash TEXT NOT NULL,
                role_id INTEGER NOT NULL REFERENCES roles(id),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::Migration(format!("users: {}", e)))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_users_role_id ON users(role_id)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS logins (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL,
                login_time TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::Migration(format!("logins: {}", e)))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_logins_login_time ON logins(login_time)
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Database migrations completed");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) async fn memory_db() -> Database {
        Database::new("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = memory_db().await;
        db.run_migrations().await.unwrap();
        assert!(!db.has_users().await.unwrap());
    }

    #[tokio::test]
    async fn test_connect_with_retry_gives_up() {
        let result = Database::connect_with_retry(
            "sqlite:/nonexistent-dir/credgate/test.db",
            2,
            Duration::from_millis(1),
        )
        .await;
        assert!(result.is_err());
    }
}
