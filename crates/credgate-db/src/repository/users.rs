//! User operations

use chrono::Utc;
use sqlx::Row;

use crate::error::DbError;
use crate::models::{Credential, NewUser, UpdateUser, User};
use crate::repository::Database;

const USER_COLUMNS: &str =
    "id, username, email, first, last, phone, password_hash, role_id, created_at, updated_at";

impl Database {
    // ==================== User Operations ====================

    /// Insert a new user
    pub async fn insert_user(&self, user: NewUser) -> Result<User, DbError> {
        let now = Utc::now();

        // The UNIQUE constraints decide; a separate existence check would race.
        let result = sqlx::query(
            r#"
            INSERT INTO users (username, email, first, last, phone, password_hash, role_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first)
        .bind(&user.last)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(user.role_id)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            DbError::from_write(e, || {
                format!(
                    "User '{}' or email '{}' already exists",
                    user.username, user.email
                )
            })
        })?;

        let id: i64 = result.get("id");

        Ok(User {
            id,
            username: user.username,
            email: user.email,
            first: user.first,
            last: user.last,
            phone: user.phone,
            password_hash: user.password_hash,
            role_id: user.role_id,
            created_at: now,
            updated_at: now,
        })
    }

    /// Check whether a username or an email is already registered
    pub async fn username_or_email_exists(
        &self,
        username: &str,
        email: &str,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            "SELECT COUNT(*) as count FROM users WHERE username = ? OR email = ?",
        )
        .bind(username)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        let count: i64 = result.get("count");
        Ok(count > 0)
    }

    /// Get the stored credential and role name for a username
    pub async fn get_credential(&self, username: &str) -> Result<Option<Credential>, DbError> {
        let result = sqlx::query(
            r#"
            SELECT u.username, u.password_hash, r.name AS role_name
            FROM users u
            JOIN roles r ON r.id = u.role_id
            WHERE u.username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        result
            .map(|row| Credential::try_from(&row).map_err(DbError::from))
            .transpose()
    }

    /// Get a user by username
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        let sql = format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS);
        let result = sqlx::query(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        result.map(|row| User::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// Get a user by email
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
        let result = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        result.map(|row| User::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// Get a user by ID
    pub async fn get_user_by_id(&self, id: i64) -> Result<Option<User>, DbError> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        let result = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        result.map(|row| User::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// List all users
    pub async fn list_users(&self) -> Result<Vec<User>, DbError> {
        let sql = format!("SELECT {} FROM users ORDER BY username", USER_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| User::try_from(row).map_err(DbError::from))
            .collect()
    }

    /// List users assigned to a role
    pub async fn list_users_by_role(&self, role_id: i64) -> Result<Vec<User>, DbError> {
        let sql = format!(
            "SELECT {} FROM users WHERE role_id = ? ORDER BY username",
            USER_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(role_id).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| User::try_from(row).map_err(DbError::from))
            .collect()
    }

    /// Update profile fields; `None` fields are left untouched
    pub async fn update_user(&self, id: i64, update: &UpdateUser) -> Result<bool, DbError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = COALESCE(?, email),
                first = COALESCE(?, first),
                last = COALESCE(?, last),
                phone = COALESCE(?, phone),
                role_id = COALESCE(?, role_id),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&update.email)
        .bind(&update.first)
        .bind(&update.last)
        .bind(&update.phone)
        .bind(update.role_id)
        .bind(now.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DbError::from_write(e, || {
                format!(
                    "Email '{}' already exists",
                    update.email.as_deref().unwrap_or_default()
                )
            })
        })?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace a user's password hash in a single statement
    pub async fn update_user_password(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<bool, DbError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = ?, updated_at = ?
            WHERE username = ?
            "#,
        )
        .bind(password_hash)
        .bind(now.to_rfc3339())
        .bind(username)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a user
    pub async fn delete_user(&self, id: i64) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Check if any users exist
    pub async fn has_users(&self) -> Result<bool, DbError> {
        let result = sqlx::query("SELECT COUNT(*) as count FROM users")
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = result.get("count");
        Ok(count > 0)
    }
}
