//! Database models

use crate::utils::parse_datetime_or_now;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use std::collections::BTreeSet;

/// User model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first: String,
    pub last: String,
    pub phone: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New user (for insertion)
///
/// Only ever carries a password hash. Callers hash before constructing it.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first: String,
    pub last: String,
    pub phone: String,
    pub password_hash: String,
    pub role_id: i64,
}

/// Profile update (for partial updates)
///
/// The password hash is deliberately absent; it is only replaced through
/// [`Database::update_user_password`](crate::Database::update_user_password).
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub first: Option<String>,
    pub last: Option<String>,
    pub phone: Option<String>,
    pub role_id: Option<i64>,
}

/// Role with its permission set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub permissions: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
}

/// New role (for insertion)
#[derive(Debug, Clone)]
pub struct NewRole {
    pub name: String,
    pub permissions: BTreeSet<String>,
}

/// Stored credential joined with the name of its role
#[derive(Debug, Clone)]
pub struct Credential {
    pub username: String,
    pub password_hash: String,
    pub role: String,
}

/// Login audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRecord {
    pub id: i64,
    pub username: String,
    pub login_time: DateTime<Utc>,
}

// ==================== TryFrom Implementations ====================

impl TryFrom<&sqlx::sqlite::SqliteRow> for User {
    type Error = sqlx::Error;

    fn try_from(row: &sqlx::sqlite::SqliteRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            first: row.try_get("first")?,
            last: row.try_get("last")?,
            phone: row.try_get("phone")?,
            password_hash: row.try_get("password_hash")?,
            role_id: row.try_get("role_id")?,
            created_at: parse_datetime_or_now(&row.try_get::<String, _>("created_at")?),
            updated_at: parse_datetime_or_now(&row.try_get::<String, _>("updated_at")?),
        })
    }
}

impl TryFrom<&sqlx::sqlite::SqliteRow> for Role {
    type Error = sqlx::Error;

    fn try_from(row: &sqlx::sqlite::SqliteRow) -> Result<Self, Self::Error> {
        let permissions: String = row.try_get("permissions")?;
        Ok(Role {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            permissions: serde_json::from_str(&permissions)
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            created_at: parse_datetime_or_now(&row.try_get::<String, _>("created_at")?),
        })
    }
}

impl TryFrom<&sqlx::sqlite::SqliteRow> for Credential {
    type Error = sqlx::Error;

    fn try_from(row: &sqlx::sqlite::SqliteRow) -> Result<Self, Self::Error> {
        Ok(Credential {
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
            role: row.try_get("role_name")?,
        })
    }
}

impl TryFrom<&sqlx::sqlite::SqliteRow> for LoginRecord {
    type Error = sqlx::Error;

    fn try_from(row: &sqlx::sqlite::SqliteRow) -> Result<Self, Self::Error> {
        Ok(LoginRecord {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            login_time: parse_datetime_or_now(&row.try_get::<String, _>("login_time")?),
        })
    }
}
