//! Role operations

use chrono::Utc;
use sqlx::Row;
use std::collections::BTreeSet;

use crate::error::DbError;
use crate::models::{NewRole, Role};
use crate::repository::Database;

impl Database {
    // ==================== Role Operations ====================

    /// Insert a new role
    pub async fn insert_role(&self, role: NewRole) -> Result<Role, DbError> {
        let now = Utc::now();

        let permissions = serde_json::to_string(&role.permissions)?;
        let result = sqlx::query(
            r#"
            INSERT INTO roles (name, permissions, created_at)
            VALUES (?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&role.name)
        .bind(&permissions)
        .bind(now.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::from_write(e, || format!("Role '{}' already exists", role.name)))?;

        let id: i64 = result.get("id");

        Ok(Role {
            id,
            name: role.name,
            permissions: role.permissions,
            created_at: now,
        })
    }

    /// Return the named role, creating it with `permissions` if it is missing
    ///
    /// An existing role keeps its stored permissions.
    pub async fn ensure_role(
        &self,
        name: &str,
        permissions: BTreeSet<String>,
    ) -> Result<Role, DbError> {
        if let Some(role) = self.get_role_by_name(name).await? {
            return Ok(role);
        }
        self.insert_role(NewRole {
            name: name.to_string(),
            permissions,
        })
        .await
    }

    /// Get a role by ID
    pub async fn get_role_by_id(&self, id: i64) -> Result<Option<Role>, DbError> {
        let result = sqlx::query("SELECT id, name, permissions, created_at FROM roles WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        result.map(|row| Role::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// Get a role by name
    pub async fn get_role_by_name(&self, name: &str) -> Result<Option<Role>, DbError> {
        let result =
            sqlx::query("SELECT id, name, permissions, created_at FROM roles WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;

        result.map(|row| Role::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// List all roles
    pub async fn list_roles(&self) -> Result<Vec<Role>, DbError> {
        let rows = sqlx::query("SELECT id, name, permissions, created_at FROM roles ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| Role::try_from(row).map_err(DbError::from))
            .collect()
    }
}
