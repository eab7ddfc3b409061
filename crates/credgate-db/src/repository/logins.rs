//! Login audit trail operations

use chrono::Utc;
use sqlx::Row;

use crate::error::DbError;
use crate::models::LoginRecord;
use crate::repository::Database;

/// Query parameters for listing login records
#[derive(Debug, Clone, Default)]
pub struct LoginRecordQuery {
    /// Filter by username
    pub username: Option<String>,
    /// Pagination offset
    pub offset: i64,
    /// Pagination limit
    pub limit: i64,
}

impl Database {
    /// Append a login record for a successful authentication
    pub async fn insert_login_record(&self, username: &str) -> Result<LoginRecord, DbError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO logins (username, login_time)
            VALUES (?, ?)
            RETURNING id
            "#,
        )
        .bind(username)
        .bind(now.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        Ok(LoginRecord {
            id: result.get("id"),
            username: username.to_string(),
            login_time: now,
        })
    }

    /// List login records, newest first, with the total matching count
    pub async fn list_login_records(
        &self,
        query: LoginRecordQuery,
    ) -> Result<(Vec<LoginRecord>, i64), DbError> {
        let where_clause = if query.username.is_some() {
            "WHERE username = ?"
        } else {
            ""
        };

        let count_sql = format!("SELECT COUNT(*) as count FROM logins {}", where_clause);
        let mut count_query = sqlx::query(&count_sql);
        if let Some(username) = &query.username {
            count_query = count_query.bind(username);
        }
        let total: i64 = count_query.fetch_one(&self.pool).await?.get("count");

        let sql = format!(
            r#"
            SELECT id, username, login_time
            FROM logins
            {}
            ORDER BY login_time DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
            where_clause
        );
        let mut records_query = sqlx::query(&sql);
        if let Some(username) = &query.username {
            records_query = records_query.bind(username);
        }
        let rows = records_query
            .bind(query.limit)
            .bind(query.offset)
            .fetch_all(&self.pool)
            .await?;

        let records: Result<Vec<LoginRecord>, _> = rows
            .iter()
            .map(|row| LoginRecord::try_from(row).map_err(DbError::from))
            .collect();

        Ok((records?, total))
    }
}
