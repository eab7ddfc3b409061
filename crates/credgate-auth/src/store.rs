//! Credential store contract
//!
//! The authentication flow only needs these operations from the data layer.
//! `Ok(None)` from a lookup means the user does not exist; `Err` always
//! means the store itself failed.

use async_trait::async_trait;
use credgate_db::{Credential, Database, DbError, NewUser, User};

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Stored hash and role name for a username
    async fn find_credential_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Credential>, DbError>;

    /// Whether a username or email is already registered
    async fn username_or_email_taken(&self, username: &str, email: &str) -> Result<bool, DbError>;

    async fn role_exists(&self, role_id: i64) -> Result<bool, DbError>;

    /// Persist a user whose password has already been hashed
    async fn insert_user(&self, user: NewUser) -> Result<User, DbError>;

    /// Replace a password hash wholesale; `false` if the user is gone
    async fn replace_password_hash(&self, username: &str, hash: &str) -> Result<bool, DbError>;

    /// Append a login audit record
    async fn record_login(&self, username: &str) -> Result<(), DbError>;
}

#[async_trait]
impl CredentialStore for Database {
    async fn find_credential_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Credential>, DbError> {
        self.get_credential(username).await
    }

    async fn username_or_email_taken(&self, username: &str, email: &str) -> Result<bool, DbError> {
        self.username_or_email_exists(username, email).await
    }

    async fn role_exists(&self, role_id: i64) -> Result<bool, DbError> {
        Ok(self.get_role_by_id(role_id).await?.is_some())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, DbError> {
        Database::insert_user(self, user).await
    }

    async fn replace_password_hash(&self, username: &str, hash: &str) -> Result<bool, DbError> {
        self.update_user_password(username, hash).await
    }

    async fn record_login(&self, username: &str) -> Result<(), DbError> {
        self.insert_login_record(username).await.map(|_| ())
    }
}
