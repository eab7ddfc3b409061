//! Login, registration and password rotation
//!
//! Each operation is a single sequential pass over the credential store;
//! nothing is kept between requests.

use credgate_db::{NewUser, User};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::error::AuthError;
use crate::jwt::{IssuedToken, JwtManager};
use crate::password::CredentialHasher;
use crate::store::CredentialStore;

/// Maximum allowed username length
pub const MAX_USERNAME_LENGTH: usize = 64;
/// Maximum allowed password length (prevent DoS with very large passwords)
pub const MAX_PASSWORD_LENGTH: usize = 256;
/// Minimum allowed length for newly chosen passwords
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Upper bound on how long a login waits for its audit record
const DEFAULT_AUDIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Throwaway secret behind the digest verified for unknown usernames
const DUMMY_PASSWORD: &str = "credgate-unknown-user";

/// Validate username format and length
pub fn validate_username(username: &str) -> Result<(), AuthError> {
    if username.is_empty() {
        return Err(AuthError::Malformed("Username cannot be empty".to_string()));
    }
    if username.len() > MAX_USERNAME_LENGTH {
        return Err(AuthError::Malformed(format!(
            "Username exceeds maximum length of {} characters",
            MAX_USERNAME_LENGTH
        )));
    }
    if !username.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        return Err(AuthError::Malformed(
            "Username can only contain alphanumeric characters, underscores, and hyphens"
                .to_string(),
        ));
    }
    Ok(())
}

/// Validate a password the caller wants to store
pub fn validate_new_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::Malformed(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        )));
    }
    check_password_length(password)
}

/// Reject oversized passwords before any hashing work
pub fn check_password_length(password: &str) -> Result<(), AuthError> {
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(AuthError::Malformed(format!(
            "Password exceeds maximum length of {} characters",
            MAX_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// Minimal email sanity check
pub fn validate_email(email: &str) -> Result<(), AuthError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(AuthError::Malformed("Invalid email address".to_string())),
    }
}

/// Self-service registration payload
#[derive(Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub first: String,
    #[serde(default)]
    pub last: String,
    #[serde(default)]
    pub phone: String,
    pub role_id: i64,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("email", &self.email)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("role_id", &self.role_id)
            .finish_non_exhaustive()
    }
}

/// Authentication flow over an injected store, token codec and hasher
#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn CredentialStore>,
    jwt: Arc<JwtManager>,
    hasher: CredentialHasher,
    /// Digest verified when the username is unknown; hashed with `hasher`
    /// so both failure paths cost the same
    dummy_digest: String,
    audit_timeout: Duration,
}

impl Authenticator {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        jwt: Arc<JwtManager>,
        hasher: CredentialHasher,
    ) -> Result<Self, AuthError> {
        let dummy_digest = hasher.hash(DUMMY_PASSWORD)?;
        Ok(Self {
            store,
            jwt,
            hasher,
            dummy_digest,
            audit_timeout: DEFAULT_AUDIT_TIMEOUT,
        })
    }

    /// Override how long a login waits for its audit record
    pub fn with_audit_timeout(mut self, timeout: Duration) -> Self {
        self.audit_timeout = timeout;
        self
    }

    pub fn jwt(&self) -> &Arc<JwtManager> {
        &self.jwt
    }

    /// Verify a username/password pair and issue a session token
    ///
    /// Unknown users and wrong passwords both yield `InvalidCredentials`;
    /// a failing store yields `Unavailable`.
    pub async fn login(&self, username: &str, password: &str) -> Result<IssuedToken, AuthError> {
        if username.len() > MAX_USERNAME_LENGTH {
            return Err(AuthError::Malformed(format!(
                "Username exceeds maximum length of {} characters",
                MAX_USERNAME_LENGTH
            )));
        }
        check_password_length(password)?;

        debug!("Login attempt for user: {}", username);

        let credential = self
            .store
            .find_credential_by_username(username)
            .await
            .map_err(|e| {
                error!("Credential lookup failed: {}", e);
                AuthError::Unavailable(e.to_string())
            })?;

        let digest = credential
            .as_ref()
            .map(|c| c.password_hash.clone())
            .unwrap_or_else(|| self.dummy_digest.clone());

        let password_valid = match self.hasher.verify_async(password.to_string(), digest).await {
            Ok(valid) => valid,
            Err(AuthError::MalformedHash) => {
                warn!("Stored password hash for user {} is malformed", username);
                false
            }
            Err(e) => return Err(e),
        };

        let credential = match (credential, password_valid) {
            (Some(c), true) => c,
            _ => {
                metrics::counter!("credgate_logins_total", "outcome" => "failure").increment(1);
                info!("Authentication failed for user: {}", username);
                return Err(AuthError::InvalidCredentials);
            }
        };

        let issued = self.jwt.issue(&credential.username, &credential.role)?;

        self.audit_login(&credential.username).await;

        metrics::counter!("credgate_logins_total", "outcome" => "success").increment(1);
        info!("User {} logged in successfully", credential.username);
        Ok(issued)
    }

    /// Best-effort login audit; never fails the login
    async fn audit_login(&self, username: &str) {
        match tokio::time::timeout(self.audit_timeout, self.store.record_login(username)).await {
            Ok(Ok(())) => debug!("Recorded login for user: {}", username),
            Ok(Err(e)) => warn!("Failed to record login for user {}: {}", username, e),
            Err(_) => warn!(
                "Recording login for user {} timed out after {:?}",
                username, self.audit_timeout
            ),
        }
    }

    /// Create a user, hashing the password before it reaches the store
    pub async fn register(&self, request: RegisterRequest) -> Result<User, AuthError> {
        validate_username(&request.username)?;
        validate_email(&request.email)?;
        validate_new_password(&request.password)?;

        debug!("Registering user: {}", request.username);

        if !self.store.role_exists(request.role_id).await? {
            return Err(AuthError::Malformed(format!(
                "Invalid role_id: {}",
                request.role_id
            )));
        }

        if self
            .store
            .username_or_email_taken(&request.username, &request.email)
            .await?
        {
            return Err(AuthError::AlreadyExists(
                "Username or email already exists".to_string(),
            ));
        }

        let password_hash = self.hasher.hash_async(request.password).await?;

        let user = self
            .store
            .insert_user(NewUser {
                username: request.username,
                email: request.email,
                first: request.first,
                last: request.last,
                phone: request.phone,
                password_hash,
                role_id: request.role_id,
            })
            .await?;

        info!("Registered user: {}", user.username);
        Ok(user)
    }

    /// Rotate a password after re-verifying the current one
    pub async fn change_password(
        &self,
        username: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        check_password_length(old_password)?;
        validate_new_password(new_password)?;

        let credential = self
            .store
            .find_credential_by_username(username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let old_valid = match self
            .hasher
            .verify_async(old_password.to_string(), credential.password_hash)
            .await
        {
            Ok(valid) => valid,
            Err(AuthError::MalformedHash) => {
                warn!("Stored password hash for user {} is malformed", username);
                false
            }
            Err(e) => return Err(e),
        };
        if !old_valid {
            info!("Password change rejected for user {}: wrong old password", username);
            return Err(AuthError::InvalidCredentials);
        }

        let password_hash = self.hasher.hash_async(new_password.to_string()).await?;
        if !self.store.replace_password_hash(username, &password_hash).await? {
            return Err(AuthError::InvalidCredentials);
        }

        info!("Password changed for user: {}", username);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::password::{HashCost, test_hasher};
    use async_trait::async_trait;
    use chrono::Utc;
    use credgate_db::{Credential, DbError};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory store; role ids 1 and 2 are `admin` and `guest`
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        users: Mutex<HashMap<String, User>>,
        logins: Mutex<Vec<String>>,
        fail_lookups: bool,
        fail_audit: bool,
        slow_audit: bool,
    }

    impl MemoryStore {
        pub(crate) fn with_user(self, username: &str, password_hash: String, role_id: i64) -> Self {
            let now = Utc::now();
            let id = self.users.lock().unwrap().len() as i64 + 1;
            self.users.lock().unwrap().insert(
                username.to_string(),
                User {
                    id,
                    username: username.to_string(),
                    email: format!("{}@example.com", username),
                    first: String::new(),
                    last: String::new(),
                    phone: String::new(),
                    password_hash,
                    role_id,
                    created_at: now,
                    updated_at: now,
                },
            );
            self
        }

        pub(crate) fn login_count(&self) -> usize {
            self.logins.lock().unwrap().len()
        }

        fn role_name(role_id: i64) -> Option<&'static str> {
            match role_id {
                1 => Some("admin"),
                2 => Some("guest"),
                _ => None,
            }
        }
    }

    #[async_trait]
    impl CredentialStore for MemoryStore {
        async fn find_credential_by_username(
            &self,
            username: &str,
        ) -> Result<Option<Credential>, DbError> {
            if self.fail_lookups {
                return Err(DbError::Connection(sqlx_pool_closed()));
            }
            Ok(self.users.lock().unwrap().get(username).map(|u| Credential {
                username: u.username.clone(),
                password_hash: u.password_hash.clone(),
                role: Self::role_name(u.role_id).unwrap_or_default().to_string(),
            }))
        }

        async fn username_or_email_taken(
            &self,
            username: &str,
            email: &str,
        ) -> Result<bool, DbError> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .values()
                .any(|u| u.username == username || u.email == email))
        }

        async fn role_exists(&self, role_id: i64) -> Result<bool, DbError> {
            Ok(Self::role_name(role_id).is_some())
        }

        async fn insert_user(&self, user: NewUser) -> Result<User, DbError> {
            let now = Utc::now();
            let mut users = self.users.lock().unwrap();
            let stored = User {
                id: users.len() as i64 + 1,
                username: user.username,
                email: user.email,
                first: user.first,
                last: user.last,
                phone: user.phone,
                password_hash: user.password_hash,
                role_id: user.role_id,
                created_at: now,
                updated_at: now,
            };
            users.insert(stored.username.clone(), stored.clone());
            Ok(stored)
        }

        async fn replace_password_hash(&self, username: &str, hash: &str) -> Result<bool, DbError> {
            Ok(match self.users.lock().unwrap().get_mut(username) {
                Some(user) => {
                    user.password_hash = hash.to_string();
                    true
                }
                None => false,
            })
        }

        async fn record_login(&self, username: &str) -> Result<(), DbError> {
            if self.slow_audit {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            if self.fail_audit {
                return Err(DbError::Connection(sqlx_pool_closed()));
            }
            self.logins.lock().unwrap().push(username.to_string());
            Ok(())
        }
    }

    fn sqlx_pool_closed() -> sqlx::Error {
        sqlx::Error::PoolClosed
    }

    fn jwt() -> Arc<JwtManager> {
        Arc::new(JwtManager::new("flow-test-secret", chrono::Duration::hours(24)).unwrap())
    }

    fn authenticator(store: MemoryStore) -> (Authenticator, Arc<MemoryStore>) {
        let store = Arc::new(store);
        let auth = Authenticator::new(store.clone(), jwt(), test_hasher()).unwrap();
        (auth, store)
    }

    fn store_with_admin(password: &str) -> MemoryStore {
        let digest = test_hasher().hash(password).unwrap();
        MemoryStore::default().with_user("admin", digest, 1)
    }

    #[tokio::test]
    async fn test_login_issues_token_with_role() {
        let (auth, store) = authenticator(store_with_admin("correct"));

        let issued = auth.login("admin", "correct").await.unwrap();
        let claims = auth.jwt().verify(&issued.token).unwrap();
        assert_eq!(claims.sub, "admin");
        assert_eq!(claims.role.as_deref(), Some("admin"));
        assert_eq!(store.login_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_user_and_wrong_password_indistinguishable() {
        let (auth, store) = authenticator(store_with_admin("correct"));

        let wrong_password = auth.login("admin", "wrong").await.unwrap_err();
        let unknown_user = auth.login("nobody", "wrong").await.unwrap_err();

        assert!(matches!(wrong_password, AuthError::InvalidCredentials));
        assert!(matches!(unknown_user, AuthError::InvalidCredentials));
        assert_eq!(wrong_password.parts(), unknown_user.parts());
        assert_eq!(store.login_count(), 0);
    }

    #[test]
    fn test_unknown_user_digest_uses_configured_cost() {
        let cost = HashCost {
            memory_kib: 2048,
            iterations: 2,
            parallelism: 1,
        };
        let hasher = CredentialHasher::new(cost).unwrap();
        let auth = Authenticator::new(Arc::new(MemoryStore::default()), jwt(), hasher).unwrap();

        let parsed = argon2::PasswordHash::new(&auth.dummy_digest).unwrap();
        assert_eq!(parsed.algorithm.as_str(), "argon2id");
        let params = argon2::Params::try_from(&parsed).unwrap();
        assert_eq!(params.m_cost(), cost.memory_kib);
        assert_eq!(params.t_cost(), cost.iterations);
        assert_eq!(params.p_cost(), cost.parallelism);
    }

    #[tokio::test]
    async fn test_store_failure_is_unavailable() {
        let (auth, _) = authenticator(MemoryStore {
            fail_lookups: true,
            ..Default::default()
        });
        assert!(matches!(
            auth.login("admin", "correct").await,
            Err(AuthError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_audit_failure_does_not_fail_login() {
        let mut store = store_with_admin("correct");
        store.fail_audit = true;
        let (auth, store) = authenticator(store);

        assert!(auth.login("admin", "correct").await.is_ok());
        assert_eq!(store.login_count(), 0);
    }

    #[tokio::test]
    async fn test_slow_audit_is_abandoned() {
        let mut store = store_with_admin("correct");
        store.slow_audit = true;
        let (auth, _) = authenticator(store);
        let auth = auth.with_audit_timeout(Duration::from_millis(20));

        let started = std::time::Instant::now();
        assert!(auth.login("admin", "correct").await.is_ok());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_malformed_stored_hash_is_invalid_credentials() {
        let store = MemoryStore::default().with_user("admin", "garbage".to_string(), 1);
        let (auth, _) = authenticator(store);
        assert!(matches!(
            auth.login("admin", "correct").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_oversized_input_is_malformed() {
        let (auth, _) = authenticator(store_with_admin("correct"));
        let long = "x".repeat(MAX_PASSWORD_LENGTH + 1);
        assert!(matches!(
            auth.login("admin", &long).await,
            Err(AuthError::Malformed(_))
        ));
    }

    fn register_request(username: &str, email: &str, role_id: i64) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            username: username.to_string(),
            password: "strongpassword123".to_string(),
            first: "John".to_string(),
            last: "Doe".to_string(),
            phone: "+1234567890".to_string(),
            role_id,
        }
    }

    #[tokio::test]
    async fn test_register_hashes_password() {
        let (auth, _) = authenticator(MemoryStore::default());

        let user = auth
            .register(register_request("johndoe", "john@example.com", 2))
            .await
            .unwrap();
        assert_ne!(user.password_hash, "strongpassword123");
        assert!(
            test_hasher()
                .verify("strongpassword123", &user.password_hash)
                .unwrap()
        );

        let issued = auth.login("johndoe", "strongpassword123").await.unwrap();
        let claims = auth.jwt().verify(&issued.token).unwrap();
        assert_eq!(claims.role.as_deref(), Some("guest"));
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_and_bad_input() {
        let (auth, _) = authenticator(MemoryStore::default());
        auth.register(register_request("johndoe", "john@example.com", 2))
            .await
            .unwrap();

        assert!(matches!(
            auth.register(register_request("johndoe", "other@example.com", 2)).await,
            Err(AuthError::AlreadyExists(_))
        ));
        assert!(matches!(
            auth.register(register_request("jane", "john@example.com", 2)).await,
            Err(AuthError::AlreadyExists(_))
        ));
        assert!(matches!(
            auth.register(register_request("jane", "jane@example.com", 99)).await,
            Err(AuthError::Malformed(_))
        ));
        assert!(matches!(
            auth.register(register_request("bad name", "bad@example.com", 2)).await,
            Err(AuthError::Malformed(_))
        ));

        let mut short = register_request("jane", "jane@example.com", 2);
        short.password = "short".to_string();
        assert!(matches!(auth.register(short).await, Err(AuthError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_change_password_rotates_credential() {
        let (auth, _) = authenticator(store_with_admin("correct-old"));

        auth.change_password("admin", "correct-old", "brand-new-secret")
            .await
            .unwrap();

        assert!(auth.login("admin", "brand-new-secret").await.is_ok());
        assert!(matches!(
            auth.login("admin", "correct-old").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_change_password_requires_old_password() {
        let (auth, _) = authenticator(store_with_admin("correct-old"));

        assert!(matches!(
            auth.change_password("admin", "wrong", "brand-new-secret").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.change_password("admin", "correct-old", "short").await,
            Err(AuthError::Malformed(_))
        ));
        assert!(auth.login("admin", "correct-old").await.is_ok());
    }

    #[test]
    fn test_register_request_debug_redacts_password() {
        let rendered = format!("{:?}", register_request("johndoe", "john@example.com", 2));
        assert!(!rendered.contains("strongpassword123"));
        assert!(rendered.contains("johndoe"));
    }

    #[test]
    fn test_validators() {
        assert!(validate_username("john_doe-1").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("john doe").is_err());
        assert!(validate_username(&"a".repeat(MAX_USERNAME_LENGTH + 1)).is_err());
        assert!(validate_email("a@b").is_ok());
        assert!(validate_email("@b").is_err());
        assert!(validate_email("nope").is_err());
    }
}
