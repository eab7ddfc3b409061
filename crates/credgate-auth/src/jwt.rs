//! JWT token management

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AuthError;

/// The only signing algorithm issued or accepted
const ALGORITHM: Algorithm = Algorithm::HS256;

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (username)
    pub sub: String,
    /// Role name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// A freshly signed token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    /// Expiration time (Unix timestamp)
    pub expires_at: i64,
    /// Lifetime in seconds
    pub expires_in: i64,
}

/// JWT manager for token generation and validation
///
/// Holds the process-wide signing secret. Tokens are never stored; a valid
/// signature and an unexpired `exp` are the whole proof of authentication.
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl JwtManager {
    /// Create a new JWT manager
    ///
    /// An empty secret would make every token forgeable, so it is refused.
    pub fn new(secret: &str, ttl: Duration) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::Unavailable(
                "token signing secret is not configured".to_string(),
            ));
        }
        if ttl <= Duration::zero() {
            return Err(AuthError::Internal("token TTL must be positive".to_string()));
        }

        let mut validation = Validation::new(ALGORITHM);
        // Expiry is checked against an explicit clock in `verify_at`.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        })
    }

    /// Token lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Generate a token for a user
    pub fn issue(&self, username: &str, role: &str) -> Result<IssuedToken, AuthError> {
        self.issue_at(username, role, Utc::now().timestamp())
    }

    /// Generate a token as if the current time were `now`
    pub fn issue_at(&self, username: &str, role: &str, now: i64) -> Result<IssuedToken, AuthError> {
        let exp = now
            .checked_add(self.ttl.num_seconds())
            .ok_or_else(|| AuthError::Internal("token expiry overflows".to_string()))?;
        let claims = Claims {
            sub: username.to_string(),
            role: Some(role.to_string()),
            iat: now,
            exp,
        };

        debug!("Generating token for user: {}", username);

        Ok(IssuedToken {
            token: self.sign(&claims)?,
            expires_at: claims.exp,
            expires_in: self.ttl.num_seconds(),
        })
    }

    /// Sign arbitrary claims
    pub fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(ALGORITHM), claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("token signing failed: {}", e)))
    }

    /// Validate a token and return its claims
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Validate a token as if the current time were `now`
    ///
    /// Signature, algorithm and expiry failures all collapse into
    /// `InvalidToken`; the reason is only logged.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<Claims, AuthError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                debug!("Token rejected: {}", e);
                AuthError::InvalidToken
            })?;

        if token_data.claims.exp <= now {
            debug!(
                "Token rejected: expired at {} for user {}",
                token_data.claims.exp, token_data.claims.sub
            );
            return Err(AuthError::InvalidToken);
        }

        Ok(token_data.claims)
    }
}
