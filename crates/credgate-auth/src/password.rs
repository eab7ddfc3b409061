//! Password hashing
//!
//! Argon2id with a fresh random salt per hash. Digests are PHC strings that
//! embed the algorithm, cost parameters and salt, so verification needs
//! nothing but the digest itself.

use argon2::password_hash::{self, SaltString, rand_core::OsRng};
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Argon2 cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashCost {
    /// Memory size in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Degree of parallelism
    pub parallelism: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

/// One-way credential hasher with a tunable cost
#[derive(Debug, Clone)]
pub struct CredentialHasher {
    params: Params,
}

impl CredentialHasher {
    /// Create a hasher, rejecting cost parameters argon2 does not accept
    pub fn new(cost: HashCost) -> Result<Self, AuthError> {
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|e| AuthError::Internal(format!("invalid hash cost: {}", e)))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password with a newly generated salt
    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Internal(format!("password hashing failed: {}", e)))
    }

    /// Verify a password against a stored digest
    ///
    /// Returns `Ok(false)` on mismatch and `Err(MalformedHash)` only when the
    /// digest cannot be parsed. The digest's own parameters are used, so
    /// hashes created under an older cost setting keep verifying.
    pub fn verify(&self, password: &str, digest: &str) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(digest).map_err(|_| AuthError::MalformedHash)?;
        match self.argon2().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(_) => Err(AuthError::MalformedHash),
        }
    }

    /// [`hash`](Self::hash) on the blocking thread pool
    pub async fn hash_async(&self, password: String) -> Result<String, AuthError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::Internal(format!("hashing task failed: {}", e)))?
    }

    /// [`verify`](Self::verify) on the blocking thread pool
    pub async fn verify_async(&self, password: String, digest: String) -> Result<bool, AuthError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &digest))
            .await
            .map_err(|e| AuthError::Internal(format!("verification task failed: {}", e)))?
    }
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_hasher() -> CredentialHasher {
    CredentialHasher::new(HashCost {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    })
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_round_trip() {
        let hasher = test_hasher();
        let long = "x".repeat(256);
        for password in ["correct", "", "päßwörd with spaces", long.as_str()] {
            let digest = hasher.hash(password).unwrap();
            assert!(hasher.verify(password, &digest).unwrap());
        }
    }

    #[test]
    fn test_hash_is_salted() {
        let hasher = test_hasher();
        let first = hasher.hash("correct").unwrap();
        let second = hasher.hash("correct").unwrap();

        assert_ne!(first, second);
        assert!(hasher.verify("correct", &first).unwrap());
        assert!(hasher.verify("correct", &second).unwrap());
        assert!(first.starts_with("$argon2id$"));
    }

    #[test]
    fn test_wrong_password_is_false_not_error() {
        let hasher = test_hasher();
        let digest = hasher.hash("correct").unwrap();
        assert!(!hasher.verify("wrong", &digest).unwrap());
    }

    #[test]
    fn test_malformed_digest_is_error() {
        let hasher = test_hasher();
        assert!(matches!(
            hasher.verify("correct", "not-a-phc-string"),
            Err(AuthError::MalformedHash)
        ));
    }

    #[test]
    fn test_digest_carries_its_own_cost() {
        let cheap = test_hasher();
        let digest = cheap.hash("correct").unwrap();

        // A hasher configured with a different cost still verifies older digests.
        let other = CredentialHasher::new(HashCost {
            memory_kib: 2048,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();
        assert!(other.verify("correct", &digest).unwrap());
    }

    #[test]
    fn test_invalid_cost_rejected() {
        let result = CredentialHasher::new(HashCost {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        });
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_async_wrappers() {
        let hasher = test_hasher();
        let digest = hasher.hash_async("correct".to_string()).await.unwrap();
        assert!(
            hasher
                .verify_async("correct".to_string(), digest.clone())
                .await
                .unwrap()
        );
        assert!(!hasher.verify_async("wrong".to_string(), digest).await.unwrap());
    }
}
