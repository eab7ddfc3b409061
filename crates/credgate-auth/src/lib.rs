//! Credgate Authentication and Authorization
//!
//! Password hashing, stateless JWT sessions, the login/registration flow
//! and the role/permission policy enforced by the HTTP middleware.

pub mod error;
pub mod flow;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod policy;
pub mod store;

pub use error::AuthError;
pub use flow::{Authenticator, RegisterRequest};
pub use jwt::{Claims, IssuedToken, JwtManager};
pub use middleware::{AuthUser, RequireAuth, authenticate, authorize, extract_bearer_token};
pub use password::{CredentialHasher, HashCost};
pub use policy::{AccessRule, PermissionTable, Requirement, SharedPermissionTable, seed_roles};
pub use store::CredentialStore;
