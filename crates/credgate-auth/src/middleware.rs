//! Authentication and authorization middleware for Axum
//!
//! `authenticate` turns a bearer token into an [`AuthUser`] request
//! extension. `authorize` checks that extension against an [`AccessRule`].
//! Stack them with `route_layer`, adding `authenticate` last so it runs first.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::error::AuthError;
use crate::jwt::{Claims, JwtManager};
use crate::policy::AccessRule;

/// Authenticated principal, derived from verified claims only
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthUser {
    pub username: String,
    pub role: Option<String>,
}

impl AuthUser {
    /// Create from JWT claims
    pub fn from_claims(claims: &Claims) -> Self {
        Self {
            username: claims.sub.clone(),
            role: claims.role.clone().filter(|r| !r.is_empty()),
        }
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }
}

/// Extract bearer token from an authorization header value
pub fn extract_bearer_token(header: &str) -> Result<&str, AuthError> {
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::Unauthenticated)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::Unauthenticated);
    }
    Ok(token)
}

/// Authentication middleware
///
/// Rejects the request unless it carries a valid bearer token, then adds the
/// `AuthUser` to request extensions.
pub async fn authenticate(
    State(jwt_manager): State<Arc<JwtManager>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::Unauthenticated)?;

    let token = extract_bearer_token(header)?;
    let claims = jwt_manager.verify(token)?;
    let user = AuthUser::from_claims(&claims);

    debug!(
        "Authenticated user: {} ({})",
        user.username,
        user.role().unwrap_or("-")
    );

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Authorization middleware; must run after `authenticate`
pub async fn authorize(
    State(rule): State<AccessRule>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::Unauthenticated)?;

    if !rule.allows(user.role()) {
        debug!(
            "Denied {} ({}) for {:?}",
            user.username,
            user.role().unwrap_or("-"),
            rule.requirement
        );
        return Err(AuthError::Forbidden);
    }

    Ok(next.run(request).await)
}

/// Handler extractor for the principal placed by `authenticate`
pub struct RequireAuth(pub AuthUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(RequireAuth)
            .ok_or(AuthError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PermissionTable;
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request as HttpRequest, StatusCode},
        middleware::from_fn_with_state,
        routing::get,
    };
    use chrono::Duration;
    use tower::ServiceExt;

    fn jwt() -> Arc<JwtManager> {
        Arc::new(JwtManager::new("middleware-test-secret", Duration::hours(1)).unwrap())
    }

    async fn whoami(RequireAuth(user): RequireAuth) -> String {
        user.username
    }

    fn router(jwt: Arc<JwtManager>) -> Router {
        let table = PermissionTable::seeded().into_shared();
        let admin_only = Router::new()
            .route("/admin", get(whoami))
            .route_layer(from_fn_with_state(AccessRule::role(&table, "admin"), authorize));
        let readers = Router::new()
            .route("/read", get(whoami))
            .route_layer(from_fn_with_state(AccessRule::permission(&table, "read"), authorize));
        let writers = Router::new()
            .route("/write", get(whoami))
            .route_layer(from_fn_with_state(
                AccessRule::permission(&table, "create"),
                authorize,
            ));

        admin_only
            .merge(readers)
            .merge(writers)
            .route("/me", get(whoami))
            .route_layer(from_fn_with_state(jwt, authenticate))
            .route("/open", get(|| async { "open" }))
    }

    async fn send(router: &Router, path: &str, auth: Option<&str>) -> (StatusCode, String) {
        let mut builder = HttpRequest::builder().uri(path);
        if let Some(value) = auth {
            builder = builder.header(AUTHORIZATION, value);
        }
        let response = router
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    fn bearer(jwt: &JwtManager, username: &str, role: &str) -> String {
        format!("Bearer {}", jwt.issue(username, role).unwrap().token)
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc").unwrap(), "abc");
        assert!(extract_bearer_token("Basic abc").is_err());
        assert!(extract_bearer_token("Bearer ").is_err());
        assert!(extract_bearer_token("Bearer    ").is_err());
        assert!(extract_bearer_token("bearer abc").is_err());
    }

    #[tokio::test]
    async fn test_public_route_needs_no_token() {
        let router = router(jwt());
        assert_eq!(send(&router, "/open", None).await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_token_problems_are_indistinguishable() {
        let jwt = jwt();
        let router = router(jwt.clone());
        let foreign = JwtManager::new("someone-else", Duration::hours(1)).unwrap();
        let expired = jwt
            .issue_at("admin", "admin", chrono::Utc::now().timestamp() - 7200)
            .unwrap()
            .token;

        let missing = send(&router, "/me", None).await;
        let cases = [
            "Basic YWRtaW46YWRtaW4=".to_string(),
            "Bearer ".to_string(),
            "Bearer not-a-token".to_string(),
            bearer(&foreign, "admin", "admin"),
            format!("Bearer {}", expired),
        ];

        assert_eq!(missing.0, StatusCode::UNAUTHORIZED);
        for header in &cases {
            assert_eq!(send(&router, "/me", Some(header)).await, missing, "{}", header);
        }
    }

    #[tokio::test]
    async fn test_valid_token_reaches_handler() {
        let jwt = jwt();
        let router = router(jwt.clone());
        let (status, body) = send(&router, "/me", Some(&bearer(&jwt, "alice", "guest"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "alice");
    }

    #[tokio::test]
    async fn test_guest_forbidden_on_admin_route() {
        let jwt = jwt();
        let router = router(jwt.clone());
        let guest = bearer(&jwt, "bob", "guest");
        let admin = bearer(&jwt, "root", "admin");

        let (status, body) = send(&router, "/admin", Some(&guest)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body.contains("FORBIDDEN"));
        assert_eq!(send(&router, "/admin", Some(&admin)).await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_permission_routes() {
        let jwt = jwt();
        let router = router(jwt.clone());
        let guest = bearer(&jwt, "bob", "guest");
        let admin = bearer(&jwt, "root", "admin");

        assert_eq!(send(&router, "/read", Some(&guest)).await.0, StatusCode::OK);
        assert_eq!(send(&router, "/write", Some(&guest)).await.0, StatusCode::FORBIDDEN);
        assert_eq!(send(&router, "/write", Some(&admin)).await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_role_claim_is_forbidden() {
        let jwt = jwt();
        let router = router(jwt.clone());
        let now = chrono::Utc::now().timestamp();
        let token = jwt
            .sign(&Claims {
                sub: "ghost".to_string(),
                role: None,
                iat: now,
                exp: now + 600,
            })
            .unwrap();
        let header = format!("Bearer {}", token);

        assert_eq!(send(&router, "/me", Some(&header)).await.0, StatusCode::OK);
        assert_eq!(send(&router, "/read", Some(&header)).await.0, StatusCode::FORBIDDEN);
        assert_eq!(send(&router, "/admin", Some(&header)).await.0, StatusCode::FORBIDDEN);
    }
}
