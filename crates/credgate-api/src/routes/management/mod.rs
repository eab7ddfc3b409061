//! Management API routes
//!
//! Login and registration are public. Everything else sits behind the
//! bearer-token gate plus a per-route access rule.

pub mod auth;
pub mod logins;
pub mod roles;
pub mod types;
pub mod users;

use axum::{Router, middleware::from_fn_with_state};
use credgate_auth::{AccessRule, authenticate, authorize};

use crate::state::AppState;

pub use types::*;

/// Attach an access rule to every route in `router`
fn guarded(router: Router<AppState>, rule: AccessRule) -> Router<AppState> {
    router.route_layer(from_fn_with_state(rule, authorize))
}

/// Create management API routes
pub fn routes(state: &AppState) -> Router<AppState> {
    let table = &state.permissions;

    let protected = Router::new()
        .merge(auth::protected_routes(table))
        .merge(users::routes(table))
        .merge(roles::routes(table))
        .merge(logins::routes(table))
        .route_layer(from_fn_with_state(state.jwt.clone(), authenticate));

    Router::new().merge(auth::routes()).merge(protected)
}
