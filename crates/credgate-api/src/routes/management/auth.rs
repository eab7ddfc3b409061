//! Login, registration and password change routes

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::post,
};
use credgate_auth::{AccessRule, RegisterRequest, RequireAuth, SharedPermissionTable};

use crate::error::ApiError;
use crate::state::AppState;

use super::guarded;
use super::types::{
    ApiJson, ChangePasswordRequest, LoginRequest, LoginResponse, MessageResponse, UserResponse,
};

// ==================== Auth Routes ====================

/// POST /api/login
async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let issued = state.auth.login(&request.username, &request.password).await?;

    Ok(Json(LoginResponse {
        token: issued.token,
        expires_in: issued.expires_in,
        expires_at: issued.expires_at,
    }))
}

/// POST /api/register
async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let user = state.auth.register(request).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// POST /api/users/password (any authenticated user, for their own account)
async fn change_password(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .auth
        .change_password(&user.username, &request.old_password, &request.new_password)
        .await?;

    Ok(Json(MessageResponse::new("Password changed successfully")))
}

/// Public auth routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/login", post(login))
        .route("/api/register", post(register))
}

/// Auth routes that need a session
pub fn protected_routes(table: &SharedPermissionTable) -> Router<AppState> {
    guarded(
        Router::new().route("/api/users/password", post(change_password)),
        AccessRule::any(table),
    )
}
