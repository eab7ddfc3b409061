//! User management routes

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
};
use credgate_auth::{AccessRule, RegisterRequest, SharedPermissionTable, flow::validate_email};
use credgate_db::UpdateUser;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;

use super::guarded;
use super::types::{ApiJson, UpdateUserRequest, UserResponse};

// ==================== User Routes ====================

/// GET /api/users
async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = state.db.list_users().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// POST /api/users
async fn create_user(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let user = state.auth.register(request).await?;
    info!("Created user: {}", user.username);
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// GET /api/users/{id}
async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state
        .db
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User: {}", id)))?;

    Ok(Json(user.into()))
}

/// GET /api/users/email/{email}
async fn get_user_by_email(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state
        .db
        .get_user_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User with email: {}", email)))?;

    Ok(Json(user.into()))
}

/// GET /api/users/username/{username}
async fn get_user_by_username(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state
        .db
        .get_user_by_username(&username)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User: {}", username)))?;

    Ok(Json(user.into()))
}

/// GET /api/users/role/{role_id}
async fn list_users_by_role(
    State(state): State<AppState>,
    Path(role_id): Path<i64>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = state.db.list_users_by_role(role_id).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// PUT /api/users/{id}
///
/// Profile and role changes only; passwords change through
/// `POST /api/users/password`.
async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(request): ApiJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    debug!("Updating user: {}", id);

    if let Some(email) = &request.email {
        validate_email(email)?;
    }
    if let Some(role_id) = request.role_id {
        if state.db.get_role_by_id(role_id).await?.is_none() {
            return Err(ApiError::BadRequest(format!("Invalid role_id: {}", role_id)));
        }
    }

    let update = UpdateUser {
        email: request.email,
        first: request.first,
        last: request.last,
        phone: request.phone,
        role_id: request.role_id,
    };
    if !state.db.update_user(id, &update).await? {
        return Err(ApiError::NotFound(format!("User: {}", id)));
    }

    let user = state
        .db
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User: {}", id)))?;

    info!("Updated user: {}", user.username);
    Ok(Json(user.into()))
}

/// DELETE /api/users/{id}
async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    debug!("Deleting user: {}", id);

    if state.db.delete_user(id).await? {
        info!("Deleted user: {}", id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("User: {}", id)))
    }
}

/// Create user routes
pub fn routes(table: &SharedPermissionTable) -> Router<AppState> {
    let readers = Router::new()
        .route("/api/users", get(list_users))
        .route("/api/users/{id}", get(get_user))
        .route("/api/users/email/{email}", get(get_user_by_email))
        .route("/api/users/username/{username}", get(get_user_by_username))
        .route("/api/users/role/{role_id}", get(list_users_by_role));

    guarded(readers, AccessRule::permission(table, "read"))
        .merge(guarded(
            Router::new().route("/api/users", post(create_user)),
            AccessRule::permission(table, "create"),
        ))
        .merge(guarded(
            Router::new().route("/api/users/{id}", put(update_user)),
            AccessRule::permission(table, "update"),
        ))
        .merge(guarded(
            Router::new().route("/api/users/{id}", delete(delete_user)),
            AccessRule::permission(table, "delete"),
        ))
}
