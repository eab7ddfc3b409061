//! Role routes

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use credgate_auth::{AccessRule, SharedPermissionTable};
use credgate_db::NewRole;
use std::collections::BTreeSet;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

use super::guarded;
use super::types::{ApiJson, CreateRoleRequest, RoleResponse};

/// Maximum allowed role name length
const MAX_ROLE_NAME_LENGTH: usize = 64;

/// Role names are plain identifiers: letters, digits, `_` and `-`
fn validate_role_name(name: &str) -> Result<(), ApiError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_ROLE_NAME_LENGTH
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "Invalid role name '{}': use 1-{} letters, digits, underscores or hyphens",
            name, MAX_ROLE_NAME_LENGTH
        )))
    }
}

/// GET /api/roles
async fn list_roles(State(state): State<AppState>) -> Result<Json<Vec<RoleResponse>>, ApiError> {
    let roles = state.db.list_roles().await?;
    Ok(Json(roles.into_iter().map(RoleResponse::from).collect()))
}

/// GET /api/roles/{id}
async fn get_role(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<RoleResponse>, ApiError> {
    let role = state
        .db
        .get_role_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Role: {}", id)))?;

    Ok(Json(role.into()))
}

/// GET /api/roles/name/{name}
async fn get_role_by_name(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<RoleResponse>, ApiError> {
    let role = state
        .db
        .get_role_by_name(&name)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Role: {}", name)))?;

    Ok(Json(role.into()))
}

/// POST /api/roles
///
/// The new role is added to the live permission table once stored.
async fn create_role(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateRoleRequest>,
) -> Result<(StatusCode, Json<RoleResponse>), ApiError> {
    validate_role_name(&request.name)?;

    let permissions: BTreeSet<String> = request
        .permissions
        .into_iter()
        .map(|p| p.trim().to_string())
        .collect();
    if permissions.iter().any(String::is_empty) {
        return Err(ApiError::BadRequest(
            "Permission names cannot be empty".to_string(),
        ));
    }

    let role = state
        .db
        .insert_role(NewRole {
            name: request.name,
            permissions,
        })
        .await?;

    state
        .permissions
        .write()
        .insert_role(role.name.clone(), role.permissions.iter().cloned());

    info!("Created role: {}", role.name);
    Ok((StatusCode::CREATED, Json(role.into())))
}

/// Create role routes
pub fn routes(table: &SharedPermissionTable) -> Router<AppState> {
    let readers = Router::new()
        .route("/api/roles", get(list_roles))
        .route("/api/roles/{id}", get(get_role))
        .route("/api/roles/name/{name}", get(get_role_by_name));

    guarded(readers, AccessRule::permission(table, "read")).merge(guarded(
        Router::new().route("/api/roles", post(create_role)),
        AccessRule::permission(table, "create"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_role_name() {
        assert!(validate_role_name("editor").is_ok());
        assert!(validate_role_name("read-only_2").is_ok());
        assert!(validate_role_name(&"r".repeat(MAX_ROLE_NAME_LENGTH)).is_ok());

        for bad in ["", "two words", "../admin", "rôle", "a/b"] {
            assert!(
                matches!(validate_role_name(bad), Err(ApiError::BadRequest(_))),
                "{:?}",
                bad
            );
        }
        assert!(validate_role_name(&"r".repeat(MAX_ROLE_NAME_LENGTH + 1)).is_err());
    }
}
