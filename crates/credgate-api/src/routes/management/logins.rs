//! Login audit routes

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use credgate_auth::{AccessRule, SharedPermissionTable};
use credgate_db::LoginRecordQuery;

use crate::error::ApiError;
use crate::state::AppState;

use super::guarded;
use super::types::{LoginRecordResponse, LoginRecordsListResponse, LoginRecordsQuery};

/// Largest page the listing returns
const MAX_PAGE_SIZE: i64 = 100;

/// GET /api/logins (admin role only)
async fn list_login_records(
    State(state): State<AppState>,
    Query(query): Query<LoginRecordsQuery>,
) -> Result<Json<LoginRecordsListResponse>, ApiError> {
    let offset = query.offset.max(0);
    let limit = query.limit.clamp(1, MAX_PAGE_SIZE);

    let (records, total) = state
        .db
        .list_login_records(LoginRecordQuery {
            username: query.username,
            offset,
            limit,
        })
        .await?;

    Ok(Json(LoginRecordsListResponse {
        logins: records.into_iter().map(LoginRecordResponse::from).collect(),
        total,
        offset,
        limit,
    }))
}

/// Create login audit routes
pub fn routes(table: &SharedPermissionTable) -> Router<AppState> {
    guarded(
        Router::new().route("/api/logins", get(list_login_records)),
        AccessRule::role(table, "admin"),
    )
}
