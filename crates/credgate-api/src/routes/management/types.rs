//! Request and response types for the management API

use axum::extract::FromRequest;
use credgate_db::{LoginRecord, Role, User};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// JSON body extractor whose rejections use the API error shape
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

// ==================== Auth ====================

/// Login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response
#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: i64,
    pub expires_at: i64,
}

/// Password change request
#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(rename = "oldPassword")]
    pub old_password: String,
    #[serde(rename = "newPassword")]
    pub new_password: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ==================== Users ====================

/// Update user request; absent fields are left unchanged
#[derive(Deserialize, Default)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub first: Option<String>,
    pub last: Option<String>,
    pub phone: Option<String>,
    pub role_id: Option<i64>,
}

/// User response (without password)
#[derive(Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first: String,
    pub last: String,
    pub phone: String,
    pub role_id: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            first: u.first,
            last: u.last,
            phone: u.phone,
            role_id: u.role_id,
            created_at: u.created_at.to_rfc3339(),
            updated_at: u.updated_at.to_rfc3339(),
        }
    }
}

// ==================== Roles ====================

#[derive(Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Serialize)]
pub struct RoleResponse {
    pub id: i64,
    pub name: String,
    pub permissions: Vec<String>,
    pub created_at: String,
}

impl From<Role> for RoleResponse {
    fn from(r: Role) -> Self {
        Self {
            id: r.id,
            name: r.name,
            permissions: r.permissions.into_iter().collect(),
            created_at: r.created_at.to_rfc3339(),
        }
    }
}

// ==================== Login Audit ====================

/// Query parameters for the login audit listing
#[derive(Deserialize)]
pub struct LoginRecordsQuery {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub offset: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Serialize)]
pub struct LoginRecordResponse {
    pub id: i64,
    pub username: String,
    pub login_time: String,
}

impl From<LoginRecord> for LoginRecordResponse {
    fn from(r: LoginRecord) -> Self {
        Self {
            id: r.id,
            username: r.username,
            login_time: r.login_time.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct LoginRecordsListResponse {
    pub logins: Vec<LoginRecordResponse>,
    pub total: i64,
    pub offset: i64,
    pub limit: i64,
}
