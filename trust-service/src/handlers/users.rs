//! User management endpoints.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use modzero_core::error::AppError;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::middleware::{AdminUser, AuthUser};
use crate::models::{Role, UserResponse};
use crate::startup::AppState;
use crate::utils::password::{Password, hash_password};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 255))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
    pub role: Role,
}

pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let users = state.db.list_users().await?;
    Ok(Json(users.into_iter().map(Into::into).collect()))
}

pub async fn create_user(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    payload.validate()?;

    let hash = hash_password(&Password::new(payload.password))?;
    let user = state
        .db
        .create_user(
            &payload.username,
            &payload.email,
            hash.as_str(),
            payload.role.as_str(),
        )
        .await?;

    info!(user_id = %user.user_id, role = %payload.role, "User registered");
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Fetch one user. Admins may fetch anyone; regular users only themselves.
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserResponse>, AppError> {
    if user_id != auth.user_id && !auth.is_admin() {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Not authorised to view this user"
        )));
    }

    let user = state
        .db
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;
    Ok(Json(user.into()))
}

/// Delete a user and their devices. Historical attempts are retained.
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.db.delete_user(user_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(anyhow::anyhow!("User not found")))
    }
}
