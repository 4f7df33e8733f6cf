//! Login and current-user endpoints.

use axum::{Json, extract::State};
use modzero_core::error::AppError;
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::middleware::AuthUser;
use crate::models::UserResponse;
use crate::services::jwt::TokenResponse;
use crate::startup::AppState;
use crate::utils::password::{Password, PasswordHashString, verify_password};

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Authenticate by username or email and issue an access token.
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    payload.validate()?;

    let user = state
        .db
        .find_user_by_login(&payload.username)
        .await?
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Incorrect username or password")))?;

    verify_password(
        &Password::new(payload.password),
        &PasswordHashString::new(user.password_hash.clone()),
    )
    .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Incorrect username or password")))?;

    let token = state
        .jwt
        .issue(&user.user_id.to_string(), &user.username, &user.role)?;

    info!(user_id = %user.user_id, "User logged in");

    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer".to_string(),
        expires_in: state.jwt.expiry_minutes() * 60,
    }))
}

/// Return the authenticated user.
pub async fn me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .db
        .get_user(auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;
    Ok(Json(user.into()))
}
