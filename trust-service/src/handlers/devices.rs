//! Device registration endpoints.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use modzero_core::error::AppError;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::middleware::AuthUser;
use crate::models::Device;
use crate::startup::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterDeviceRequest {
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub device_name: String,
    #[validate(length(max = 128))]
    pub os_version: Option<String>,
    #[validate(length(max = 255))]
    pub fingerprint: Option<String>,
}

/// List devices. Admins see all; regular users their own.
pub async fn list_devices(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<Device>>, AppError> {
    let filter = if auth.is_admin() {
        None
    } else {
        Some(auth.user_id)
    };
    let devices = state.db.list_devices(filter).await?;
    Ok(Json(devices))
}

/// Register a device. Re-registering the same fingerprint refreshes the
/// existing row. Regular users may only register their own devices.
pub async fn register_device(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<RegisterDeviceRequest>,
) -> Result<(StatusCode, Json<Device>), AppError> {
    payload.validate()?;

    if payload.user_id != auth.user_id && !auth.is_admin() {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Not authorised to add device for another user"
        )));
    }

    state
        .db
        .get_user(payload.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;

    let device = state
        .db
        .upsert_device(
            payload.user_id,
            &payload.device_name,
            payload.os_version.as_deref(),
            payload.fingerprint.as_deref(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(device)))
}

pub async fn get_device(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(device_id): Path<Uuid>,
) -> Result<Json<Device>, AppError> {
    let device = state
        .db
        .get_device(device_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Device not found")))?;

    if device.user_id != auth.user_id && !auth.is_admin() {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Not authorised to view this device"
        )));
    }
    Ok(Json(device))
}

pub async fn delete_device(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(device_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let device = state
        .db
        .get_device(device_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Device not found")))?;

    if device.user_id != auth.user_id && !auth.is_admin() {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Not authorised to delete this device"
        )));
    }

    state.db.delete_device(device_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
