//! Directory integration endpoints (admin only).

use axum::{
    Json,
    extract::{Path, Query, State},
};
use modzero_core::error::AppError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::middleware::AdminUser;
use crate::models::{ConnectionStatus, DirectoryUser};
use crate::services::BatchSyncResult;
use crate::services::reconcile::UserSyncRecord;
use crate::startup::AppState;

const MAX_TOP: u32 = 999;

#[derive(Debug, Deserialize)]
pub struct DirectoryQuery {
    pub top: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SyncOptions {
    pub top: Option<u32>,
    #[serde(default)]
    pub override_disabled: bool,
}

fn clamp_top(top: Option<u32>) -> u32 {
    top.unwrap_or(100).min(MAX_TOP)
}

/// Probe directory connectivity.
pub async fn test_connection(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Json<ConnectionStatus> {
    Json(state.directory.test_connection().await)
}

#[derive(Debug, Serialize)]
pub struct DirectoryUserView {
    #[serde(flatten)]
    pub user: DirectoryUser,
    pub is_synced: bool,
}

#[derive(Debug, Serialize)]
pub struct DirectoryUserList {
    pub total: usize,
    pub users: Vec<DirectoryUserView>,
}

/// List directory users, flagging those already synced locally.
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(query): Query<DirectoryQuery>,
) -> Result<Json<DirectoryUserList>, AppError> {
    let users = state.directory.list_users(clamp_top(query.top)).await?;
    let synced: HashSet<String> = state.db.list_external_ids().await?.into_iter().collect();

    let views: Vec<DirectoryUserView> = users
        .into_iter()
        .map(|user| {
            let is_synced = synced.contains(&user.id);
            DirectoryUserView { user, is_synced }
        })
        .collect();

    Ok(Json(DirectoryUserList {
        total: views.len(),
        users: views,
    }))
}

pub async fn get_user(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(external_id): Path<String>,
) -> Result<Json<DirectoryUser>, AppError> {
    let user = state
        .directory
        .get_user(&external_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found in directory")))?;
    Ok(Json(user))
}

/// Sync one directory user into the local identity store.
pub async fn sync_user(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(external_id): Path<String>,
    Query(options): Query<SyncOptions>,
) -> Result<Json<UserSyncRecord>, AppError> {
    let record = state
        .reconciler
        .sync_one(&external_id, options.override_disabled)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found in directory")))?;
    Ok(Json(record))
}

/// Sync a batch of directory users. Individual failures do not abort the
/// batch; service shutdown stops new syncs from starting.
pub async fn sync_all(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(options): Query<SyncOptions>,
) -> Result<Json<BatchSyncResult>, AppError> {
    let result = state
        .reconciler
        .sync_all(
            clamp_top(options.top),
            options.override_disabled,
            state.shutdown.child_token(),
        )
        .await?;
    Ok(Json(result))
}
