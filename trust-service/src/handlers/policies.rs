//! Policy management endpoints (admin only).

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use modzero_core::error::AppError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

use crate::middleware::AdminUser;
use crate::models::Policy;
use crate::startup::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct PolicyRequest {
    #[validate(length(min = 1, max = 255))]
    pub policy_name: String,
    #[validate(range(min = 0.0, max = 100.0))]
    pub min_trust_threshold: f64,
    pub description: Option<String>,
    pub target_group: Option<String>,
    #[serde(default)]
    pub factor_weights: BTreeMap<String, f64>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl PolicyRequest {
    fn check_weights(&self) -> Result<(), AppError> {
        for (name, weight) in &self.factor_weights {
            if !(0.0..=1.0).contains(weight) {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Weight for factor '{}' must be in [0, 1]",
                    name
                )));
            }
        }
        Ok(())
    }

    fn weights_json(&self) -> Result<serde_json::Value, AppError> {
        serde_json::to_value(&self.factor_weights)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!(e)))
    }
}

#[derive(Debug, Serialize)]
pub struct PolicyResponse {
    pub policy_id: Uuid,
    pub user_id: Uuid,
    pub policy_name: String,
    pub min_trust_threshold: f64,
    pub description: Option<String>,
    pub target_group: Option<String>,
    pub is_active: bool,
    pub weights: BTreeMap<String, f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Policy> for PolicyResponse {
    fn from(policy: Policy) -> Self {
        let weights = policy.weights();
        Self {
            policy_id: policy.policy_id,
            user_id: policy.user_id,
            policy_name: policy.policy_name,
            min_trust_threshold: policy.min_trust_threshold,
            description: policy.description,
            target_group: policy.target_group,
            is_active: policy.is_active,
            weights,
            created_at: policy.created_at,
            updated_at: policy.updated_at,
        }
    }
}

pub async fn list_policies(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Json<Vec<PolicyResponse>>, AppError> {
    let policies = state.db.list_policies().await?;
    Ok(Json(policies.into_iter().map(Into::into).collect()))
}

pub async fn create_policy(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<PolicyRequest>,
) -> Result<(StatusCode, Json<PolicyResponse>), AppError> {
    payload.validate()?;
    payload.check_weights()?;

    let policy = state
        .db
        .create_policy(
            admin.user_id,
            &payload.policy_name,
            payload.min_trust_threshold,
            payload.description.as_deref(),
            payload.target_group.as_deref(),
            &payload.weights_json()?,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(policy.into())))
}

pub async fn get_policy(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(policy_id): Path<Uuid>,
) -> Result<Json<PolicyResponse>, AppError> {
    let policy = state
        .db
        .get_policy(policy_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Policy not found")))?;
    Ok(Json(policy.into()))
}

/// Replace a policy. Threshold and weights change together in one UPDATE so
/// evaluations never observe a half-applied policy.
pub async fn update_policy(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(policy_id): Path<Uuid>,
    Json(payload): Json<PolicyRequest>,
) -> Result<Json<PolicyResponse>, AppError> {
    payload.validate()?;
    payload.check_weights()?;

    let policy = state
        .db
        .update_policy(
            policy_id,
            &payload.policy_name,
            payload.min_trust_threshold,
            payload.description.as_deref(),
            payload.target_group.as_deref(),
            payload.is_active,
            &payload.weights_json()?,
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Policy not found")))?;

    Ok(Json(policy.into()))
}

pub async fn delete_policy(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(policy_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.db.delete_policy(policy_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(anyhow::anyhow!("Policy not found")))
    }
}
