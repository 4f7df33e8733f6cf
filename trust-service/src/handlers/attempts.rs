//! Trust evaluation and attempt ledger endpoints.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use modzero_core::error::AppError;
use serde::Deserialize;
use std::net::IpAddr;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::engine::{DeviceContext, IdentityContext, NetworkContext, RequestContext};
use crate::error::TrustError;
use crate::middleware::AuthUser;
use crate::models::{AttemptResponse, Decision, NewAttempt};
use crate::services::ledger::StatsSnapshot;
use crate::startup::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAttemptRequest {
    pub user_id: Uuid,
    pub device_id: Option<Uuid>,
    pub ip_address: Option<String>,
    #[validate(length(max = 128))]
    pub geo_location: Option<String>,
    #[validate(length(max = 128))]
    pub target_group: Option<String>,
}

/// Evaluate trust for an access attempt and record the outcome.
///
/// Regular users may only create attempts for themselves. When no active
/// policy covers the target group the request is denied and an explicit
/// deny attempt is recorded; evaluation never fails open or silently.
pub async fn create_attempt(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateAttemptRequest>,
) -> Result<(StatusCode, Json<AttemptResponse>), AppError> {
    payload.validate()?;

    if payload.user_id != auth.user_id && !auth.is_admin() {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Not authorised to create attempt for another user"
        )));
    }

    let user = state
        .db
        .get_user(payload.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;

    let ip: Option<IpAddr> = match &payload.ip_address {
        Some(raw) => Some(
            raw.parse()
                .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid IP address")))?,
        ),
        None => None,
    };

    let device = match payload.device_id {
        Some(device_id) => {
            let device = state
                .db
                .get_device(device_id)
                .await?
                .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Device not found")))?;
            if device.user_id != payload.user_id {
                return Err(AppError::Forbidden(anyhow::anyhow!(
                    "Device belongs to another user"
                )));
            }
            DeviceContext {
                fingerprint: device.fingerprint,
                checks_passed: device.checks_passed.max(0) as u32,
                checks_total: device.checks_total.max(0) as u32,
            }
        }
        None => DeviceContext::default(),
    };

    let now = Utc::now();
    let ctx = RequestContext {
        identity: IdentityContext {
            username: user.username.clone(),
            group: payload.target_group.clone().or(user.department.clone()),
        },
        device,
        network: NetworkContext {
            ip,
            geo_location: payload.geo_location.clone(),
            trusted_cidrs: state.db.list_network_cidrs().await?,
            at: now,
        },
    };

    let target_group = ctx.identity.group.clone();
    let policy = state.db.find_active_policy(target_group.as_deref()).await?;

    let attempt = match policy {
        Some(policy) => {
            let eval = state.engine.evaluate(&ctx, &policy);
            NewAttempt {
                user_id: payload.user_id,
                device_id: payload.device_id,
                ip_address: ip,
                geo_location: payload.geo_location,
                timestamp: now,
                decision: eval.decision,
                reason: Some(format!(
                    "Total score {}, threshold {}",
                    eval.total_score, policy.min_trust_threshold
                )),
                total_score: eval.total_score,
                factor_scores: serde_json::to_value(&eval.factor_scores)
                    .map_err(|e| AppError::InternalError(anyhow::anyhow!(e)))?,
            }
        }
        None => {
            // Fail closed: no governing policy means deny, recorded and logged.
            let err = TrustError::PolicyNotFound(target_group.clone());
            warn!(user_id = %payload.user_id, error = %err, "Denying attempt: no active policy");
            NewAttempt {
                user_id: payload.user_id,
                device_id: payload.device_id,
                ip_address: ip,
                geo_location: payload.geo_location,
                timestamp: now,
                decision: Decision::Deny,
                reason: Some(err.to_string()),
                total_score: 0.0,
                factor_scores: serde_json::json!({}),
            }
        }
    };

    let recorded = state.ledger.record(&attempt).await?;
    info!(
        attempt_id = %recorded.attempt_id,
        decision = %recorded.decision,
        score = recorded.total_score,
        "Attempt recorded"
    );

    Ok((StatusCode::CREATED, Json(recorded.into())))
}

#[derive(Debug, Deserialize)]
pub struct ListAttemptsQuery {
    pub user_id: Option<Uuid>,
    pub decision: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// List attempts, newest first. Admins see all; regular users their own.
pub async fn list_attempts(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListAttemptsQuery>,
) -> Result<Json<Vec<AttemptResponse>>, AppError> {
    let decision = match query.decision.as_deref() {
        Some(raw) => Some(
            Decision::from_str(raw)
                .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Unknown decision '{}'", raw)))?,
        ),
        None => None,
    };

    let user_id = if auth.is_admin() {
        query.user_id
    } else {
        Some(auth.user_id)
    };

    let filter = crate::services::database::AttemptFilter {
        user_id,
        decision,
        since: query.since,
        limit: query.limit.unwrap_or(100).clamp(1, 1000),
        offset: query.offset.unwrap_or(0).max(0),
    };

    let attempts = state.db.list_attempts(&filter).await?;
    Ok(Json(attempts.into_iter().map(Into::into).collect()))
}

/// Rolling attempt aggregates. Served from in-process counters; no table
/// scan happens here.
pub async fn attempt_stats(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<StatsSnapshot>, AppError> {
    Ok(Json(state.ledger.stats().snapshot()))
}
