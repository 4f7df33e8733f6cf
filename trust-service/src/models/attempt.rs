//! Access attempt model. Attempts are append-only: there is no update or
//! delete path once a row is written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::net::IpAddr;
use uuid::Uuid;

/// Outcome of a trust evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Deny,
    Challenge,
}

impl Decision {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::Challenge => "challenge",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "allow" => Some(Self::Allow),
            "deny" => Some(Self::Deny),
            "challenge" => Some(Self::Challenge),
            _ => None,
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stored access attempt row.
#[derive(Debug, Clone, FromRow)]
pub struct AccessAttempt {
    pub attempt_id: Uuid,
    pub user_id: Uuid,
    pub device_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub geo_location: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub decision: String,
    pub reason: Option<String>,
    pub total_score: f64,
    pub factor_scores: serde_json::Value,
}

impl AccessAttempt {
    pub fn parsed_decision(&self) -> Option<Decision> {
        Decision::from_str(&self.decision)
    }
}

/// Input for recording a new attempt.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub user_id: Uuid,
    pub device_id: Option<Uuid>,
    pub ip_address: Option<IpAddr>,
    pub geo_location: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub decision: Decision,
    pub reason: Option<String>,
    pub total_score: f64,
    pub factor_scores: serde_json::Value,
}

/// Serialized attempt. Emits both the authoritative `decision` and the legacy
/// `result` field with identical values; older clients still read `result`.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptResponse {
    pub attempt_id: Uuid,
    pub user_id: Uuid,
    pub device_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub geo_location: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub result: String,
    pub decision: String,
    pub reason: Option<String>,
    pub total_score: f64,
    pub factor_scores: serde_json::Value,
}

impl From<AccessAttempt> for AttemptResponse {
    fn from(a: AccessAttempt) -> Self {
        Self {
            attempt_id: a.attempt_id,
            user_id: a.user_id,
            device_id: a.device_id,
            ip_address: a.ip_address,
            geo_location: a.geo_location,
            timestamp: a.timestamp,
            result: a.decision.clone(),
            decision: a.decision,
            reason: a.reason,
            total_score: a.total_score,
            factor_scores: a.factor_scores,
        }
    }
}
