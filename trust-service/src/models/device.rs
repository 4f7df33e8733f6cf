//! Registered device model.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A device registered to a user. The fingerprint is the posture anchor:
/// re-registering the same fingerprint refreshes the existing row.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Device {
    pub device_id: Uuid,
    pub user_id: Uuid,
    pub device_name: String,
    pub os_version: Option<String>,
    pub fingerprint: Option<String>,
    pub checks_passed: i32,
    pub checks_total: i32,
    pub registered_at: DateTime<Utc>,
}
