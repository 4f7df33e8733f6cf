//! Content template model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateType {
    Email,
    Notification,
}

impl TemplateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Notification => "notification",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "email" => Some(Self::Email),
            "notification" => Some(Self::Notification),
            _ => None,
        }
    }
}

/// Stored content template. Pure content; nothing is sent from here.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Template {
    pub template_id: Uuid,
    pub name: String,
    pub subject: String,
    pub body: String,
    pub template_type: String,
    pub created_at: DateTime<Utc>,
}
