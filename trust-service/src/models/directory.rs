//! Directory (Microsoft Graph) wire models.

use serde::{Deserialize, Serialize};

/// A user record as returned by the Graph `/users` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryUser {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub user_principal_name: Option<String>,
    #[serde(default)]
    pub mail: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub account_enabled: Option<bool>,
}

impl DirectoryUser {
    /// Best-effort email: `mail` when present, UPN as fallback.
    pub fn email(&self) -> Option<&str> {
        self.mail
            .as_deref()
            .filter(|m| !m.is_empty())
            .or(self.user_principal_name.as_deref())
            .filter(|m| !m.is_empty())
    }

    pub fn username(&self) -> Option<&str> {
        self.user_principal_name
            .as_deref()
            .filter(|u| !u.is_empty())
    }

    pub fn is_enabled(&self) -> bool {
        self.account_enabled.unwrap_or(false)
    }
}

/// Result of a directory connectivity probe.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub success: bool,
    pub message: String,
    pub token_acquired: bool,
    pub api_accessible: bool,
}
