//! Directory provider: Microsoft Graph connector plus a mock for
//! deployments without Entra ID credentials.

use crate::config::AzureConfig;
use crate::error::TrustError;
use crate::models::{ConnectionStatus, DirectoryUser};
use crate::services::metrics::DIRECTORY_ERRORS_TOTAL;
use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, instrument, warn};

const USER_SELECT: &str = "id,displayName,userPrincipalName,mail,jobTitle,department,accountEnabled";
const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Async seam to the identity directory.
#[async_trait]
pub trait DirectoryProvider: Send + Sync {
    /// Probe connectivity: can we get a token, and does the API answer.
    async fn test_connection(&self) -> ConnectionStatus;

    /// List up to `top` directory users.
    async fn list_users(&self, top: u32) -> Result<Vec<DirectoryUser>, TrustError>;

    /// Fetch one directory user; `Ok(None)` when the directory has no record.
    async fn get_user(&self, external_id: &str) -> Result<Option<DirectoryUser>, TrustError>;
}

#[derive(Debug, Deserialize)]
struct TokenReply {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserListReply {
    value: Vec<DirectoryUser>,
}

/// Microsoft Graph connector using the client-credentials flow.
pub struct GraphProvider {
    client: reqwest::Client,
    config: AzureConfig,
}

impl GraphProvider {
    pub fn new(config: AzureConfig) -> Result<Self, TrustError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| {
                TrustError::DirectoryUnavailable(format!("failed to build HTTP client: {}", e))
            })?;
        Ok(Self { client, config })
    }

    fn map_transport_error(&self, err: reqwest::Error) -> TrustError {
        if err.is_timeout() {
            DIRECTORY_ERRORS_TOTAL.with_label_values(&["timeout"]).inc();
            TrustError::Timeout(Duration::from_secs(self.config.request_timeout_secs))
        } else {
            DIRECTORY_ERRORS_TOTAL
                .with_label_values(&["unavailable"])
                .inc();
            TrustError::DirectoryUnavailable(err.to_string())
        }
    }

    /// Acquire an app-only token from the tenant authority.
    #[instrument(skip(self))]
    async fn acquire_token(&self) -> Result<String, TrustError> {
        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.config.authority, self.config.tenant_id
        );

        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.expose_secret()),
            ("scope", GRAPH_SCOPE),
            ("grant_type", "client_credentials"),
        ];

        let response = self
            .client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            DIRECTORY_ERRORS_TOTAL
                .with_label_values(&["unavailable"])
                .inc();
            return Err(TrustError::DirectoryUnavailable(format!(
                "token endpoint returned {}",
                status
            )));
        }

        let reply: TokenReply = response
            .json()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        Ok(reply.access_token)
    }
}

#[async_trait]
impl DirectoryProvider for GraphProvider {
    async fn test_connection(&self) -> ConnectionStatus {
        let token = match self.acquire_token().await {
            Ok(token) => token,
            Err(e) => {
                return ConnectionStatus {
                    success: false,
                    message: format!("Failed to acquire access token: {}", e),
                    token_acquired: false,
                    api_accessible: false,
                };
            }
        };

        let url = format!("{}/users", self.config.graph_endpoint);
        let probe = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .query(&[("$top", "1")])
            .send()
            .await;

        match probe {
            Ok(response) if response.status().is_success() => ConnectionStatus {
                success: true,
                message: "Directory connection successful".to_string(),
                token_acquired: true,
                api_accessible: true,
            },
            Ok(response) => ConnectionStatus {
                success: false,
                message: format!("Directory API returned {}", response.status()),
                token_acquired: true,
                api_accessible: false,
            },
            Err(e) => ConnectionStatus {
                success: false,
                message: format!("Directory API unreachable: {}", e),
                token_acquired: true,
                api_accessible: false,
            },
        }
    }

    #[instrument(skip(self))]
    async fn list_users(&self, top: u32) -> Result<Vec<DirectoryUser>, TrustError> {
        let token = self.acquire_token().await?;
        let url = format!("{}/users", self.config.graph_endpoint);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .query(&[("$top", top.to_string().as_str()), ("$select", USER_SELECT)])
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            DIRECTORY_ERRORS_TOTAL
                .with_label_values(&["unavailable"])
                .inc();
            return Err(TrustError::DirectoryUnavailable(format!(
                "user listing returned {}",
                status
            )));
        }

        let reply: UserListReply = response
            .json()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        info!(count = reply.value.len(), "Fetched directory users");
        Ok(reply.value)
    }

    #[instrument(skip(self), fields(external_id = %external_id))]
    async fn get_user(&self, external_id: &str) -> Result<Option<DirectoryUser>, TrustError> {
        let token = self.acquire_token().await?;
        let url = format!("{}/users/{}", self.config.graph_endpoint, external_id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .query(&[("$select", USER_SELECT)])
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            warn!(status = %status, "Directory user lookup failed");
            DIRECTORY_ERRORS_TOTAL
                .with_label_values(&["unavailable"])
                .inc();
            return Err(TrustError::DirectoryUnavailable(format!(
                "user lookup returned {}",
                status
            )));
        }

        let user: DirectoryUser = response
            .json()
            .await
            .map_err(|e| self.map_transport_error(e))?;
        Ok(Some(user))
    }
}

/// In-memory provider used when no directory credentials are configured,
/// and by tests.
#[derive(Default)]
pub struct MockDirectoryProvider {
    users: Vec<DirectoryUser>,
}

impl MockDirectoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: Vec<DirectoryUser>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl DirectoryProvider for MockDirectoryProvider {
    async fn test_connection(&self) -> ConnectionStatus {
        ConnectionStatus {
            success: true,
            message: "Mock directory provider".to_string(),
            token_acquired: true,
            api_accessible: true,
        }
    }

    async fn list_users(&self, top: u32) -> Result<Vec<DirectoryUser>, TrustError> {
        Ok(self.users.iter().take(top as usize).cloned().collect())
    }

    async fn get_user(&self, external_id: &str) -> Result<Option<DirectoryUser>, TrustError> {
        Ok(self.users.iter().find(|u| u.id == external_id).cloned())
    }
}
