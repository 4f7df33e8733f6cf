//! Configuration module for trust-service.

use modzero_core::config as core_config;
use modzero_core::error::AppError;
use secrecy::Secret;
use std::env;

#[derive(Debug, Clone)]
pub struct TrustConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub engine: EngineConfig,
    pub jwt: JwtConfig,
    pub azure: AzureConfig,
    pub sync: SyncConfig,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

/// Initial admin account, created at startup when no user with this
/// username exists yet.
#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub username: String,
    pub email: String,
    pub password: Secret<String>,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Trust engine tuning. The challenge band is an absolute distance below the
/// policy threshold within which a score triggers a challenge instead of deny.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub default_factor_weight: f64,
    pub challenge_band: f64,
    pub ledger_write_attempts: u32,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Secret<String>,
    pub access_token_expiry_minutes: i64,
}

/// Entra ID (Azure AD) connector settings. The connector is enabled only when
/// tenant, client id, and client secret are all present.
#[derive(Debug, Clone)]
pub struct AzureConfig {
    pub enabled: bool,
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub authority: String,
    pub graph_endpoint: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub concurrency: usize,
    pub page_size: u32,
}

impl TrustConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let tenant_id = env::var("AZURE_TENANT_ID").unwrap_or_default();
        let client_id = env::var("AZURE_CLIENT_ID").unwrap_or_default();
        let client_secret = env::var("AZURE_CLIENT_SECRET").unwrap_or_default();
        let azure_enabled =
            !tenant_id.is_empty() && !client_id.is_empty() && !client_secret.is_empty();

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME").unwrap_or_else(|_| "trust-service".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required"))
                })?,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
                min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
            },
            engine: EngineConfig {
                default_factor_weight: env::var("ENGINE_DEFAULT_FACTOR_WEIGHT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0.5),
                challenge_band: env::var("ENGINE_CHALLENGE_BAND")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(15.0),
                ledger_write_attempts: env::var("LEDGER_WRITE_ATTEMPTS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3),
            },
            jwt: JwtConfig {
                secret: Secret::new(env::var("JWT_SECRET").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!("JWT_SECRET is required"))
                })?),
                access_token_expiry_minutes: env::var("JWT_ACCESS_TOKEN_EXPIRY_MINUTES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            },
            azure: AzureConfig {
                enabled: azure_enabled,
                tenant_id,
                client_id,
                client_secret: Secret::new(client_secret),
                authority: env::var("AZURE_AUTHORITY")
                    .unwrap_or_else(|_| "https://login.microsoftonline.com".to_string()),
                graph_endpoint: env::var("AZURE_GRAPH_ENDPOINT")
                    .unwrap_or_else(|_| "https://graph.microsoft.com/v1.0".to_string()),
                request_timeout_secs: env::var("AZURE_REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            },
            bootstrap_admin: match (
                env::var("ADMIN_USERNAME").ok(),
                env::var("ADMIN_EMAIL").ok(),
                env::var("ADMIN_PASSWORD").ok(),
            ) {
                (Some(username), Some(email), Some(password)) => Some(BootstrapAdmin {
                    username,
                    email,
                    password: Secret::new(password),
                }),
                _ => None,
            },
            sync: SyncConfig {
                concurrency: env::var("SYNC_CONCURRENCY")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(4),
                page_size: env::var("SYNC_PAGE_SIZE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(100),
            },
        })
    }
}
