//! Application startup and lifecycle management.

use crate::config::TrustConfig;
use crate::engine::{EngineSettings, TrustEngine};
use crate::handlers;
use crate::middleware::auth_middleware;
use crate::services::{
    Database, DirectoryProvider, GraphProvider, JwtService, Ledger, LedgerStats,
    MockDirectoryProvider, Reconciler, get_metrics,
};
use crate::utils::password::{Password, hash_password};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::{get, post, put},
};
use modzero_core::error::AppError;
use modzero_core::middleware::{metrics_middleware, request_id_middleware};
use secrecy::ExposeSecret;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: TrustConfig,
    pub db: Arc<Database>,
    pub engine: Arc<TrustEngine>,
    pub jwt: JwtService,
    pub ledger: Ledger,
    pub directory: Arc<dyn DirectoryProvider>,
    pub reconciler: Arc<Reconciler>,
    pub shutdown: CancellationToken,
}

/// State for health check endpoints.
#[derive(Clone)]
struct HealthState {
    db: Arc<Database>,
}

/// Health check endpoint for liveness probes.
async fn health_check(State(state): State<HealthState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": "trust-service",
                "version": env!("CARGO_PKG_VERSION")
            })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed - database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": "trust-service",
                    "error": e.to_string()
                })),
            )
        }
    }
}

/// Readiness check endpoint.
async fn readiness_check(State(state): State<HealthState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Metrics endpoint for Prometheus scraping.
async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}

/// Build the full router for the given state.
pub fn build_router(state: AppState) -> Router {
    let health_state = HealthState {
        db: state.db.clone(),
    };

    let protected = Router::new()
        .route("/api/auth/me", get(handlers::auth::me))
        .route(
            "/api/attempts",
            post(handlers::attempts::create_attempt).get(handlers::attempts::list_attempts),
        )
        .route("/api/attempts/stats", get(handlers::attempts::attempt_stats))
        .route(
            "/api/policies",
            get(handlers::policies::list_policies).post(handlers::policies::create_policy),
        )
        .route(
            "/api/policies/:policy_id",
            get(handlers::policies::get_policy)
                .put(handlers::policies::update_policy)
                .delete(handlers::policies::delete_policy),
        )
        .route(
            "/api/users",
            get(handlers::users::list_users).post(handlers::users::create_user),
        )
        .route(
            "/api/users/:user_id",
            get(handlers::users::get_user).delete(handlers::users::delete_user),
        )
        .route(
            "/api/devices",
            get(handlers::devices::list_devices).post(handlers::devices::register_device),
        )
        .route(
            "/api/devices/:device_id",
            get(handlers::devices::get_device).delete(handlers::devices::delete_device),
        )
        .route(
            "/api/templates",
            get(handlers::templates::list_templates).post(handlers::templates::create_template),
        )
        .route(
            "/api/templates/:template_id",
            get(handlers::templates::get_template)
                .put(handlers::templates::update_template)
                .delete(handlers::templates::delete_template),
        )
        .route(
            "/api/networks",
            get(handlers::networks::list_networks).post(handlers::networks::create_network),
        )
        .route(
            "/api/networks/:network_id/resources",
            post(handlers::networks::create_resource),
        )
        .route(
            "/api/networks/:network_id/resources/:resource_id/status",
            put(handlers::networks::update_resource_status),
        )
        .route(
            "/api/directory/test-connection",
            get(handlers::directory::test_connection),
        )
        .route("/api/directory/users", get(handlers::directory::list_users))
        .route(
            "/api/directory/users/:external_id",
            get(handlers::directory::get_user),
        )
        .route(
            "/api/directory/sync-user/:external_id",
            post(handlers::directory::sync_user),
        )
        .route("/api/directory/sync-all", post(handlers::directory::sync_all))
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health_check).with_state(health_state.clone()))
        .route("/ready", get(readiness_check).with_state(health_state))
        .route("/metrics", get(metrics_handler))
        .route("/api/auth/login", post(handlers::auth::login))
        .merge(protected)
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: TrustConfig) -> Result<Self, AppError> {
        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        db.run_migrations().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            e
        })?;

        let db = Arc::new(db);

        bootstrap_admin(&config, &db).await?;

        // Seed the rolling attempt aggregates once; they stay incremental
        // from here on.
        let stats = Arc::new(LedgerStats::new());
        stats.seed(db.attempt_aggregates().await?);
        let ledger = Ledger::new(
            db.clone(),
            stats,
            config.engine.ledger_write_attempts,
        );

        let engine = Arc::new(TrustEngine::new(EngineSettings {
            default_factor_weight: config.engine.default_factor_weight,
            challenge_band: config.engine.challenge_band,
        }));

        let jwt = JwtService::new(&config.jwt);

        let directory: Arc<dyn DirectoryProvider> = if config.azure.enabled {
            tracing::info!(tenant = %config.azure.tenant_id, "Using Microsoft Graph directory provider");
            Arc::new(GraphProvider::new(config.azure.clone()).map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Failed to build Graph provider: {}", e))
            })?)
        } else {
            tracing::warn!("Directory credentials not configured - using mock directory provider");
            Arc::new(MockDirectoryProvider::new())
        };

        let reconciler = Arc::new(Reconciler::new(
            directory.clone(),
            db.clone(),
            config.sync.concurrency,
        ));

        let state = AppState {
            config: config.clone(),
            db,
            engine,
            jwt,
            ledger,
            directory,
            reconciler,
            shutdown: CancellationToken::new(),
        };

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Trust service listener bound");

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Token cancelled when the service begins shutting down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.state.shutdown.clone()
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        tracing::info!(
            service = "trust-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, router).await
    }
}

/// Create the initial admin account when configured and absent.
async fn bootstrap_admin(config: &TrustConfig, db: &Database) -> Result<(), AppError> {
    let Some(admin) = &config.bootstrap_admin else {
        return Ok(());
    };

    if db.find_user_by_login(&admin.username).await?.is_some() {
        return Ok(());
    }

    let hash = hash_password(&Password::new(admin.password.expose_secret().clone()))?;
    let user = db
        .create_user(&admin.username, &admin.email, hash.as_str(), "admin")
        .await?;
    tracing::info!(user_id = %user.user_id, "Bootstrap admin created");
    Ok(())
}
