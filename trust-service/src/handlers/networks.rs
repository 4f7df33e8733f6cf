//! Remote network and resource endpoints (admin only).

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use modzero_core::error::AppError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::middleware::AdminUser;
use crate::models::{ConnectorStatus, RemoteNetwork, Resource, derive_health};
use crate::startup::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateNetworkRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 64))]
    pub cidr_range: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateResourceRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResourceStatusRequest {
    pub connector_status: ConnectorStatus,
}

/// Network with derived health and its resources.
#[derive(Debug, Serialize)]
pub struct NetworkResponse {
    pub network_id: Uuid,
    pub name: String,
    pub cidr_range: String,
    pub health: String,
    pub created_at: DateTime<Utc>,
    pub resources: Vec<Resource>,
}

impl NetworkResponse {
    fn build(network: RemoteNetwork, resources: Vec<Resource>) -> Self {
        let health = derive_health(&resources);
        Self {
            network_id: network.network_id,
            name: network.name,
            cidr_range: network.cidr_range,
            health: health.as_str().to_string(),
            created_at: network.created_at,
            resources,
        }
    }
}

pub async fn list_networks(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Json<Vec<NetworkResponse>>, AppError> {
    let networks = state.db.list_networks().await?;
    let mut responses = Vec::with_capacity(networks.len());
    for network in networks {
        let resources = state.db.list_resources(network.network_id).await?;
        responses.push(NetworkResponse::build(network, resources));
    }
    Ok(Json(responses))
}

pub async fn create_network(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(payload): Json<CreateNetworkRequest>,
) -> Result<(StatusCode, Json<NetworkResponse>), AppError> {
    payload.validate()?;

    let network = state
        .db
        .create_network(&payload.name, &payload.cidr_range)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(NetworkResponse::build(network, Vec::new())),
    ))
}

pub async fn create_resource(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(network_id): Path<Uuid>,
    Json(payload): Json<CreateResourceRequest>,
) -> Result<(StatusCode, Json<Resource>), AppError> {
    payload.validate()?;

    state
        .db
        .get_network(network_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Network not found")))?;

    let resource = state
        .db
        .create_resource(network_id, &payload.name, payload.description.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(resource)))
}

/// Connector heartbeat: update a resource's reported status.
pub async fn update_resource_status(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path((network_id, resource_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<ResourceStatusRequest>,
) -> Result<Json<Resource>, AppError> {
    let resource = state
        .db
        .update_resource_status(network_id, resource_id, payload.connector_status.as_str())
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Resource not found")))?;
    Ok(Json(resource))
}
