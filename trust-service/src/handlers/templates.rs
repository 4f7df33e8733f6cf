//! Content template endpoints (admin only).

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use modzero_core::error::AppError;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::middleware::AdminUser;
use crate::models::{Template, TemplateType};
use crate::startup::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct TemplateRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 255))]
    pub subject: String,
    #[validate(length(min = 1))]
    pub body: String,
    pub template_type: TemplateType,
}

pub async fn list_templates(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Json<Vec<Template>>, AppError> {
    Ok(Json(state.db.list_templates().await?))
}

pub async fn create_template(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(payload): Json<TemplateRequest>,
) -> Result<(StatusCode, Json<Template>), AppError> {
    payload.validate()?;

    let template = state
        .db
        .create_template(
            &payload.name,
            &payload.subject,
            &payload.body,
            payload.template_type.as_str(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(template)))
}

pub async fn get_template(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(template_id): Path<Uuid>,
) -> Result<Json<Template>, AppError> {
    let template = state
        .db
        .get_template(template_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Template not found")))?;
    Ok(Json(template))
}

pub async fn update_template(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(template_id): Path<Uuid>,
    Json(payload): Json<TemplateRequest>,
) -> Result<Json<Template>, AppError> {
    payload.validate()?;

    let template = state
        .db
        .update_template(
            template_id,
            &payload.name,
            &payload.subject,
            &payload.body,
            payload.template_type.as_str(),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Template not found")))?;
    Ok(Json(template))
}

pub async fn delete_template(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(template_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.db.delete_template(template_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(anyhow::anyhow!("Template not found")))
    }
}
