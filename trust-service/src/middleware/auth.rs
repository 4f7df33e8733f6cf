//! Bearer-token authentication middleware and claim extractors.

use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, header, request::Parts},
    middleware::Next,
    response::IntoResponse,
};
use serde::Serialize;
use uuid::Uuid;

use crate::models::Role;
use crate::services::Claims;
use crate::startup::AppState;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn unauthorized(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

/// Middleware requiring a valid bearer token; verified claims are stored in
/// request extensions for the extractors below.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let token = token.ok_or_else(|| unauthorized("Missing or invalid Authorization header"))?;

    let claims = state
        .jwt
        .verify(token)
        .map_err(|_| unauthorized("Invalid or expired token"))?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts
            .extensions
            .get::<Claims>()
            .ok_or_else(|| {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: "Auth claims missing from request extensions".to_string(),
                    }),
                )
            })?
            .clone();

        let user_id = claims
            .sub
            .parse::<Uuid>()
            .map_err(|_| unauthorized("Invalid subject claim"))?;
        let role = Role::from_str(&claims.role).ok_or_else(|| unauthorized("Invalid role claim"))?;

        Ok(AuthUser {
            user_id,
            username: claims.username,
            role,
        })
    }
}

/// Extractor that additionally requires the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err((
                StatusCode::FORBIDDEN,
                Json(ErrorResponse {
                    error: "Admin role required".to_string(),
                }),
            ));
        }
        Ok(AdminUser(user))
    }
}
