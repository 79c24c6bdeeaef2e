use axum::extract::{FromRequestParts, Query, State};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::AppError;
use crate::models::Identity;
use crate::state::AppState;

/// The signed-in identity behind a bearer token.
///
/// `EventSource` cannot send headers, so `?access_token=` is accepted as a
/// fallback.
pub struct CurrentUser {
    pub identity: Identity,
    pub token: String,
}

#[derive(Deserialize)]
struct TokenQuery {
    access_token: Option<String>,
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let from_header = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string());

    from_header
        .or_else(|| {
            Query::<TokenQuery>::try_from_uri(&parts.uri)
                .ok()
                .and_then(|Query(q)| q.access_token)
        })
        .filter(|t| !t.is_empty())
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AppError::Unauthorized)?;
        let identity = state.access.authenticate(&token).await?;
        Ok(Self { identity, token })
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub identity: Identity,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let (token, identity) = state.access.sign_in(&req.login, &req.password).await?;
    Ok(Json(LoginResponse { token, identity }))
}

pub async fn logout(State(state): State<Arc<AppState>>, user: CurrentUser) -> StatusCode {
    state.access.sign_out(&user.token).await;
    StatusCode::NO_CONTENT
}

pub async fn me(user: CurrentUser) -> Json<Identity> {
    Json(user.identity)
}
