//! MASTER-only administration of credentials and identities.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::auth::CurrentUser;
use crate::error::AppError;
use crate::models::{CredentialView, Identity, Role};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AddCredentialsRequest {
    pub prefix: String,
    /// One key per line.
    pub keys: String,
}

pub async fn list_credentials(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<Vec<CredentialView>>, AppError> {
    Ok(Json(state.access.list_credentials(&user.identity).await?))
}

pub async fn add_credentials(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(req): Json<AddCredentialsRequest>,
) -> Result<(StatusCode, Json<Vec<CredentialView>>), AppError> {
    let secrets: Vec<String> = req.keys.lines().map(str::to_string).collect();
    let added = state
        .access
        .add_credentials(&user.identity, &req.prefix, &secrets)
        .await?;
    Ok((StatusCode::CREATED, Json(added)))
}

pub async fn delete_credential(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.access.remove_credential(&user.identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct AddIdentityRequest {
    pub login: String,
    pub password: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::User
}

pub async fn list_identities(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<Vec<Identity>>, AppError> {
    Ok(Json(state.access.list_identities(&user.identity).await?))
}

pub async fn add_identity(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(req): Json<AddIdentityRequest>,
) -> Result<(StatusCode, Json<Identity>), AppError> {
    let identity = state
        .access
        .add_identity(&user.identity, &req.login, &req.password, req.role)
        .await?;
    Ok((StatusCode::CREATED, Json(identity)))
}

pub async fn delete_identity(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.access.remove_identity(&user.identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
