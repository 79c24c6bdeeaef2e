use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use uuid::Uuid;

use super::auth::CurrentUser;
use crate::error::AppError;
use crate::report::download_name;
use crate::state::AppState;
use crate::storage::{resolve_bytes, sanitize_filename, BlobError};
use crate::{pdf, templates};

fn attachment(content_type: &str, filename: String, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

pub async fn download_pdf(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let job = state.orchestrator.visible_job(&user.identity, id).await?;
    let font_dir = state.config.font_dir.clone();

    let render_job = job.clone();
    let bytes =
        tokio::task::spawn_blocking(move || pdf::render_pdf(&render_job, font_dir.as_deref()))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(attachment("application/pdf", download_name(&job, "pdf"), bytes))
}

pub async fn download_html(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let job = state.orchestrator.visible_job(&user.identity, id).await?;
    let bytes = templates::render_html(&job)?;
    Ok(attachment(
        "text/html; charset=utf-8",
        download_name(&job, "html"),
        bytes,
    ))
}

/// A submitted manuscript file, readable only by those who can view its job.
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<Response, AppError> {
    let job = state.orchestrator.visible_job(&user.identity, id).await?;
    let file = job
        .files
        .get(index)
        .ok_or_else(|| AppError::NotFound(format!("File {} not found for job {}", index, id)))?;

    let bytes = resolve_bytes(file, state.blobs.as_ref())
        .await
        .map_err(|e| match e {
            BlobError::NotFound(_) => {
                AppError::NotFound(format!("File data missing: {}", file.name))
            }
            other => AppError::Internal(other.to_string()),
        })?;

    Ok(attachment(&file.media_type, sanitize_filename(&file.name), bytes))
}
