use axum::extract::{Multipart, Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;
use uuid::Uuid;

use super::auth::CurrentUser;
use crate::agents::{DEFAULT_REVIEWER_PROFILE, REVIEWER_PROFILES};
use crate::error::AppError;
use crate::intake::{FileRejection, SelectedFile};
use crate::models::{Identity, ReviewJob};
use crate::state::AppState;

const SSE_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Serialize)]
pub struct ProfilesResponse {
    pub profiles: &'static [&'static str],
    pub default: &'static str,
}

pub async fn reviewer_profiles() -> Json<ProfilesResponse> {
    Json(ProfilesResponse {
        profiles: REVIEWER_PROFILES,
        default: DEFAULT_REVIEWER_PROFILE,
    })
}

pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<Vec<ReviewJob>>, AppError> {
    Ok(Json(state.orchestrator.visible_jobs(&user.identity).await?))
}

pub async fn get_job(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ReviewJob>, AppError> {
    Ok(Json(state.orchestrator.visible_job(&user.identity, id).await?))
}

fn jobs_event(jobs: &[&ReviewJob]) -> Option<Result<Event, Infallible>> {
    match Event::default().event("jobs").json_data(jobs) {
        Ok(event) => Some(Ok(event)),
        Err(e) => {
            warn!("Failed to encode jobs event: {}", e);
            None
        }
    }
}

/// The viewer's jobs now, then again after every change to any job.
pub async fn stream_jobs(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let viewer: Identity = user.identity;
    let rx = state.orchestrator.subscribe();
    let initial = state.orchestrator.visible_jobs(&viewer).await?;
    let initial_event = jobs_event(&initial.iter().collect::<Vec<_>>());

    let live = BroadcastStream::new(rx).filter_map(move |result| {
        let viewer = viewer.clone();
        async move {
            match result {
                Ok(snapshot) => {
                    let visible: Vec<&ReviewJob> =
                        snapshot.iter().filter(|j| viewer.can_view(j)).collect();
                    jobs_event(&visible)
                }
                Err(e) => {
                    warn!("Job feed lagged: {:?}", e);
                    None
                }
            }
        }
    });

    let stream = stream::iter(initial_event).chain(live);
    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(SSE_KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    ))
}

/// Text fields and files of a multipart body.
struct UploadForm {
    fields: Vec<(String, String)>,
    files: Vec<SelectedFile>,
}

impl UploadForm {
    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

async fn read_upload(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let invalid = |e: axum::extract::multipart::MultipartError| {
        AppError::validation(format!("Invalid upload: {}", e))
    };

    let mut form = UploadForm {
        fields: Vec::new(),
        files: Vec::new(),
    };
    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        let name = field.name().unwrap_or("").to_string();
        if name == "files" {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let media_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(invalid)?;
            form.files.push(SelectedFile {
                name: file_name,
                media_type,
                bytes: bytes.to_vec(),
            });
        } else {
            let value = field.text().await.map_err(invalid)?;
            form.fields.push((name, value));
        }
    }
    Ok(form)
}

#[derive(Serialize)]
pub struct SubmitResponse {
    pub job_ids: Vec<Uuid>,
    pub rejected: Vec<FileRejection>,
}

pub async fn submit_review(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    multipart: Multipart,
) -> Result<Json<SubmitResponse>, AppError> {
    let form = read_upload(multipart).await?;
    let profile = form
        .field("reviewer_profile")
        .unwrap_or(DEFAULT_REVIEWER_PROFILE)
        .to_string();

    let mut intake = state.intake(state.config.max_submission_files);
    let outcome = intake.add_files(form.files).await?;

    // Detached so a dropped connection cannot interrupt job creation.
    let orchestrator = state.orchestrator.clone();
    let owner = user.identity;
    let files = intake.into_files();
    let job_ids =
        tokio::spawn(async move { orchestrator.start_review(&owner, files, &profile).await })
            .await
            .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(Json(SubmitResponse {
        job_ids,
        rejected: outcome.rejected,
    }))
}

pub async fn follow_up(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<ReviewJob>, AppError> {
    let form = read_upload(multipart).await?;
    let text = form.field("text").unwrap_or("").to_string();

    let mut intake = state.intake(state.config.max_chat_files);
    intake.add_files(form.files).await?;

    let orchestrator = state.orchestrator.clone();
    let viewer = user.identity;
    let files = intake.into_files();
    let job =
        tokio::spawn(async move { orchestrator.send_follow_up(&viewer, id, &text, files).await })
            .await
            .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(Json(job))
}
