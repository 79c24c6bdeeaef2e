mod admin;
mod auth;
mod jobs;
mod reports;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    Router::new()
        .route("/health", get(health))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/reviewer-profiles", get(jobs::reviewer_profiles))
        .route("/api/jobs", get(jobs::list_jobs).post(jobs::submit_review))
        .route("/api/jobs/stream", get(jobs::stream_jobs))
        .route("/api/jobs/:id", get(jobs::get_job))
        .route("/api/jobs/:id/chat", post(jobs::follow_up))
        .route("/api/jobs/:id/report.pdf", get(reports::download_pdf))
        .route("/api/jobs/:id/report.html", get(reports::download_html))
        .route("/api/jobs/:id/files/:index", get(reports::download_file))
        .route(
            "/api/admin/credentials",
            get(admin::list_credentials).post(admin::add_credentials),
        )
        .route("/api/admin/credentials/:id", delete(admin::delete_credential))
        .route(
            "/api/admin/identities",
            get(admin::list_identities).post(admin::add_identity),
        )
        .route("/api/admin/identities/:id", delete(admin::delete_identity))
        .layer(upload_limit)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
