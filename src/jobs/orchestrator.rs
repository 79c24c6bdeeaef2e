//! Fan-out of one submission into one review job per credential.
//!
//! Every job is driven by its own detached task. Callers never await those
//! tasks; they watch the job feed instead.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::agents::{build_review_prompt, ReviewService};
use crate::db::{AccessStore, JobSnapshot, JobStore};
use crate::error::AppError;
use crate::models::{
    Credential, Identity, JobChange, Progress, ReviewJob, ReviewResult, UploadedFile,
};

pub const CREDENTIAL_MISSING: &str = "API Key not found for this job.";

#[derive(Clone)]
pub struct ReviewOrchestrator {
    pub(super) jobs: Arc<dyn JobStore>,
    pub(super) access: Arc<dyn AccessStore>,
    pub(super) ai: Arc<dyn ReviewService>,
    pub(super) max_chat_files: usize,
}

impl ReviewOrchestrator {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        access: Arc<dyn AccessStore>,
        ai: Arc<dyn ReviewService>,
        max_chat_files: usize,
    ) -> Self {
        Self {
            jobs,
            access,
            ai,
            max_chat_files,
        }
    }

    /// Creates one PENDING job per live credential and starts each in the
    /// background. Returns the new job ids in credential order.
    pub async fn start_review(
        &self,
        owner: &Identity,
        files: Vec<UploadedFile>,
        reviewer_profile: &str,
    ) -> Result<Vec<Uuid>, AppError> {
        if files.is_empty() {
            return Err(AppError::validation(
                "Please upload at least one file (manuscript).",
            ));
        }
        let profile = reviewer_profile.trim();
        if profile.is_empty() {
            return Err(AppError::validation("Please choose a reviewer profile."));
        }
        let credentials = self.access.list_credentials().await?;
        if credentials.is_empty() {
            return Err(AppError::validation(
                "No API keys configured. Master user needs to add at least one.",
            ));
        }

        let manuscript = files[0].name.clone();
        let mut ids = Vec::with_capacity(credentials.len());
        for credential in &credentials {
            let job = ReviewJob::new(
                owner.id,
                credential.id,
                &credential.name,
                &manuscript,
                profile,
                files.clone(),
            );
            self.jobs.create(&job).await?;
            info!(
                job = %job.id,
                credential = %credential.id,
                owner = %owner.id,
                "Queued review job"
            );
            ids.push(job.id);

            let worker = self.clone();
            tokio::spawn(async move { worker.run_job(job).await });
        }
        Ok(ids)
    }

    async fn run_job(self, job: ReviewJob) {
        let job_id = job.id;
        if let Err(e) = self
            .jobs
            .update(job_id, JobChange::Start(Progress::new("Initializing...", 10)))
            .await
        {
            error!(job = %job_id, error = %e, "Failed to start review job");
            return;
        }

        let change = match self.execute(&job).await {
            Ok(result) => {
                info!(job = %job_id, sources = result.sources.len(), "Review completed");
                JobChange::Complete(result)
            }
            Err(e) => {
                warn!(job = %job_id, error = %e, "Review failed");
                JobChange::Fail(e.to_string())
            }
        };

        if let Err(e) = self.jobs.update(job_id, change).await {
            error!(job = %job_id, error = %e, "Failed to record review outcome");
        }
    }

    async fn execute(&self, job: &ReviewJob) -> Result<ReviewResult, AppError> {
        let credential = self.resolve_credential(job.credential_id).await?;

        self.report_progress(job.id, "Uploading Files...", 25).await;
        self.report_progress(job.id, "Analyzing Content & Searching Web...", 50)
            .await;

        let prompt = build_review_prompt(&job.reviewer_profile);
        let result = self
            .ai
            .generate_review(&prompt, &job.files, &credential.secret)
            .await?;

        self.report_progress(job.id, "Generating Report...", 90).await;
        Ok(result)
    }

    /// Progress is advisory; a failed write never stops the pipeline.
    async fn report_progress(&self, job_id: Uuid, label: &str, percentage: u8) {
        if let Err(e) = self
            .jobs
            .update(job_id, JobChange::Progress(Progress::new(label, percentage)))
            .await
        {
            warn!(job = %job_id, error = %e, "Failed to record progress");
        }
    }

    pub(super) async fn resolve_credential(&self, id: Uuid) -> Result<Credential, AppError> {
        self.access
            .get_credential(id)
            .await?
            .ok_or_else(|| AppError::CredentialResolution(CREDENTIAL_MISSING.to_string()))
    }

    pub async fn visible_jobs(&self, viewer: &Identity) -> Result<Vec<ReviewJob>, AppError> {
        let jobs = self.jobs.list().await?;
        Ok(jobs.into_iter().filter(|j| viewer.can_view(j)).collect())
    }

    /// Jobs the viewer may not see are reported as missing.
    pub async fn visible_job(&self, viewer: &Identity, id: Uuid) -> Result<ReviewJob, AppError> {
        self.jobs
            .get(id)
            .await?
            .filter(|j| viewer.can_view(j))
            .ok_or_else(|| AppError::NotFound(format!("Review job not found: {}", id)))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobSnapshot> {
        self.jobs.subscribe()
    }
}
