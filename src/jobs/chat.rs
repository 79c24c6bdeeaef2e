use tracing::{info, warn};
use uuid::Uuid;

use super::orchestrator::ReviewOrchestrator;
use super::state_machine::TransitionError;
use crate::error::AppError;
use crate::intake::IntakeError;
use crate::models::{ChatTurn, Identity, JobChange, ReviewJob, ReviewStatus, UploadedFile};

/// The report as the opening model turn, then every follow-up so far.
pub fn conversation(job: &ReviewJob) -> Vec<ChatTurn> {
    let report = job
        .result
        .as_ref()
        .map(|r| r.report.clone())
        .unwrap_or_default();
    std::iter::once(ChatTurn::model(report))
        .chain(job.chat_history.iter().cloned())
        .collect()
}

impl ReviewOrchestrator {
    /// Appends the user turn, then the model's reply (or an in-band error
    /// turn). Rejected requests leave the job untouched.
    pub async fn send_follow_up(
        &self,
        viewer: &Identity,
        job_id: Uuid,
        text: &str,
        files: Vec<UploadedFile>,
    ) -> Result<ReviewJob, AppError> {
        let job = self.visible_job(viewer, job_id).await?;
        if job.status != ReviewStatus::Completed {
            return Err(AppError::NotReady(
                TransitionError::NotCompleted { status: job.status }.to_string(),
            ));
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::validation("Please enter a question."));
        }
        if files.len() > self.max_chat_files {
            return Err(IntakeError::Capacity {
                max: self.max_chat_files,
            }
            .into());
        }

        let history = conversation(&job);
        let turn = ChatTurn::user(text, files);
        self.jobs
            .update(job_id, JobChange::AppendTurn(turn.clone()))
            .await?;
        info!(job = %job_id, files = turn.files.len(), "Follow-up question recorded");

        let reply = match self.resolve_credential(job.credential_id).await {
            Ok(credential) => {
                match self
                    .ai
                    .continue_chat(&credential.secret, &history, &turn)
                    .await
                {
                    Ok(reply) => reply,
                    Err(e) => {
                        warn!(job = %job_id, error = %e, "Follow-up failed");
                        format!("Error: {}", e)
                    }
                }
            }
            Err(e) => {
                warn!(job = %job_id, error = %e, "Follow-up without credential");
                format!("Error: {}", e)
            }
        };

        let updated = self
            .jobs
            .update(job_id, JobChange::AppendTurn(ChatTurn::model(reply)))
            .await?;
        Ok(updated)
    }
}
