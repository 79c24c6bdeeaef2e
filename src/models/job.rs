use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::files::UploadedFile;
use crate::jobs::state_machine::{JobStateMachine, TransitionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReviewStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "PENDING",
            ReviewStatus::Running => "RUNNING",
            ReviewStatus::Completed => "COMPLETED",
            ReviewStatus::Failed => "FAILED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(ReviewStatus::Pending),
            "RUNNING" => Some(ReviewStatus::Running),
            "COMPLETED" => Some(ReviewStatus::Completed),
            "FAILED" => Some(ReviewStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ReviewStatus::Completed | ReviewStatus::Failed)
    }
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Advisory progress shown while a review runs. Never used for correctness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub label: String,
    pub percentage: u8,
}

impl Progress {
    pub fn new(label: impl Into<String>, percentage: u8) -> Self {
        Self {
            label: label.into(),
            percentage: percentage.min(100),
        }
    }
}

/// A web citation the AI service used to ground the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Source {
    /// Link text: the title when there is a usable one, otherwise the URI.
    pub fn label(&self) -> &str {
        match self.title.as_deref() {
            Some(title) if !title.trim().is_empty() => title,
            _ => &self.uri,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewResult {
    pub report: String,
    pub sources: Vec<Source>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Model,
}

impl Speaker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Speaker::User => "user",
            Speaker::Model => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Speaker,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<UploadedFile>,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>, files: Vec<UploadedFile>) -> Self {
        Self {
            role: Speaker::User,
            text: text.into(),
            files,
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Speaker::Model,
            text: text.into(),
            files: Vec::new(),
        }
    }
}

/// One credential's review of one manuscript submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewJob {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub credential_id: Uuid,
    /// Cached so the job still displays after the credential is deleted.
    pub credential_name: String,
    pub manuscript_name: String,
    pub reviewer_profile: String,
    pub status: ReviewStatus,
    pub progress: Progress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ReviewResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub files: Vec<UploadedFile>,
    pub chat_history: Vec<ChatTurn>,
}

/// Everything that may happen to a persisted job after creation.
#[derive(Debug, Clone, PartialEq)]
pub enum JobChange {
    Start(Progress),
    Progress(Progress),
    Complete(ReviewResult),
    Fail(String),
    AppendTurn(ChatTurn),
}

impl JobChange {
    pub fn kind(&self) -> &'static str {
        match self {
            JobChange::Start(_) => "start",
            JobChange::Progress(_) => "progress",
            JobChange::Complete(_) => "complete",
            JobChange::Fail(_) => "fail",
            JobChange::AppendTurn(_) => "append_turn",
        }
    }
}

pub const QUEUED_LABEL: &str = "Queued";
pub const COMPLETED_LABEL: &str = "Completed";
pub const FAILED_LABEL: &str = "Failed";

impl ReviewJob {
    pub fn new(
        owner_id: Uuid,
        credential_id: Uuid,
        credential_name: impl Into<String>,
        manuscript_name: impl Into<String>,
        reviewer_profile: impl Into<String>,
        files: Vec<UploadedFile>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            credential_id,
            credential_name: credential_name.into(),
            manuscript_name: manuscript_name.into(),
            reviewer_profile: reviewer_profile.into(),
            status: ReviewStatus::Pending,
            progress: Progress::new(QUEUED_LABEL, 0),
            result: None,
            error: None,
            created_at: Utc::now(),
            files,
            chat_history: Vec::new(),
        }
    }

    /// Apply a change in place. The job is left untouched when the change is
    /// not allowed in the current state.
    pub fn apply(&mut self, change: JobChange) -> Result<(), TransitionError> {
        match change {
            JobChange::Start(progress) => {
                JobStateMachine::validate_transition(self.status, ReviewStatus::Running)?;
                self.status = ReviewStatus::Running;
                self.progress = progress;
            }
            JobChange::Progress(progress) => {
                if self.status != ReviewStatus::Running {
                    return Err(TransitionError::NotRunning {
                        status: self.status,
                    });
                }
                let percentage = progress.percentage.max(self.progress.percentage);
                self.progress = Progress::new(progress.label, percentage);
            }
            JobChange::Complete(result) => {
                JobStateMachine::validate_transition(self.status, ReviewStatus::Completed)?;
                self.status = ReviewStatus::Completed;
                self.result = Some(result);
                self.error = None;
                self.progress = Progress::new(COMPLETED_LABEL, 100);
            }
            JobChange::Fail(message) => {
                JobStateMachine::validate_transition(self.status, ReviewStatus::Failed)?;
                self.status = ReviewStatus::Failed;
                self.error = Some(message);
                self.result = None;
                self.progress = Progress::new(FAILED_LABEL, 0);
            }
            JobChange::AppendTurn(turn) => {
                if self.status != ReviewStatus::Completed {
                    return Err(TransitionError::NotCompleted {
                        status: self.status,
                    });
                }
                self.chat_history.push(turn);
            }
        }
        Ok(())
    }
}
