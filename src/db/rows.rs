use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::StoreError;
use crate::models::{
    ChatTurn, Credential, Identity, Progress, ReviewJob, ReviewResult, ReviewStatus, Role,
    UploadedFile,
};

#[derive(Debug, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub credential_id: Uuid,
    pub credential_name: String,
    pub manuscript_name: String,
    pub reviewer_profile: String,
    pub status: String,
    pub progress_label: String,
    pub progress_percentage: i16,
    pub result: Option<Json<ReviewResult>>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub files: Json<Vec<UploadedFile>>,
    pub chat_history: Json<Vec<ChatTurn>>,
}

impl JobRow {
    pub fn into_domain(self) -> Result<ReviewJob, StoreError> {
        let status = ReviewStatus::parse(&self.status).ok_or_else(|| {
            StoreError::Corrupt(format!("job {} has status {:?}", self.id, self.status))
        })?;
        Ok(ReviewJob {
            id: self.id,
            owner_id: self.owner_id,
            credential_id: self.credential_id,
            credential_name: self.credential_name,
            manuscript_name: self.manuscript_name,
            reviewer_profile: self.reviewer_profile,
            status,
            progress: Progress::new(
                self.progress_label,
                self.progress_percentage.clamp(0, 100) as u8,
            ),
            result: self.result.map(|r| r.0),
            error: self.error,
            created_at: self.created_at,
            files: self.files.0,
            chat_history: self.chat_history.0,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct CredentialRow {
    pub id: Uuid,
    pub name: String,
    pub secret: String,
    pub created_at: DateTime<Utc>,
}

impl From<CredentialRow> for Credential {
    fn from(row: CredentialRow) -> Self {
        Credential {
            id: row.id,
            name: row.name,
            secret: row.secret,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct IdentityRow {
    pub id: Uuid,
    pub login: String,
    pub role: String,
    pub password_hash: String,
}

impl IdentityRow {
    pub fn into_domain(self) -> Result<(Identity, String), StoreError> {
        let role = Role::parse(&self.role).ok_or_else(|| {
            StoreError::Corrupt(format!("identity {} has role {:?}", self.id, self.role))
        })?;
        Ok((
            Identity {
                id: self.id,
                login: self.login,
                role,
            },
            self.password_hash,
        ))
    }
}
