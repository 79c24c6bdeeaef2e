use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

use super::rows::{CredentialRow, IdentityRow, JobRow};
use super::{AccessStore, JobFeed, JobSnapshot, JobStore, StoreError};
use crate::models::{Credential, Identity, JobChange, ReviewJob};

pub type DbPool = Arc<PgPool>;

pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(Arc::new(pool))
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

const JOB_COLUMNS: &str = "id, owner_id, credential_id, credential_name, manuscript_name, \
     reviewer_profile, status, progress_label, progress_percentage, result, error, \
     created_at, files, chat_history";

pub struct PgJobStore {
    pool: DbPool,
    feed: JobFeed,
    // Held from commit until the snapshot is published so snapshots go out in commit order.
    publish_lock: Mutex<()>,
}

impl PgJobStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            feed: JobFeed::new(),
            publish_lock: Mutex::new(()),
        }
    }

    /// Must be called with `publish_lock` held.
    async fn publish_snapshot(&self) {
        match self.list().await {
            Ok(jobs) => {
                self.feed.publish(Arc::new(jobs));
            }
            Err(e) => warn!("Failed to load job snapshot: {}", e),
        }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, job: &ReviewJob) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO review_jobs (id, owner_id, credential_id, credential_name, manuscript_name,
                reviewer_profile, status, progress_label, progress_percentage, result, error,
                created_at, files, chat_history)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(job.id)
        .bind(job.owner_id)
        .bind(job.credential_id)
        .bind(&job.credential_name)
        .bind(&job.manuscript_name)
        .bind(&job.reviewer_profile)
        .bind(job.status.as_str())
        .bind(&job.progress.label)
        .bind(i16::from(job.progress.percentage))
        .bind(job.result.as_ref().map(Json))
        .bind(&job.error)
        .bind(job.created_at)
        .bind(Json(&job.files))
        .bind(Json(&job.chat_history))
        .execute(self.pool.as_ref())
        .await?;

        let _publishing = self.publish_lock.lock().await;
        self.publish_snapshot().await;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<ReviewJob>, StoreError> {
        let row: Option<JobRow> =
            sqlx::query_as(&format!("SELECT {} FROM review_jobs WHERE id = $1", JOB_COLUMNS))
                .bind(id)
                .fetch_optional(self.pool.as_ref())
                .await?;
        row.map(JobRow::into_domain).transpose()
    }

    async fn list(&self) -> Result<Vec<ReviewJob>, StoreError> {
        let rows: Vec<JobRow> = sqlx::query_as(&format!(
            "SELECT {} FROM review_jobs ORDER BY created_at DESC",
            JOB_COLUMNS
        ))
        .fetch_all(self.pool.as_ref())
        .await?;
        rows.into_iter().map(JobRow::into_domain).collect()
    }

    async fn update(&self, id: Uuid, change: JobChange) -> Result<ReviewJob, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<JobRow> = sqlx::query_as(&format!(
            "SELECT {} FROM review_jobs WHERE id = $1 FOR UPDATE",
            JOB_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let mut job = row.ok_or(StoreError::JobNotFound(id))?.into_domain()?;
        let kind = change.kind();
        job.apply(change)?;

        sqlx::query(
            r#"
            UPDATE review_jobs
            SET status = $2, progress_label = $3, progress_percentage = $4,
                result = $5, error = $6, chat_history = $7
            WHERE id = $1
            "#,
        )
        .bind(job.id)
        .bind(job.status.as_str())
        .bind(&job.progress.label)
        .bind(i16::from(job.progress.percentage))
        .bind(job.result.as_ref().map(Json))
        .bind(&job.error)
        .bind(Json(&job.chat_history))
        .execute(&mut *tx)
        .await?;

        let _publishing = self.publish_lock.lock().await;
        tx.commit().await?;
        debug!(job = %id, change = kind, status = %job.status, "Job updated");
        self.publish_snapshot().await;
        Ok(job)
    }

    fn subscribe(&self) -> broadcast::Receiver<JobSnapshot> {
        self.feed.subscribe()
    }
}

pub struct PgAccessStore {
    pool: DbPool,
}

impl PgAccessStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccessStore for PgAccessStore {
    async fn list_credentials(&self) -> Result<Vec<Credential>, StoreError> {
        let rows: Vec<CredentialRow> = sqlx::query_as(
            "SELECT id, name, secret, created_at FROM credentials ORDER BY created_at, name",
        )
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(rows.into_iter().map(Credential::from).collect())
    }

    async fn get_credential(&self, id: Uuid) -> Result<Option<Credential>, StoreError> {
        let row: Option<CredentialRow> =
            sqlx::query_as("SELECT id, name, secret, created_at FROM credentials WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool.as_ref())
                .await?;
        Ok(row.map(Credential::from))
    }

    async fn insert_credentials(&self, credentials: &[Credential]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for credential in credentials {
            sqlx::query(
                "INSERT INTO credentials (id, name, secret, created_at) VALUES ($1, $2, $3, $4)",
            )
            .bind(credential.id)
            .bind(&credential.name)
            .bind(&credential.secret)
            .bind(credential.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_credential(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM credentials WHERE id = $1")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_identities(&self) -> Result<Vec<Identity>, StoreError> {
        let rows: Vec<IdentityRow> = sqlx::query_as(
            "SELECT id, login, role, password_hash FROM identities ORDER BY created_at, login",
        )
        .fetch_all(self.pool.as_ref())
        .await?;
        rows.into_iter()
            .map(|row| row.into_domain().map(|(identity, _)| identity))
            .collect()
    }

    async fn get_identity(&self, id: Uuid) -> Result<Option<Identity>, StoreError> {
        let row: Option<IdentityRow> =
            sqlx::query_as("SELECT id, login, role, password_hash FROM identities WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool.as_ref())
                .await?;
        row.map(|r| r.into_domain().map(|(identity, _)| identity))
            .transpose()
    }

    async fn find_login(&self, login: &str) -> Result<Option<(Identity, String)>, StoreError> {
        let row: Option<IdentityRow> =
            sqlx::query_as("SELECT id, login, role, password_hash FROM identities WHERE login = $1")
                .bind(login)
                .fetch_optional(self.pool.as_ref())
                .await?;
        row.map(IdentityRow::into_domain).transpose()
    }

    async fn insert_identity(
        &self,
        identity: &Identity,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO identities (id, login, role, password_hash) VALUES ($1, $2, $3, $4)",
        )
        .bind(identity.id)
        .bind(&identity.login)
        .bind(identity.role.as_str())
        .bind(password_hash)
        .execute(self.pool.as_ref())
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::DuplicateLogin(identity.login.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_identity(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM identities WHERE id = $1")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
