//! Persistence seams for jobs, credentials, and identities.
//!
//! The orchestrator only sees the [`JobStore`] and [`AccessStore`] traits.
//! Postgres backs production; the memory stores back tests and
//! `STORE_BACKEND=memory`.

mod memory;
mod postgres;
mod rows;

pub use memory::{MemoryAccessStore, MemoryJobStore};
pub use postgres::{create_pool, run_migrations, DbPool, PgAccessStore, PgJobStore};

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::jobs::state_machine::TransitionError;
use crate::models::{Credential, Identity, JobChange, ReviewJob};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Username already exists.")]
    DuplicateLogin(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Full job collection as of one change. There is no delta protocol.
pub type JobSnapshot = Arc<Vec<ReviewJob>>;

const FEED_CAPACITY: usize = 256;

/// Broadcasts a fresh snapshot of every job after each write.
#[derive(Clone)]
pub struct JobFeed {
    sender: broadcast::Sender<JobSnapshot>,
}

impl JobFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(FEED_CAPACITY);
        Self { sender }
    }

    /// Returns the number of subscribers that received the snapshot.
    pub fn publish(&self, snapshot: JobSnapshot) -> usize {
        self.sender.send(snapshot).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobSnapshot> {
        self.sender.subscribe()
    }
}

impl Default for JobFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, job: &ReviewJob) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<ReviewJob>, StoreError>;

    /// Every job, newest first.
    async fn list(&self) -> Result<Vec<ReviewJob>, StoreError>;

    /// The single write path for an existing job. Changes to one job are
    /// applied one at a time against its latest stored state.
    async fn update(&self, id: Uuid, change: JobChange) -> Result<ReviewJob, StoreError>;

    fn subscribe(&self) -> broadcast::Receiver<JobSnapshot>;
}

#[async_trait]
pub trait AccessStore: Send + Sync {
    /// Live credentials in creation order.
    async fn list_credentials(&self) -> Result<Vec<Credential>, StoreError>;

    async fn get_credential(&self, id: Uuid) -> Result<Option<Credential>, StoreError>;

    async fn insert_credentials(&self, credentials: &[Credential]) -> Result<(), StoreError>;

    async fn delete_credential(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn list_identities(&self) -> Result<Vec<Identity>, StoreError>;

    async fn get_identity(&self, id: Uuid) -> Result<Option<Identity>, StoreError>;

    /// Identity and stored password hash for a login handle.
    async fn find_login(&self, login: &str) -> Result<Option<(Identity, String)>, StoreError>;

    async fn insert_identity(
        &self,
        identity: &Identity,
        password_hash: &str,
    ) -> Result<(), StoreError>;

    async fn delete_identity(&self, id: Uuid) -> Result<bool, StoreError>;
}
