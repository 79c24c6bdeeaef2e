use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use uuid::Uuid;

use super::{AccessStore, JobFeed, JobSnapshot, JobStore, StoreError};
use crate::models::{Credential, Identity, JobChange, ReviewJob};

/// In-process job store. One lock serializes every write, so updates to the
/// same job can never interleave.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<Vec<ReviewJob>>,
    feed: JobFeed,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(jobs: &[ReviewJob]) -> JobSnapshot {
        Arc::new(jobs.to_vec())
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: &ReviewJob) -> Result<(), StoreError> {
        let mut jobs = self.jobs.lock().await;
        jobs.insert(0, job.clone());
        self.feed.publish(Self::snapshot(&jobs));
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<ReviewJob>, StoreError> {
        let jobs = self.jobs.lock().await;
        Ok(jobs.iter().find(|j| j.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<ReviewJob>, StoreError> {
        Ok(self.jobs.lock().await.clone())
    }

    async fn update(&self, id: Uuid, change: JobChange) -> Result<ReviewJob, StoreError> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or(StoreError::JobNotFound(id))?;
        job.apply(change)?;
        let updated = job.clone();
        self.feed.publish(Self::snapshot(&jobs));
        Ok(updated)
    }

    fn subscribe(&self) -> broadcast::Receiver<JobSnapshot> {
        self.feed.subscribe()
    }
}

#[derive(Default)]
struct AccessTables {
    credentials: Vec<Credential>,
    identities: Vec<(Identity, String)>,
}

#[derive(Default)]
pub struct MemoryAccessStore {
    tables: RwLock<AccessTables>,
}

impl MemoryAccessStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccessStore for MemoryAccessStore {
    async fn list_credentials(&self) -> Result<Vec<Credential>, StoreError> {
        Ok(self.tables.read().await.credentials.clone())
    }

    async fn get_credential(&self, id: Uuid) -> Result<Option<Credential>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.credentials.iter().find(|c| c.id == id).cloned())
    }

    async fn insert_credentials(&self, credentials: &[Credential]) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .credentials
            .extend(credentials.iter().cloned());
        Ok(())
    }

    async fn delete_credential(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.credentials.len();
        tables.credentials.retain(|c| c.id != id);
        Ok(tables.credentials.len() != before)
    }

    async fn list_identities(&self) -> Result<Vec<Identity>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.identities.iter().map(|(i, _)| i.clone()).collect())
    }

    async fn get_identity(&self, id: Uuid) -> Result<Option<Identity>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .identities
            .iter()
            .find(|(i, _)| i.id == id)
            .map(|(i, _)| i.clone()))
    }

    async fn find_login(&self, login: &str) -> Result<Option<(Identity, String)>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .identities
            .iter()
            .find(|(i, _)| i.login == login)
            .cloned())
    }

    async fn insert_identity(
        &self,
        identity: &Identity,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.identities.iter().any(|(i, _)| i.login == identity.login) {
            return Err(StoreError::DuplicateLogin(identity.login.clone()));
        }
        tables
            .identities
            .push((identity.clone(), password_hash.to_string()));
        Ok(())
    }

    async fn delete_identity(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.identities.len();
        tables.identities.retain(|(i, _)| i.id != id);
        Ok(tables.identities.len() != before)
    }
}
