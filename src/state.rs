use crate::access::AccessService;
use crate::agents::ReviewService;
use crate::config::Config;
use crate::db::{AccessStore, JobStore};
use crate::intake::FileIntake;
use crate::jobs::ReviewOrchestrator;
use crate::storage::BlobStore;
use std::sync::Arc;

pub struct AppState {
    pub config: Arc<Config>,
    pub access: AccessService,
    pub orchestrator: ReviewOrchestrator,
    pub blobs: Arc<dyn BlobStore>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        jobs: Arc<dyn JobStore>,
        access: Arc<dyn AccessStore>,
        ai: Arc<dyn ReviewService>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            access: AccessService::new(access.clone(), config.max_credentials),
            orchestrator: ReviewOrchestrator::new(jobs, access, ai, config.max_chat_files),
            blobs,
            config,
        }
    }

    /// A fresh intake for one request, bounded by `max_files`.
    pub fn intake(&self, max_files: usize) -> FileIntake {
        FileIntake::new(max_files, self.config.file_mode, self.blobs.clone())
    }
}
