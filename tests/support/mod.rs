#![allow(dead_code)]

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use paper_reviewer::access::AccessService;
use paper_reviewer::agents::{ReviewService, ServiceError};
use paper_reviewer::db::{JobStore, MemoryAccessStore, MemoryJobStore};
use paper_reviewer::jobs::ReviewOrchestrator;
use paper_reviewer::models::{
    ChatTurn, ContentRef, Identity, ReviewJob, ReviewResult, Role, Source, UploadedFile,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use uuid::Uuid;

/// Secrets starting with this prefix make every call fail.
pub const FAILING_PREFIX: &str = "fail";
/// Secrets starting with this prefix review fine but cannot chat.
pub const MUTE_PREFIX: &str = "mute";

#[derive(Debug, Clone)]
pub struct ReviewCall {
    pub secret: String,
    pub prompt: String,
    pub files: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ChatCall {
    pub secret: String,
    pub history: Vec<ChatTurn>,
    pub turn: ChatTurn,
}

/// Deterministic review backend keyed on the credential secret.
pub struct ScriptedReviewer {
    gate: Option<Semaphore>,
    reviews: Mutex<Vec<ReviewCall>>,
    chats: Mutex<Vec<ChatCall>>,
}

impl ScriptedReviewer {
    pub fn new() -> Self {
        Self {
            gate: None,
            reviews: Mutex::new(Vec::new()),
            chats: Mutex::new(Vec::new()),
        }
    }

    /// Reviews block until [`ScriptedReviewer::release`] lets them through.
    pub fn held() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    pub fn release(&self, reviews: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(reviews);
        }
    }

    pub fn review_calls(&self) -> Vec<ReviewCall> {
        self.reviews.lock().unwrap().clone()
    }

    pub fn chat_calls(&self) -> Vec<ChatCall> {
        self.chats.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReviewService for ScriptedReviewer {
    async fn generate_review(
        &self,
        prompt: &str,
        files: &[UploadedFile],
        secret: &str,
    ) -> Result<ReviewResult, ServiceError> {
        self.reviews.lock().unwrap().push(ReviewCall {
            secret: secret.to_string(),
            prompt: prompt.to_string(),
            files: files.iter().map(|f| f.name.clone()).collect(),
        });
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        if secret.starts_with(FAILING_PREFIX) {
            return Err(ServiceError::Api(format!("quota exceeded for {}", secret)));
        }
        Ok(ReviewResult {
            report: format!("Review with {}: 80/100", secret),
            sources: vec![Source {
                uri: "https://scholar.example/related".to_string(),
                title: Some("Related work".to_string()),
            }],
        })
    }

    async fn continue_chat(
        &self,
        secret: &str,
        history: &[ChatTurn],
        turn: &ChatTurn,
    ) -> Result<String, ServiceError> {
        self.chats.lock().unwrap().push(ChatCall {
            secret: secret.to_string(),
            history: history.to_vec(),
            turn: turn.clone(),
        });
        if secret.starts_with(FAILING_PREFIX) || secret.starts_with(MUTE_PREFIX) {
            return Err(ServiceError::Api("chat unavailable".to_string()));
        }
        Ok(format!("Answer to: {}", turn.text))
    }
}

pub fn inline_file(name: &str, bytes: &[u8]) -> UploadedFile {
    UploadedFile {
        name: name.to_string(),
        media_type: "application/pdf".to_string(),
        size: bytes.len() as u64,
        content: ContentRef::Inline {
            data: STANDARD.encode(bytes),
        },
    }
}

pub struct Harness {
    pub jobs: Arc<MemoryJobStore>,
    pub access_store: Arc<MemoryAccessStore>,
    pub access: AccessService,
    pub ai: Arc<ScriptedReviewer>,
    pub orchestrator: ReviewOrchestrator,
    pub master: Identity,
}

impl Harness {
    pub async fn new(secrets: &[&str]) -> Self {
        Self::with_reviewer(ScriptedReviewer::new(), secrets).await
    }

    pub async fn with_reviewer(reviewer: ScriptedReviewer, secrets: &[&str]) -> Self {
        let jobs = Arc::new(MemoryJobStore::new());
        let access_store = Arc::new(MemoryAccessStore::new());
        let ai = Arc::new(reviewer);
        let access = AccessService::new(access_store.clone(), 10);
        let master = access
            .bootstrap_master("master", "master-pass")
            .await
            .unwrap()
            .unwrap();
        if !secrets.is_empty() {
            let secrets: Vec<String> = secrets.iter().map(|s| s.to_string()).collect();
            access.add_credentials(&master, "Key", &secrets).await.unwrap();
        }
        let orchestrator =
            ReviewOrchestrator::new(jobs.clone(), access_store.clone(), ai.clone(), 5);

        Self {
            jobs,
            access_store,
            access,
            ai,
            orchestrator,
            master,
        }
    }

    pub async fn user(&self, login: &str) -> Identity {
        self.access
            .add_identity(&self.master, login, "user-pass", Role::User)
            .await
            .unwrap()
    }

    pub async fn job(&self, id: Uuid) -> ReviewJob {
        self.jobs.get(id).await.unwrap().expect("job exists")
    }

    /// Waits on the job feed until every job has reached a terminal state.
    pub async fn settle(&self, ids: &[Uuid]) -> Vec<ReviewJob> {
        let mut rx = self.jobs.subscribe();
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let mut jobs = Vec::with_capacity(ids.len());
                for id in ids {
                    jobs.push(self.job(*id).await);
                }
                if jobs.iter().all(|j| j.status.is_terminal()) {
                    return jobs;
                }
                let _ = rx.recv().await;
            }
        })
        .await
        .expect("jobs did not finish in time")
    }

    /// Waits until the reviewer has been asked for `count` reviews.
    pub async fn wait_for_review_calls(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.ai.review_calls().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("review calls did not arrive in time")
    }
}
