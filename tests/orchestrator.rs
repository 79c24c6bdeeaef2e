mod support;

use async_trait::async_trait;
use paper_reviewer::db::{AccessStore, JobStore, MemoryAccessStore, StoreError};
use paper_reviewer::error::AppError;
use paper_reviewer::jobs::{ReviewOrchestrator, CREDENTIAL_MISSING};
use paper_reviewer::models::{Credential, Identity, ReviewStatus};
use std::collections::HashSet;
use std::sync::Arc;
use support::{inline_file, Harness, ScriptedReviewer};
use uuid::Uuid;

mod fan_out {
    use super::*;

    #[tokio::test]
    async fn one_job_per_credential_with_distinct_ids() {
        let h = Harness::new(&["k1", "k2", "k3"]).await;
        let ids = h
            .orchestrator
            .start_review(&h.master, vec![inline_file("paper.pdf", b"%PDF")], "A* Conference")
            .await
            .unwrap();

        assert_eq!(ids.len(), 3);
        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 3);

        let jobs = h.settle(&ids).await;
        for job in &jobs {
            assert_eq!(job.status, ReviewStatus::Completed);
            assert_eq!(job.progress.percentage, 100);
            assert_eq!(job.manuscript_name, "paper.pdf");
            assert_eq!(job.reviewer_profile, "A* Conference");
            assert_eq!(job.owner_id, h.master.id);
        }
        let names: Vec<&str> = jobs.iter().map(|j| j.credential_name.as_str()).collect();
        assert_eq!(names, vec!["Key-1", "Key-2", "Key-3"]);
    }

    #[tokio::test]
    async fn manuscript_is_named_after_first_file() {
        let h = Harness::new(&["k1"]).await;
        let files = vec![
            inline_file("main.pdf", b"a"),
            inline_file("appendix.pdf", b"b"),
        ];
        let ids = h
            .orchestrator
            .start_review(&h.master, files, "Q1 journal")
            .await
            .unwrap();
        let jobs = h.settle(&ids).await;
        assert_eq!(jobs[0].manuscript_name, "main.pdf");
        assert_eq!(jobs[0].files.len(), 2);

        let calls = h.ai.review_calls();
        assert_eq!(calls[0].files, vec!["main.pdf", "appendix.pdf"]);
        assert!(calls[0].prompt.starts_with("You're a Q1 journal's reviewer"));
    }

    #[tokio::test]
    async fn jobs_run_in_background_until_the_review_returns() {
        let h = Harness::with_reviewer(ScriptedReviewer::held(), &["k1", "k2"]).await;
        let ids = h
            .orchestrator
            .start_review(&h.master, vec![inline_file("paper.pdf", b"x")], "Q1 journal")
            .await
            .unwrap();

        h.wait_for_review_calls(2).await;
        for id in &ids {
            let job = h.job(*id).await;
            assert_eq!(job.status, ReviewStatus::Running);
            assert!(job.progress.percentage < 100);
            assert!(job.result.is_none());
        }

        h.ai.release(2);
        let jobs = h.settle(&ids).await;
        assert!(jobs.iter().all(|j| j.status == ReviewStatus::Completed));
    }
}

mod failures {
    use super::*;

    #[tokio::test]
    async fn one_failure_does_not_affect_siblings() {
        let h = Harness::new(&["k1", "fail-2", "k3"]).await;
        let ids = h
            .orchestrator
            .start_review(&h.master, vec![inline_file("paper.pdf", b"x")], "Q1 journal")
            .await
            .unwrap();
        let jobs = h.settle(&ids).await;

        let failed: Vec<_> = jobs
            .iter()
            .filter(|j| j.status == ReviewStatus::Failed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].credential_name, "Key-2");
        assert_eq!(
            failed[0].error.as_deref(),
            Some("Gemini API Error: quota exceeded for fail-2")
        );
        assert_eq!(failed[0].progress.percentage, 0);
        assert!(failed[0].result.is_none());

        let completed = jobs
            .iter()
            .filter(|j| j.status == ReviewStatus::Completed)
            .count();
        assert_eq!(completed, 2);
    }

    /// Lists credentials normally but can no longer resolve any of them.
    struct ForgetfulAccessStore(Arc<MemoryAccessStore>);

    #[async_trait]
    impl AccessStore for ForgetfulAccessStore {
        async fn list_credentials(&self) -> Result<Vec<Credential>, StoreError> {
            self.0.list_credentials().await
        }
        async fn get_credential(&self, _id: Uuid) -> Result<Option<Credential>, StoreError> {
            Ok(None)
        }
        async fn insert_credentials(&self, credentials: &[Credential]) -> Result<(), StoreError> {
            self.0.insert_credentials(credentials).await
        }
        async fn delete_credential(&self, id: Uuid) -> Result<bool, StoreError> {
            self.0.delete_credential(id).await
        }
        async fn list_identities(&self) -> Result<Vec<Identity>, StoreError> {
            self.0.list_identities().await
        }
        async fn get_identity(&self, id: Uuid) -> Result<Option<Identity>, StoreError> {
            self.0.get_identity(id).await
        }
        async fn find_login(&self, login: &str) -> Result<Option<(Identity, String)>, StoreError> {
            self.0.find_login(login).await
        }
        async fn insert_identity(
            &self,
            identity: &Identity,
            password_hash: &str,
        ) -> Result<(), StoreError> {
            self.0.insert_identity(identity, password_hash).await
        }
        async fn delete_identity(&self, id: Uuid) -> Result<bool, StoreError> {
            self.0.delete_identity(id).await
        }
    }

    #[tokio::test]
    async fn unresolvable_credential_fails_the_job() {
        let h = Harness::new(&["k1"]).await;
        let orchestrator = ReviewOrchestrator::new(
            h.jobs.clone(),
            Arc::new(ForgetfulAccessStore(h.access_store.clone())),
            h.ai.clone(),
            5,
        );
        let ids = orchestrator
            .start_review(&h.master, vec![inline_file("paper.pdf", b"x")], "Q1 journal")
            .await
            .unwrap();

        let jobs = h.settle(&ids).await;
        assert_eq!(jobs[0].status, ReviewStatus::Failed);
        assert_eq!(jobs[0].error.as_deref(), Some(CREDENTIAL_MISSING));
        assert!(h.ai.review_calls().is_empty());
    }

    #[tokio::test]
    async fn credential_removed_after_resolution_still_completes() {
        let h = Harness::with_reviewer(ScriptedReviewer::held(), &["k1"]).await;
        let ids = h
            .orchestrator
            .start_review(&h.master, vec![inline_file("paper.pdf", b"x")], "Q1 journal")
            .await
            .unwrap();
        h.wait_for_review_calls(1).await;

        let credential = h.access_store.list_credentials().await.unwrap()[0].clone();
        h.access.remove_credential(&h.master, credential.id).await.unwrap();
        h.ai.release(1);

        let jobs = h.settle(&ids).await;
        assert_eq!(jobs[0].status, ReviewStatus::Completed);
        assert_eq!(jobs[0].credential_name, "Key-1");
    }
}

mod validation {
    use super::*;

    #[tokio::test]
    async fn no_files_creates_nothing() {
        let h = Harness::new(&["k1"]).await;
        let err = h
            .orchestrator
            .start_review(&h.master, vec![], "Q1 journal")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Please upload at least one file (manuscript).");
        assert!(h.jobs.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn no_credentials_creates_nothing() {
        let h = Harness::new(&[]).await;
        let err = h
            .orchestrator
            .start_review(&h.master, vec![inline_file("paper.pdf", b"x")], "Q1 journal")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "No API keys configured. Master user needs to add at least one."
        );
        assert!(h.jobs.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_profile_creates_nothing() {
        let h = Harness::new(&["k1"]).await;
        let err = h
            .orchestrator
            .start_review(&h.master, vec![inline_file("paper.pdf", b"x")], "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(h.jobs.list().await.unwrap().is_empty());
    }
}

mod visibility {
    use super::*;

    #[tokio::test]
    async fn users_only_see_their_own_jobs() {
        let h = Harness::new(&["k1"]).await;
        let alice = h.user("alice").await;
        let bob = h.user("bob").await;

        let alice_ids = h
            .orchestrator
            .start_review(&alice, vec![inline_file("a.pdf", b"a")], "Q1 journal")
            .await
            .unwrap();
        let bob_ids = h
            .orchestrator
            .start_review(&bob, vec![inline_file("b.pdf", b"b")], "Q1 journal")
            .await
            .unwrap();
        h.settle(&[alice_ids.clone(), bob_ids.clone()].concat()).await;

        let seen: Vec<_> = h
            .orchestrator
            .visible_jobs(&alice)
            .await
            .unwrap()
            .into_iter()
            .map(|j| j.id)
            .collect();
        assert_eq!(seen, alice_ids);
        assert!(matches!(
            h.orchestrator.visible_job(&alice, bob_ids[0]).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(h.orchestrator.visible_jobs(&h.master).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn feed_carries_full_snapshots() {
        let h = Harness::new(&["k1", "k2"]).await;
        let mut rx = h.orchestrator.subscribe();
        let ids = h
            .orchestrator
            .start_review(&h.master, vec![inline_file("paper.pdf", b"x")], "Q1 journal")
            .await
            .unwrap();
        h.settle(&ids).await;

        let mut last = None;
        while let Ok(snapshot) = rx.try_recv() {
            last = Some(snapshot);
        }
        let last = last.expect("feed published snapshots");
        assert_eq!(last.len(), 2);
        assert!(last.iter().all(|j| j.status.is_terminal()));
    }
}

mod progress {
    use super::*;

    #[tokio::test]
    async fn progress_rises_and_completes_last() {
        let h = Harness::new(&["k1"]).await;
        let mut rx = h.orchestrator.subscribe();
        let ids = h
            .orchestrator
            .start_review(&h.master, vec![inline_file("paper.pdf", b"x")], "Q1 journal")
            .await
            .unwrap();
        h.settle(&ids).await;

        let mut seen = Vec::new();
        while let Ok(snapshot) = rx.try_recv() {
            if let Some(job) = snapshot.iter().find(|j| j.id == ids[0]) {
                seen.push((job.status, job.progress.clone()));
            }
        }

        let labels: Vec<&str> = seen.iter().map(|(_, p)| p.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "Queued",
                "Initializing...",
                "Uploading Files...",
                "Analyzing Content & Searching Web...",
                "Generating Report...",
                "Completed",
            ]
        );
        assert!(seen.windows(2).all(|w| w[0].1.percentage <= w[1].1.percentage));
        assert!(seen
            .iter()
            .filter(|(_, p)| p.percentage == 100)
            .all(|(status, _)| *status == ReviewStatus::Completed));
    }
}
