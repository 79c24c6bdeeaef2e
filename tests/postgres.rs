//! Runs against a live database only when `DATABASE_URL` is set.

use paper_reviewer::db::{
    create_pool, run_migrations, AccessStore, DbPool, JobStore, PgAccessStore, PgJobStore,
    StoreError,
};
use paper_reviewer::models::{
    ChatTurn, Credential, Identity, JobChange, Progress, ReviewJob, ReviewResult, ReviewStatus,
    Role, Source,
};
use std::sync::Arc;
use uuid::Uuid;

async fn pool() -> Option<DbPool> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) if !url.trim().is_empty() => url,
        _ => {
            eprintln!("DATABASE_URL not set; skipping Postgres test");
            return None;
        }
    };
    let pool = create_pool(&url).await.expect("Failed to connect");
    run_migrations(&pool).await.expect("Failed to migrate");
    Some(pool)
}

fn job() -> ReviewJob {
    ReviewJob::new(
        Uuid::new_v4(),
        Uuid::new_v4(),
        "Pro-1",
        "paper.pdf",
        "Q1 journal",
        Vec::new(),
    )
}

fn result(report: &str) -> ReviewResult {
    ReviewResult {
        report: report.to_string(),
        sources: vec![Source {
            uri: "https://scholar.example/related".to_string(),
            title: None,
        }],
    }
}

mod jobs {
    use super::*;

    #[tokio::test]
    async fn lifecycle_is_persisted() {
        let Some(pool) = pool().await else { return };
        let store = PgJobStore::new(pool);
        let created = job();
        store.create(&created).await.unwrap();

        store
            .update(created.id, JobChange::Start(Progress::new("Initializing...", 10)))
            .await
            .unwrap();
        store
            .update(created.id, JobChange::Complete(result("Solid work")))
            .await
            .unwrap();
        store
            .update(created.id, JobChange::AppendTurn(ChatTurn::user("Why?", Vec::new())))
            .await
            .unwrap();

        let stored = store.get(created.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReviewStatus::Completed);
        assert_eq!(stored.progress.percentage, 100);
        assert_eq!(stored.result, Some(result("Solid work")));
        assert_eq!(stored.chat_history.len(), 1);
        assert_eq!(stored.credential_name, "Pro-1");
    }

    #[tokio::test]
    async fn refused_change_is_not_written() {
        let Some(pool) = pool().await else { return };
        let store = PgJobStore::new(pool);
        let created = job();
        store.create(&created).await.unwrap();

        let err = store
            .update(created.id, JobChange::Complete(result("too early")))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Transition(_)));
        let stored = store.get(created.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReviewStatus::Pending);
        assert!(stored.result.is_none());

        let missing = Uuid::new_v4();
        assert!(matches!(
            store.update(missing, JobChange::Fail("x".to_string())).await,
            Err(StoreError::JobNotFound(id)) if id == missing
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn last_snapshot_reflects_every_concurrent_write() {
        let Some(pool) = pool().await else { return };
        let store = Arc::new(PgJobStore::new(pool));
        let jobs = vec![job(), job(), job()];
        for job in &jobs {
            store.create(job).await.unwrap();
        }
        let mut rx = store.subscribe();

        let tasks: Vec<_> = jobs
            .iter()
            .map(|job| {
                let store = store.clone();
                let id = job.id;
                tokio::spawn(async move {
                    store
                        .update(id, JobChange::Start(Progress::new("Initializing...", 10)))
                        .await
                        .unwrap();
                    for pct in [25, 50, 90] {
                        store
                            .update(id, JobChange::Progress(Progress::new("Working", pct)))
                            .await
                            .unwrap();
                    }
                    store
                        .update(id, JobChange::Complete(result("done")))
                        .await
                        .unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let mut last = None;
        while let Ok(snapshot) = rx.try_recv() {
            last = Some(snapshot);
        }
        let last = last.expect("no snapshot published");
        for job in &jobs {
            let seen = last.iter().find(|j| j.id == job.id).unwrap();
            assert_eq!(seen.status, ReviewStatus::Completed);
        }
    }
}

mod access {
    use super::*;

    #[tokio::test]
    async fn credentials_round_trip() {
        let Some(pool) = pool().await else { return };
        let store = PgAccessStore::new(pool);
        let credential = Credential::new(format!("Pg-{}", Uuid::new_v4()), "AIza-secret");
        store
            .insert_credentials(std::slice::from_ref(&credential))
            .await
            .unwrap();

        let fetched = store.get_credential(credential.id).await.unwrap().unwrap();
        assert_eq!(fetched.secret, "AIza-secret");
        assert!(store
            .list_credentials()
            .await
            .unwrap()
            .iter()
            .any(|c| c.id == credential.id));

        assert!(store.delete_credential(credential.id).await.unwrap());
        assert!(!store.delete_credential(credential.id).await.unwrap());
        assert!(store.get_credential(credential.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_login_is_refused() {
        let Some(pool) = pool().await else { return };
        let store = PgAccessStore::new(pool);
        let alice = Identity {
            id: Uuid::new_v4(),
            login: format!("alice-{}", Uuid::new_v4().simple()),
            role: Role::User,
        };
        store.insert_identity(&alice, "hash").await.unwrap();

        let again = Identity {
            id: Uuid::new_v4(),
            ..alice.clone()
        };
        assert!(matches!(
            store.insert_identity(&again, "hash").await,
            Err(StoreError::DuplicateLogin(_))
        ));

        let (found, hash) = store.find_login(&alice.login).await.unwrap().unwrap();
        assert_eq!(found, alice);
        assert_eq!(hash, "hash");
        assert!(store.delete_identity(alice.id).await.unwrap());
    }
}
