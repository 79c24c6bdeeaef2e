use paper_reviewer::access::AccessService;
use paper_reviewer::agents::{GeminiAgent, ReviewService};
use paper_reviewer::config::{Config, StoreBackend};
use paper_reviewer::db::{self, AccessStore, JobStore};
use paper_reviewer::routes::create_router;
use paper_reviewer::state::AppState;
use paper_reviewer::storage::{ensure_dir, BlobStore, LocalBlobStore};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "paper_reviewer=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    let config = Arc::new(config);

    ensure_dir(&config.blob_folder)?;

    let (jobs, access): (Arc<dyn JobStore>, Arc<dyn AccessStore>) = match config.store_backend {
        StoreBackend::Postgres => {
            let pool = db::create_pool(&config.database_url).await?;
            db::run_migrations(pool.as_ref()).await?;
            let jobs: Arc<dyn JobStore> = Arc::new(db::PgJobStore::new(pool.clone()));
            let access: Arc<dyn AccessStore> = Arc::new(db::PgAccessStore::new(pool));
            (jobs, access)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory stores; jobs and accounts are lost on restart");
            let jobs: Arc<dyn JobStore> = Arc::new(db::MemoryJobStore::new());
            let access: Arc<dyn AccessStore> = Arc::new(db::MemoryAccessStore::new());
            (jobs, access)
        }
    };

    let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(
        config.blob_folder.clone(),
        &config.public_base_url,
    ));
    let agent = GeminiAgent::new(
        &config.gemini_api_base,
        &config.gemini_model,
        config.gemini_timeout,
        blobs.clone(),
    )?;
    tracing::info!(model = agent.model(), "Review service ready");
    let ai: Arc<dyn ReviewService> = Arc::new(agent);

    let state = Arc::new(AppState::new(config.clone(), jobs, access, ai, blobs));
    bootstrap(&state.access, &config).await?;

    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Paper reviewer listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn bootstrap(
    access: &AccessService,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if access
        .bootstrap_master(&config.master_login, &config.master_password)
        .await?
        .is_none()
    {
        tracing::info!("Identities already present; skipping master bootstrap");
    }
    Ok(())
}
