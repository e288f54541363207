//! Media ingestion worker binary.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use talenta_ai_client::{FallbackScorer, HttpScorer, Scorer};
use talenta_queue::{ClaimConfig, JobQueue, RecurringScheduler, VideoClaims};
use talenta_scan::ScanClient;
use talenta_storage::ObjectStore;
use talenta_worker::{
    InMemoryCommentStore, InMemoryVideoStore, InMemoryViewStore, JobExecutor, LogNotifier,
    ProcessingContext, Profile, WorkerConfig,
};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("talenta=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting talenta-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let storage = match ObjectStore::from_env().await {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create object store client: {}", e);
            std::process::exit(1);
        }
    };

    let queue = match JobQueue::from_env() {
        Ok(q) => Arc::new(q),
        Err(e) => {
            error!("Failed to create job queue: {}", e);
            std::process::exit(1);
        }
    };

    let claims = match VideoClaims::new(&queue.config().redis_url, ClaimConfig::default()) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create claim store: {}", e);
            std::process::exit(1);
        }
    };

    let http_scorer = match HttpScorer::from_env() {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create AI client: {}", e);
            std::process::exit(1);
        }
    };
    // Strategy chosen once at startup: production surfaces scoring failures
    // for retry, development masks them with synthetic results
    let scorer: Arc<dyn Scorer> = match config.profile {
        Profile::Production => Arc::new(http_scorer),
        Profile::Development => Arc::new(FallbackScorer::new(http_scorer)),
    };

    let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);

    let ctx = Arc::new(ProcessingContext {
        config: config.clone(),
        storage,
        scanner: ScanClient::from_env(),
        queue: Arc::clone(&queue),
        claims,
        scorer,
        videos: Arc::new(InMemoryVideoStore::new()),
        views: Arc::new(InMemoryViewStore::new()),
        comments: Arc::new(InMemoryCommentStore::new()),
        notifier: Arc::new(LogNotifier),
        cancel_rx,
    });

    let executor = Arc::new(JobExecutor::new(config, ctx));

    let scheduler = match RecurringScheduler::trending(Arc::clone(&queue)) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create recurring scheduler: {}", e);
            std::process::exit(1);
        }
    };
    let scheduler_shutdown = executor.shutdown_rx();
    let scheduler_task = tokio::spawn(async move {
        scheduler.run(scheduler_shutdown).await;
    });

    // Ctrl-C triggers a graceful drain
    {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Received shutdown signal");
            let _ = cancel_tx.send(true);
            executor.shutdown();
        });
    }

    if let Err(e) = executor.run().await {
        error!("Executor error: {}", e);
        std::process::exit(1);
    }

    scheduler_task.await.ok();

    info!("Worker shutdown complete");
}
