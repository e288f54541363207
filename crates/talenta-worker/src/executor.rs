//! Job executor: per-queue worker pools over the shared queue client.
//!
//! Each named queue gets its own consumption loop with a semaphore sized to
//! the queue's concurrency, so parallelism is bounded per job type and
//! unbounded across types. Failure handling is driven entirely by error
//! severity; handlers never talk to the retry machinery themselves.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use talenta_queue::{Delivered, QueueJob, QueueName, RetryDecision};

use crate::analysis;
use crate::config::WorkerConfig;
use crate::error::{Severity, WorkerError, WorkerResult};
use crate::pipeline::{self, ProcessingContext};
use crate::trending;

/// Job executor that processes jobs from every queue.
pub struct JobExecutor {
    config: WorkerConfig,
    ctx: Arc<ProcessingContext>,
    shutdown: watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    pub fn new(config: WorkerConfig, ctx: Arc<ProcessingContext>) -> Self {
        let (shutdown, _) = watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());
        Self {
            config,
            ctx,
            shutdown,
            consumer_name,
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Subscribe to the shutdown signal (for co-located tasks like the
    /// recurring scheduler).
    pub fn shutdown_rx(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Run until shutdown.
    pub async fn run(&self) -> WorkerResult<()> {
        info!("Starting executor '{}'", self.consumer_name);
        self.ctx.queue.init().await?;

        let mut pools = Vec::new();
        let mut tasks = Vec::new();

        for queue in QueueName::ALL {
            let concurrency = queue.policy().concurrency;
            let semaphore = Arc::new(Semaphore::new(concurrency));
            pools.push((semaphore.clone(), concurrency));

            let ctx = Arc::clone(&self.ctx);
            let consumer_name = self.consumer_name.clone();
            let shutdown_rx = self.shutdown.subscribe();
            tasks.push(tokio::spawn(async move {
                consume_queue(ctx, queue, consumer_name, semaphore, shutdown_rx).await;
            }));
        }

        // Delayed-retry pump
        {
            let ctx = Arc::clone(&self.ctx);
            let mut shutdown_rx = self.shutdown.subscribe();
            let interval = self.config.pump_interval;
            tasks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                loop {
                    tokio::select! {
                        changed = shutdown_rx.changed() => {
                            if changed.is_err() || *shutdown_rx.borrow() { break; }
                        }
                        _ = ticker.tick() => {
                            if let Err(e) = ctx.queue.pump_delayed().await {
                                warn!("Failed to pump delayed jobs: {}", e);
                            }
                        }
                    }
                }
            }));
        }

        // Stale-delivery reclaim (crash recovery)
        {
            let ctx = Arc::clone(&self.ctx);
            let consumer_name = self.consumer_name.clone();
            let mut shutdown_rx = self.shutdown.subscribe();
            let interval = self.config.claim_interval;
            tasks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                loop {
                    tokio::select! {
                        changed = shutdown_rx.changed() => {
                            if changed.is_err() || *shutdown_rx.borrow() { break; }
                        }
                        _ = ticker.tick() => {
                            for queue in QueueName::ALL {
                                match ctx.queue.claim_stale(queue, &consumer_name, 5).await {
                                    Ok(jobs) if !jobs.is_empty() => {
                                        info!("Reclaimed {} stale deliveries on {}", jobs.len(), queue);
                                        for delivered in jobs {
                                            let ctx = Arc::clone(&ctx);
                                            tokio::spawn(async move {
                                                execute_job(ctx, delivered).await;
                                            });
                                        }
                                    }
                                    Ok(_) => {}
                                    Err(e) => warn!("Failed to claim stale deliveries: {}", e),
                                }
                            }
                        }
                    }
                }
            }));
        }

        // Wait for shutdown, then drain
        let mut shutdown_rx = self.shutdown.subscribe();
        while !*shutdown_rx.borrow() {
            if shutdown_rx.changed().await.is_err() {
                break;
            }
        }
        info!("Shutdown signalled, draining in-flight jobs");

        let _ = tokio::time::timeout(self.config.shutdown_timeout, async {
            loop {
                let busy = pools
                    .iter()
                    .any(|(sem, size)| sem.available_permits() != *size);
                if !busy {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        })
        .await;

        for task in tasks {
            task.abort();
        }

        info!("Executor stopped");
        Ok(())
    }
}

async fn consume_queue(
    ctx: Arc<ProcessingContext>,
    queue: QueueName,
    consumer_name: String,
    semaphore: Arc<Semaphore>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    info!(
        "Consuming {} with concurrency {}",
        queue,
        queue.policy().concurrency
    );

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let available = semaphore.available_permits();
        if available == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            continue;
        }

        let consumed = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() { break; }
                continue;
            }
            result = ctx.queue.consume(queue, &consumer_name, 1000, available) => result,
        };

        match consumed {
            Ok(jobs) => {
                if jobs.is_empty() {
                    continue;
                }
                debug!("Consumed {} jobs from {}", jobs.len(), queue);
                for delivered in jobs {
                    let Ok(permit) = semaphore.clone().acquire_owned().await else {
                        return;
                    };
                    let ctx = Arc::clone(&ctx);
                    tokio::spawn(async move {
                        let _permit = permit;
                        execute_job(ctx, delivered).await;
                    });
                }
            }
            Err(e) => {
                error!("Error consuming {}: {}", queue, e);
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }
}

/// Execute one delivery and settle it with the queue per error severity.
async fn execute_job(ctx: Arc<ProcessingContext>, delivered: Delivered) {
    let job_id = delivered.job.job_id().to_string();
    debug!("Executing job {} (attempt {})", job_id, delivered.attempt);

    match dispatch(&ctx, &delivered.job).await {
        Ok(()) => {
            info!("Job {} completed", job_id);
            settle_complete(&ctx, &delivered).await;
        }
        Err(e) => match e.severity() {
            Severity::Fatal => {
                error!("Job {} failed terminally: {}", job_id, e);
                if let Err(q) = ctx.queue.fail_terminal(&delivered, &e.to_string()).await {
                    error!("Failed to dead-letter job {}: {}", job_id, q);
                }
                if let Err(q) = ctx.queue.clear_dedup(&delivered.job).await {
                    warn!("Failed to clear dedup for job {}: {}", job_id, q);
                }
            }
            Severity::Retryable => {
                match ctx
                    .queue
                    .retry_or_dead_letter(&delivered, &e.to_string())
                    .await
                {
                    Ok(RetryDecision::Scheduled(delay)) => {
                        info!("Job {} will retry in {:?}", job_id, delay);
                    }
                    Ok(RetryDecision::DeadLettered) => {
                        if let Err(q) = ctx.queue.clear_dedup(&delivered.job).await {
                            warn!("Failed to clear dedup for job {}: {}", job_id, q);
                        }
                        after_dead_letter(&ctx, &delivered.job, &e).await;
                    }
                    Err(q) => error!("Failed to settle job {}: {}", job_id, q),
                }
            }
            Severity::BestEffort => {
                pipeline::log_swallowed(&delivered.job, &e);
                settle_complete(&ctx, &delivered).await;
            }
        },
    }
}

async fn settle_complete(ctx: &ProcessingContext, delivered: &Delivered) {
    if let Err(e) = ctx.queue.complete(delivered).await {
        error!(
            "Failed to ack job {}: {}",
            delivered.job.job_id(),
            e
        );
    }
    if let Err(e) = ctx.queue.clear_dedup(&delivered.job).await {
        warn!(
            "Failed to clear dedup for job {}: {}",
            delivered.job.job_id(),
            e
        );
    }
}

/// Bookkeeping after a job exhausts its attempts. A `process` video keeps
/// its last-set status; moderation carries the reason and the owner is
/// notified. A `video_analysis` video is only now marked failed, so an
/// attempt awaiting retry still reads as processing.
async fn after_dead_letter(ctx: &ProcessingContext, job: &QueueJob, error: &WorkerError) {
    match job {
        QueueJob::Process(j) => {
            if let Err(e) =
                pipeline::record_terminal_failure(ctx, &j.video_id, &error.to_string()).await
            {
                warn!(
                    "Failed to record terminal failure for {}: {}",
                    j.video_id, e
                );
            }
        }
        QueueJob::VideoAnalysis(j) => {
            if let Err(e) =
                analysis::record_analysis_failure(ctx, &j.video_id, &error.to_string()).await
            {
                warn!(
                    "Failed to record analysis failure for {}: {}",
                    j.video_id, e
                );
            }
        }
        _ => {}
    }
}

async fn dispatch(ctx: &ProcessingContext, job: &QueueJob) -> WorkerResult<()> {
    match job {
        QueueJob::Process(j) => pipeline::process_video(ctx, j).await,
        QueueJob::Cleanup(j) => pipeline::run_cleanup(ctx, j).await,
        QueueJob::VideoAnalysis(j) => analysis::analyze_video(ctx, j).await,
        QueueJob::CommentAnalysis(j) => analysis::analyze_comment(ctx, j).await,
        QueueJob::Send(j) => pipeline::send_email(ctx, j).await,
        QueueJob::CalculateTrending(_) => trending::recompute_all(ctx).await,
    }
}
