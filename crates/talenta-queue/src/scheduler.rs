//! Cron-style recurring jobs.
//!
//! The scheduler sleeps until each upcoming occurrence and enqueues a job
//! stamped with the occurrence time. The enqueue-side dedup key makes
//! registration idempotent: several processes (or a restart mid-window) may
//! all fire for the same occurrence, but only one entry reaches the stream.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use cron::Schedule;
use tokio::sync::watch;
use tracing::{error, info};

use crate::error::{QueueError, QueueResult};
use crate::job::{CalculateTrendingJob, QueueJob};
use crate::queue::JobQueue;

/// Hourly, on the hour.
pub const TRENDING_SCHEDULE: &str = "0 0 * * * *";

/// Scheduler for recurring queue jobs.
pub struct RecurringScheduler {
    queue: Arc<JobQueue>,
    schedule: Schedule,
}

impl RecurringScheduler {
    pub fn new(queue: Arc<JobQueue>, cron_expr: &str) -> QueueResult<Self> {
        let schedule = Schedule::from_str(cron_expr)
            .map_err(|e| QueueError::InvalidSchedule(format!("{cron_expr}: {e}")))?;
        Ok(Self { queue, schedule })
    }

    /// Scheduler for the hourly trending recompute.
    pub fn trending(queue: Arc<JobQueue>) -> QueueResult<Self> {
        Self::new(queue, TRENDING_SCHEDULE)
    }

    /// Run until shutdown is signalled. Each occurrence enqueues one
    /// trending job keyed by its scheduled time.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("Recurring scheduler started");

        loop {
            let Some(next) = self.schedule.upcoming(Utc).next() else {
                error!("Schedule yields no upcoming occurrence, stopping");
                return;
            };

            let wait = (next - Utc::now()).to_std().unwrap_or_default();
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Recurring scheduler stopping");
                        return;
                    }
                    continue;
                }
            }

            let job = QueueJob::CalculateTrending(CalculateTrendingJob::new(next));
            match self.queue.enqueue(job).await {
                Ok(Some(id)) => info!("Scheduled trending run {} as {}", next, id),
                Ok(None) => info!("Trending run {} already scheduled elsewhere", next),
                Err(e) => error!("Failed to enqueue trending run {}: {}", next, e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trending_schedule_parses_hourly() {
        let schedule = Schedule::from_str(TRENDING_SCHEDULE).expect("valid cron");
        let mut upcoming = schedule.upcoming(Utc);
        let a = upcoming.next().unwrap();
        let b = upcoming.next().unwrap();
        assert_eq!((b - a).num_minutes(), 60);
        assert_eq!(a.timestamp() % 3600, 0);
    }

    #[test]
    fn test_occurrence_dedup_key_stable() {
        let at = Utc::now();
        let a = CalculateTrendingJob::new(at);
        let b = CalculateTrendingJob::new(at);
        // Same occurrence, same dedup key, regardless of job id
        assert_eq!(a.idempotency_key(), b.idempotency_key());
        assert_ne!(a.job_id, b.job_id);
    }

    #[test]
    fn test_invalid_expression_rejected() {
        assert!(Schedule::from_str("not a cron").is_err());
    }
}
