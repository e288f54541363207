//! Durable job queue over Redis Streams.
//!
//! Each named queue is a set of streams, one per priority band, consumed
//! through a shared consumer group. Retries re-enqueue through a delayed
//! sorted set scored by due time; exhausted jobs land in a per-queue
//! dead-letter stream capped at the queue's retention.

use std::time::Duration;

use chrono::Utc;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::job::{Priority, QueueJob, QueueName};

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Key namespace prefix
    pub namespace: String,
    /// Consumer group name
    pub consumer_group: String,
    /// Dedup key TTL
    pub dedup_ttl: Duration,
    /// Idle time before a pending delivery is considered abandoned
    pub visibility_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            namespace: "talenta".to_string(),
            consumer_group: "talenta:workers".to_string(),
            dedup_ttl: Duration::from_secs(3600),
            visibility_timeout: Duration::from_secs(600),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            namespace: std::env::var("QUEUE_NAMESPACE").unwrap_or(defaults.namespace),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or(defaults.consumer_group),
            dedup_ttl: Duration::from_secs(
                std::env::var("QUEUE_DEDUP_TTL")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            ),
            visibility_timeout: Duration::from_secs(
                std::env::var("QUEUE_VISIBILITY_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
        }
    }
}

/// A job delivered to a worker, with enough context to ack or retry it.
#[derive(Debug, Clone)]
pub struct Delivered {
    /// Stream the entry was read from
    pub stream: String,
    /// Stream entry ID
    pub message_id: String,
    /// Delivery attempt, 1-based
    pub attempt: u32,
    pub job: QueueJob,
}

/// Outcome of handing a failed delivery back to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-delivery scheduled after this delay
    Scheduled(Duration),
    /// Attempts exhausted, moved to the dead-letter stream
    DeadLettered,
}

/// Entry parked in the delayed sorted set awaiting its due time.
#[derive(Debug, Serialize, Deserialize)]
struct DelayedEntry {
    stream: String,
    payload: String,
    attempt: u32,
}

/// Job queue client.
pub struct JobQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl JobQueue {
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    fn stream_key(&self, queue: QueueName, priority: Priority) -> String {
        format!("{}:q:{}:{}", self.config.namespace, queue, priority.as_str())
    }

    fn dlq_key(&self, queue: QueueName) -> String {
        format!("{}:dlq:{}", self.config.namespace, queue)
    }

    fn done_key(&self, queue: QueueName) -> String {
        format!("{}:done:{}", self.config.namespace, queue)
    }

    fn delayed_key(&self) -> String {
        format!("{}:delayed", self.config.namespace)
    }

    fn dedup_key(&self, idempotency_key: &str) -> String {
        format!("{}:dedup:{}", self.config.namespace, idempotency_key)
    }

    async fn conn(&self) -> QueueResult<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    /// XGROUP CREATE starting at ID 0, so entries enqueued before the first
    /// worker ever booted are still delivered to the group.
    fn group_create_cmd(&self, stream: &str) -> redis::Cmd {
        let mut cmd = redis::cmd("XGROUP");
        cmd.arg("CREATE")
            .arg(stream)
            .arg(&self.config.consumer_group)
            .arg("0")
            .arg("MKSTREAM");
        cmd
    }

    /// Create consumer groups for every queue/priority stream.
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.conn().await?;

        for queue in QueueName::ALL {
            for priority in Priority::ALL {
                let stream = self.stream_key(queue, priority);
                let result: Result<(), redis::RedisError> = self
                    .group_create_cmd(&stream)
                    .query_async(&mut conn)
                    .await;

                match result {
                    Ok(_) => debug!("Created consumer group on {}", stream),
                    Err(e) if e.to_string().contains("BUSYGROUP") => {}
                    Err(e) => return Err(QueueError::Redis(e)),
                }
            }
        }

        info!("Queue initialized: group {}", self.config.consumer_group);
        Ok(())
    }

    /// Enqueue a job at its default priority.
    ///
    /// Returns `None` when a job with the same idempotency key was enqueued
    /// within the dedup window.
    pub async fn enqueue(&self, job: QueueJob) -> QueueResult<Option<String>> {
        let priority = job.default_priority();
        self.enqueue_with(job, priority).await
    }

    /// Enqueue a job at an explicit priority.
    pub async fn enqueue_with(
        &self,
        job: QueueJob,
        priority: Priority,
    ) -> QueueResult<Option<String>> {
        let mut conn = self.conn().await?;

        let payload = serde_json::to_string(&job)?;
        let idempotency_key = job.idempotency_key();

        // SET NX claims the dedup window atomically
        let dedup_key = self.dedup_key(&idempotency_key);
        let claimed: Option<String> = redis::cmd("SET")
            .arg(&dedup_key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(self.config.dedup_ttl.as_secs())
            .query_async(&mut conn)
            .await?;
        if claimed.is_none() {
            warn!("Duplicate job suppressed: {}", idempotency_key);
            return Ok(None);
        }

        let stream = self.stream_key(job.queue(), priority);
        let message_id: String = redis::cmd("XADD")
            .arg(&stream)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("key")
            .arg(&idempotency_key)
            .arg("attempt")
            .arg(1u32)
            .query_async(&mut conn)
            .await?;

        info!(
            "Enqueued job {} on {} with message ID {}",
            job.job_id(),
            stream,
            message_id
        );
        Ok(Some(message_id))
    }

    /// Consume new jobs from one queue, highest priority first.
    pub async fn consume(
        &self,
        queue: QueueName,
        consumer_name: &str,
        block_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<Delivered>> {
        let mut conn = self.conn().await?;

        let streams: Vec<String> = Priority::ALL
            .iter()
            .map(|p| self.stream_key(queue, *p))
            .collect();

        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS");
        for stream in &streams {
            cmd.arg(stream);
        }
        for _ in &streams {
            cmd.arg(">");
        }

        let result: redis::streams::StreamReadReply = cmd.query_async(&mut conn).await?;

        let mut delivered = Vec::new();
        // Reply keys follow request order, so high-priority entries sort first
        for stream in &streams {
            for stream_key in result.keys.iter().filter(|k| &k.key == stream) {
                for entry in &stream_key.ids {
                    if let Some(d) = self.parse_entry(stream, entry).await {
                        delivered.push(d);
                    }
                }
            }
        }

        Ok(delivered)
    }

    async fn parse_entry(
        &self,
        stream: &str,
        entry: &redis::streams::StreamId,
    ) -> Option<Delivered> {
        let payload = match entry.map.get("job") {
            Some(redis::Value::BulkString(payload)) => String::from_utf8_lossy(payload).to_string(),
            _ => return None,
        };

        let attempt = match entry.map.get("attempt") {
            Some(redis::Value::BulkString(raw)) => String::from_utf8_lossy(raw)
                .parse::<u32>()
                .unwrap_or(1),
            _ => 1,
        };

        match serde_json::from_str::<QueueJob>(&payload) {
            Ok(job) => {
                debug!("Consumed job {} from {}", job.job_id(), stream);
                Some(Delivered {
                    stream: stream.to_string(),
                    message_id: entry.id.clone(),
                    attempt,
                    job,
                })
            }
            Err(e) => {
                warn!("Failed to parse job payload: {}", e);
                // Ack the malformed message to prevent reprocessing
                self.ack(stream, &entry.id).await.ok();
                None
            }
        }
    }

    /// Acknowledge and delete a stream entry.
    async fn ack(&self, stream: &str, message_id: &str) -> QueueResult<()> {
        let mut conn = self.conn().await?;

        redis::cmd("XACK")
            .arg(stream)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;
        redis::cmd("XDEL")
            .arg(stream)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        debug!("Acknowledged {}", message_id);
        Ok(())
    }

    /// Mark a delivery completed: ack it and record it in the capped
    /// completion stream for operator inspection.
    pub async fn complete(&self, delivered: &Delivered) -> QueueResult<()> {
        self.ack(&delivered.stream, &delivered.message_id).await?;

        let queue = delivered.job.queue();
        let mut conn = self.conn().await?;
        redis::cmd("XADD")
            .arg(self.done_key(queue))
            .arg("MAXLEN")
            .arg("~")
            .arg(queue.policy().keep_completed)
            .arg("*")
            .arg("job_id")
            .arg(delivered.job.job_id().as_str())
            .arg("attempts")
            .arg(delivered.attempt)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    /// Hand a failed delivery back: schedule a retry after backoff, or move
    /// it to the dead-letter stream when attempts are exhausted.
    pub async fn retry_or_dead_letter(
        &self,
        delivered: &Delivered,
        error: &str,
    ) -> QueueResult<RetryDecision> {
        let policy = delivered.job.queue().policy();

        if policy.exhausted(delivered.attempt) {
            self.dead_letter(delivered, error).await?;
            return Ok(RetryDecision::DeadLettered);
        }

        let delay = policy.backoff.delay_for(delivered.attempt);
        let due_ms = Utc::now().timestamp_millis() + delay.as_millis() as i64;
        let entry = DelayedEntry {
            stream: delivered.stream.clone(),
            payload: serde_json::to_string(&delivered.job)?,
            attempt: delivered.attempt + 1,
        };

        let mut conn = self.conn().await?;
        conn.zadd::<_, _, _, ()>(self.delayed_key(), serde_json::to_string(&entry)?, due_ms)
            .await?;
        self.ack(&delivered.stream, &delivered.message_id).await?;

        warn!(
            "Job {} attempt {}/{} failed ({}), retrying in {:?}",
            delivered.job.job_id(),
            delivered.attempt,
            policy.max_attempts,
            error,
            delay
        );
        Ok(RetryDecision::Scheduled(delay))
    }

    /// Dead-letter a delivery immediately, bypassing remaining attempts.
    /// Used for failures that retrying cannot change.
    pub async fn fail_terminal(&self, delivered: &Delivered, error: &str) -> QueueResult<()> {
        self.dead_letter(delivered, error).await
    }

    /// Drop the dedup key for a job so an identical one can be enqueued
    /// again (after completion or dead-lettering).
    pub async fn clear_dedup(&self, job: &QueueJob) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        conn.del::<_, ()>(self.dedup_key(&job.idempotency_key()))
            .await?;
        Ok(())
    }

    async fn dead_letter(&self, delivered: &Delivered, error: &str) -> QueueResult<()> {
        let queue = delivered.job.queue();
        let mut conn = self.conn().await?;

        redis::cmd("XADD")
            .arg(self.dlq_key(queue))
            .arg("MAXLEN")
            .arg("~")
            .arg(queue.policy().keep_failed)
            .arg("*")
            .arg("job")
            .arg(serde_json::to_string(&delivered.job)?)
            .arg("error")
            .arg(error)
            .arg("attempts")
            .arg(delivered.attempt)
            .arg("original_id")
            .arg(&delivered.message_id)
            .query_async::<()>(&mut conn)
            .await?;

        self.ack(&delivered.stream, &delivered.message_id).await?;

        warn!(
            "Job {} dead-lettered after {} attempts: {}",
            delivered.job.job_id(),
            delivered.attempt,
            error
        );
        Ok(())
    }

    /// Move due delayed entries back onto their streams. Called periodically
    /// by the worker loop; safe to run from multiple processes.
    pub async fn pump_delayed(&self) -> QueueResult<usize> {
        let mut conn = self.conn().await?;
        let now_ms = Utc::now().timestamp_millis();

        let due: Vec<String> = redis::cmd("ZRANGEBYSCORE")
            .arg(self.delayed_key())
            .arg("-inf")
            .arg(now_ms)
            .arg("LIMIT")
            .arg(0)
            .arg(100)
            .query_async(&mut conn)
            .await?;

        let mut moved = 0;
        for member in due {
            // Only the process that removes the member re-enqueues it
            let removed: u32 = conn.zrem(self.delayed_key(), &member).await?;
            if removed == 0 {
                continue;
            }

            let entry: DelayedEntry = match serde_json::from_str(&member) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Dropping malformed delayed entry: {}", e);
                    continue;
                }
            };

            redis::cmd("XADD")
                .arg(&entry.stream)
                .arg("*")
                .arg("job")
                .arg(&entry.payload)
                .arg("attempt")
                .arg(entry.attempt)
                .query_async::<()>(&mut conn)
                .await?;
            moved += 1;
        }

        if moved > 0 {
            debug!("Re-enqueued {} delayed jobs", moved);
        }
        Ok(moved)
    }

    /// XAUTOCLAIM scanning the whole pending-entries list from 0-0. XCLAIM
    /// would need the explicit message IDs; XAUTOCLAIM walks the PEL itself
    /// and skips entries idle for less than the visibility timeout.
    fn autoclaim_cmd(&self, stream: &str, consumer_name: &str, count: usize) -> redis::Cmd {
        let mut cmd = redis::cmd("XAUTOCLAIM");
        cmd.arg(stream)
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg(self.config.visibility_timeout.as_millis() as u64)
            .arg("0-0")
            .arg("COUNT")
            .arg(count);
        cmd
    }

    /// Claim deliveries stuck pending longer than the visibility timeout.
    /// Handles jobs from crashed workers.
    pub async fn claim_stale(
        &self,
        queue: QueueName,
        consumer_name: &str,
        count: usize,
    ) -> QueueResult<Vec<Delivered>> {
        let mut conn = self.conn().await?;
        let mut delivered = Vec::new();

        for priority in Priority::ALL {
            let stream = self.stream_key(queue, priority);

            let reply: redis::streams::StreamAutoClaimReply = self
                .autoclaim_cmd(&stream, consumer_name, count)
                .query_async(&mut conn)
                .await?;

            for entry in &reply.claimed {
                if let Some(d) = self.parse_entry(&stream, entry).await {
                    info!("Claimed stale delivery {} on {}", d.message_id, stream);
                    delivered.push(d);
                }
            }
        }

        Ok(delivered)
    }

    /// Waiting jobs across all priority bands of a queue.
    pub async fn len(&self, queue: QueueName) -> QueueResult<u64> {
        let mut conn = self.conn().await?;
        let mut total = 0u64;
        for priority in Priority::ALL {
            let len: u64 = conn.xlen(self.stream_key(queue, priority)).await?;
            total += len;
        }
        Ok(total)
    }

    /// Dead-lettered jobs for a queue.
    pub async fn dead_letter_len(&self, queue: QueueName) -> QueueResult<u64> {
        let mut conn = self.conn().await?;
        let len: u64 = conn.xlen(self.dlq_key(queue)).await?;
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::ProcessVideoJob;
    use talenta_models::VideoId;

    #[test]
    fn test_stream_keys_namespaced() {
        let queue = JobQueue::new(QueueConfig::default()).expect("client");
        assert_eq!(
            queue.stream_key(QueueName::Process, Priority::Normal),
            "talenta:q:process:normal"
        );
        assert_eq!(queue.dlq_key(QueueName::Trending), "talenta:dlq:trending");
        assert_eq!(queue.dedup_key("process:v1"), "talenta:dedup:process:v1");
    }

    #[test]
    fn test_group_created_from_stream_start() {
        let queue = JobQueue::new(QueueConfig::default()).expect("client");
        let cmd = queue.group_create_cmd("talenta:q:process:normal");
        let packed = String::from_utf8_lossy(&cmd.get_packed_command()).into_owned();

        assert!(packed.contains("XGROUP"));
        assert!(packed.contains("MKSTREAM"));
        // starts at 0, not $: pre-existing entries belong to the group
        assert!(packed.contains("\r\n0\r\n"));
        assert!(!packed.contains("\r\n$\r\n"));
    }

    #[test]
    fn test_stale_reclaim_scans_pending_entries() {
        let queue = JobQueue::new(QueueConfig::default()).expect("client");
        let cmd = queue.autoclaim_cmd("talenta:q:process:normal", "worker-1", 5);
        let packed = String::from_utf8_lossy(&cmd.get_packed_command()).into_owned();

        assert!(packed.contains("XAUTOCLAIM"));
        assert!(packed.contains("talenta:q:process:normal"));
        assert!(packed.contains("talenta:workers"));
        // default visibility timeout in milliseconds, then the PEL scan cursor
        assert!(packed.contains("600000"));
        assert!(packed.contains("0-0"));
        assert!(packed.contains("COUNT"));
    }

    #[test]
    fn test_delayed_entry_roundtrip() {
        let job = QueueJob::Process(ProcessVideoJob::new(VideoId::from_string("v1"), "u1", "k"));
        let entry = DelayedEntry {
            stream: "talenta:q:process:normal".to_string(),
            payload: serde_json::to_string(&job).unwrap(),
            attempt: 2,
        };
        let json = serde_json::to_string(&entry).unwrap();
        let decoded: DelayedEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.attempt, 2);
        assert_eq!(decoded.stream, entry.stream);
    }
}
