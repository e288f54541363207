//! Per-video mutual exclusion.
//!
//! At most one `process` job may run for a video at a time. The claim is a
//! conditional key with a TTL so a crashed worker cannot hold a video
//! forever; release checks the holder token so an expired claim re-acquired
//! by another worker is never deleted by the first.

use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{QueueError, QueueResult};
use talenta_models::VideoId;

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Configuration for video claims.
#[derive(Debug, Clone)]
pub struct ClaimConfig {
    /// Key namespace prefix
    pub namespace: String,
    /// Claim lifetime; must exceed the longest expected job run
    pub ttl: Duration,
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            namespace: "talenta".to_string(),
            ttl: Duration::from_secs(1800),
        }
    }
}

/// Claim store over Redis.
pub struct VideoClaims {
    client: redis::Client,
    config: ClaimConfig,
}

/// A held claim. Release is explicit; the TTL is the crash backstop.
#[derive(Debug, Clone)]
pub struct VideoClaim {
    key: String,
    token: String,
}

impl VideoClaims {
    pub fn new(redis_url: &str, config: ClaimConfig) -> QueueResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client, config })
    }

    fn claim_key(&self, video_id: &VideoId) -> String {
        format!("{}:claim:video:{}", self.config.namespace, video_id)
    }

    /// Acquire the claim for a video, failing fast if already held.
    pub async fn acquire(&self, video_id: &VideoId) -> QueueResult<VideoClaim> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let key = self.claim_key(video_id);
        let token = Uuid::new_v4().to_string();

        let claimed: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(&token)
            .arg("NX")
            .arg("EX")
            .arg(self.config.ttl.as_secs())
            .query_async(&mut conn)
            .await?;

        if claimed.is_none() {
            return Err(QueueError::ClaimHeld(video_id.to_string()));
        }

        debug!("Claimed video {}", video_id);
        Ok(VideoClaim { key, token })
    }

    /// Release a held claim. A claim that expired and was re-acquired
    /// elsewhere is left untouched.
    pub async fn release(&self, claim: VideoClaim) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let deleted: i64 = redis::Script::new(RELEASE_SCRIPT)
            .key(&claim.key)
            .arg(&claim.token)
            .invoke_async(&mut conn)
            .await?;

        if deleted == 0 {
            warn!("Claim {} expired before release", claim.key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_key_shape() {
        let claims =
            VideoClaims::new("redis://localhost:6379", ClaimConfig::default()).expect("client");
        let key = claims.claim_key(&VideoId::from_string("vid_9"));
        assert_eq!(key, "talenta:claim:video:vid_9");
    }
}
