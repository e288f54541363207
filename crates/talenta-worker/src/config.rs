//! Worker configuration.

use std::time::Duration;

use talenta_media::LadderPolicy;

/// Execution profile. Chosen once at startup; selects the transcode ladder
/// and the scoring strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Profile {
    #[default]
    Development,
    Production,
}

impl Profile {
    /// Read from `EXECUTION_PROFILE` ("development" unless "production").
    pub fn from_env() -> Self {
        match std::env::var("EXECUTION_PROFILE") {
            Ok(v) if v.eq_ignore_ascii_case("production") => Profile::Production,
            _ => Profile::Development,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Development => "development",
            Profile::Production => "production",
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Execution profile
    pub profile: Profile,
    /// Scratch directory root; each job gets `{work_dir}/{video_id}`
    pub work_dir: String,
    /// Deadline for a single transcode invocation
    pub transcode_timeout: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// How often to scan for deliveries abandoned by crashed workers
    pub claim_interval: Duration,
    /// How often to move due delayed retries back onto their streams
    pub pump_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            profile: Profile::Development,
            work_dir: "/tmp/videos".to_string(),
            transcode_timeout: Duration::from_secs(1800),
            shutdown_timeout: Duration::from_secs(30),
            claim_interval: Duration::from_secs(30),
            pump_interval: Duration::from_secs(1),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            profile: Profile::from_env(),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .unwrap_or_else(|_| "/tmp/videos".to_string()),
            transcode_timeout: Duration::from_secs(
                std::env::var("WORKER_TRANSCODE_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1800),
            ),
            shutdown_timeout: Duration::from_secs(
                std::env::var("WORKER_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            claim_interval: Duration::from_secs(
                std::env::var("WORKER_CLAIM_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            pump_interval: Duration::from_secs(
                std::env::var("WORKER_PUMP_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1),
            ),
        }
    }

    /// Transcode ladder for this profile.
    pub fn ladder_policy(&self) -> LadderPolicy {
        LadderPolicy::for_profile(self.profile.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ladder_follows_profile() {
        let mut config = WorkerConfig::default();
        assert_eq!(config.ladder_policy(), LadderPolicy::Single);
        config.profile = Profile::Production;
        assert_eq!(config.ladder_policy(), LadderPolicy::Adaptive);
    }
}
