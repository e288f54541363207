//! Line-protocol client for the virus scan daemon.
//!
//! The daemon speaks a single-command protocol: the client sends
//! `SCAN <path>\n` over TCP and the daemon streams a free-text verdict
//! until it closes the connection. A response containing `OK` is clean;
//! `FOUND` is infected, with the signature between the last colon and
//! the `FOUND` marker.

use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::error::{ScanError, ScanResult};

/// Default response deadline.
pub const DEFAULT_SCAN_TIMEOUT_SECS: u64 = 60;

/// What to do when the daemon is unreachable or the verdict is inconclusive.
///
/// Fail-open admits unscanned content to keep ingestion available when the
/// daemon is absent; fail-closed rejects it. The choice is deployment
/// configuration, not a hidden default inside the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanPolicy {
    /// Treat scanner-unavailable as clean
    #[default]
    FailOpen,
    /// Treat scanner-unavailable as an error
    FailClosed,
}

/// Scan verdict for a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanVerdict {
    /// No infection reported
    Clean,
    /// Infection reported with the detected signature
    Infected { signature: String },
}

impl ScanVerdict {
    pub fn is_clean(&self) -> bool {
        matches!(self, ScanVerdict::Clean)
    }
}

/// Scan daemon client configuration.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Daemon host
    pub host: String,
    /// Daemon port
    pub port: u16,
    /// Response deadline in seconds
    pub timeout_secs: u64,
    /// Unavailability policy
    pub policy: ScanPolicy,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3310,
            timeout_secs: DEFAULT_SCAN_TIMEOUT_SECS,
            policy: ScanPolicy::FailOpen,
        }
    }
}

impl ScannerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let policy = match std::env::var("SCAN_POLICY").as_deref() {
            Ok("fail_closed") => ScanPolicy::FailClosed,
            _ => ScanPolicy::FailOpen,
        };
        Self {
            host: std::env::var("SCAN_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("SCAN_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3310),
            timeout_secs: std::env::var("SCAN_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SCAN_TIMEOUT_SECS),
            policy,
        }
    }
}

/// Virus scan client.
#[derive(Debug, Clone)]
pub struct ScanClient {
    config: ScannerConfig,
}

impl ScanClient {
    /// Create a new scan client.
    pub fn new(config: ScannerConfig) -> Self {
        Self { config }
    }

    /// Create from environment variables.
    pub fn from_env() -> Self {
        Self::new(ScannerConfig::from_env())
    }

    /// Configured unavailability policy.
    pub fn policy(&self) -> ScanPolicy {
        self.config.policy
    }

    /// Scan a file by path, applying the configured unavailability policy.
    ///
    /// With `FailOpen`, connection errors, timeouts, and inconclusive
    /// responses all yield `Clean`; with `FailClosed` they are errors.
    pub async fn scan(&self, file_path: &str) -> ScanResult<ScanVerdict> {
        let start = Instant::now();

        match self.scan_inner(file_path).await {
            Ok(verdict) => {
                match &verdict {
                    ScanVerdict::Clean => {
                        info!(
                            duration_ms = start.elapsed().as_millis() as u64,
                            "Scan completed: clean"
                        );
                    }
                    ScanVerdict::Infected { signature } => {
                        warn!(
                            duration_ms = start.elapsed().as_millis() as u64,
                            signature = %signature,
                            "Scan detected infection"
                        );
                    }
                }
                Ok(verdict)
            }
            Err(e) => match self.config.policy {
                ScanPolicy::FailOpen => {
                    warn!("Scan unavailable ({}), admitting as clean (fail-open)", e);
                    Ok(ScanVerdict::Clean)
                }
                ScanPolicy::FailClosed => Err(e),
            },
        }
    }

    async fn scan_inner(&self, file_path: &str) -> ScanResult<ScanVerdict> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        debug!("Connecting to scan daemon at {}", addr);

        let deadline = Duration::from_secs(self.config.timeout_secs);
        let response = tokio::time::timeout(deadline, async {
            let mut stream = TcpStream::connect(&addr)
                .await
                .map_err(|e| ScanError::ConnectionFailed(e.to_string()))?;

            stream
                .write_all(format!("SCAN {}\n", file_path).as_bytes())
                .await?;
            stream.flush().await?;

            // The daemon streams the verdict and closes the connection.
            let mut response = String::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = stream.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                response.push_str(&String::from_utf8_lossy(&buf[..n]));
            }
            Ok::<_, ScanError>(response)
        })
        .await
        .map_err(|_| ScanError::Timeout(self.config.timeout_secs))??;

        parse_response(&response)
    }
}

/// Classify a raw daemon response.
pub fn parse_response(response: &str) -> ScanResult<ScanVerdict> {
    let trimmed = response.trim();

    if trimmed.contains("FOUND") {
        return Ok(ScanVerdict::Infected {
            signature: extract_signature(trimmed),
        });
    }
    if trimmed.contains("OK") {
        return Ok(ScanVerdict::Clean);
    }

    Err(ScanError::Inconclusive(trimmed.to_string()))
}

/// Signature text between the last colon and the `FOUND` marker.
fn extract_signature(response: &str) -> String {
    let before_found = match response.rfind("FOUND") {
        Some(idx) => &response[..idx],
        None => response,
    };
    before_found
        .rsplit(':')
        .next()
        .unwrap_or("unknown")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_response() {
        let verdict = parse_response("/tmp/videos/abc/source.mp4: OK\n").unwrap();
        assert_eq!(verdict, ScanVerdict::Clean);
    }

    #[test]
    fn test_infected_response() {
        let verdict = parse_response("/tmp/videos/abc/source.mp4: Eicar-Test-Signature FOUND\n")
            .unwrap();
        assert_eq!(
            verdict,
            ScanVerdict::Infected {
                signature: "Eicar-Test-Signature".to_string()
            }
        );
    }

    #[test]
    fn test_signature_uses_last_colon() {
        // Paths may contain colons; the signature follows the last one
        let verdict =
            parse_response("/tmp/a:b/source.mp4: Win.Test.EICAR_HDB-1 FOUND").unwrap();
        assert_eq!(
            verdict,
            ScanVerdict::Infected {
                signature: "Win.Test.EICAR_HDB-1".to_string()
            }
        );
    }

    #[test]
    fn test_inconclusive_response() {
        assert!(parse_response("UNKNOWN COMMAND").is_err());
        assert!(parse_response("").is_err());
    }

    #[tokio::test]
    async fn test_fail_open_admits_on_connection_error() {
        // Port 1 is never listening
        let client = ScanClient::new(ScannerConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            timeout_secs: 2,
            policy: ScanPolicy::FailOpen,
        });
        let verdict = client.scan("/tmp/nope.mp4").await.unwrap();
        assert!(verdict.is_clean());
    }

    #[tokio::test]
    async fn test_fail_closed_errors_on_connection_error() {
        let client = ScanClient::new(ScannerConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            timeout_secs: 2,
            policy: ScanPolicy::FailClosed,
        });
        assert!(client.scan("/tmp/nope.mp4").await.is_err());
    }
}
