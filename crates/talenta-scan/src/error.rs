//! Scan error types.

use thiserror::Error;

pub type ScanResult<T> = Result<T, ScanError>;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Connection to scan daemon failed: {0}")]
    ConnectionFailed(String),

    #[error("Scan timed out after {0} seconds")]
    Timeout(u64),

    #[error("Inconclusive scanner response: {0}")]
    Inconclusive(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
