//! Virus scan daemon client.

pub mod client;
pub mod error;

pub use client::{
    parse_response, ScanClient, ScanPolicy, ScanVerdict, ScannerConfig,
    DEFAULT_SCAN_TIMEOUT_SECS,
};
pub use error::{ScanError, ScanResult};
