//! Shared data models for the Talenta backend.
//!
//! This crate provides Serde-serializable types for:
//! - Video records, statuses, and AI scores
//! - Job identifiers
//! - Encoding configuration and the HLS rendition ladder
//! - View statistics consumed by the trending calculator

pub mod encoding;
pub mod job;
pub mod video;

// Re-export common types
pub use encoding::{content_type_for, EncodingConfig, HlsRendition, ADAPTIVE_LADDER};
pub use job::JobId;
pub use video::{
    AiAnalysisStatus, AiScores, ModerationStatus, VideoId, VideoRecord, VideoStatus,
    VideoViewStats,
};
