//! Media ingestion worker.
//!
//! This crate provides:
//! - The scan/transcode/publish pipeline for uploaded videos
//! - AI analysis handlers for videos and comments
//! - The hourly trending-score recompute
//! - A per-queue job executor with severity-driven retry handling

pub mod analysis;
pub mod config;
pub mod error;
pub mod executor;
pub mod pipeline;
pub mod store;
#[cfg(test)]
mod testutil;
pub mod trending;

pub use config::{Profile, WorkerConfig};
pub use error::{Severity, WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use pipeline::{ProcessingContext, ScratchDir};
pub use store::{
    CommentRecord, CommentStore, InMemoryCommentStore, InMemoryVideoStore, InMemoryViewStore,
    LogNotifier, Notifier, VideoStore, VideoUpdate, ViewStore,
};
