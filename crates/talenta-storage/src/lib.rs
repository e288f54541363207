//! S3-compatible object store client for the Talenta pipeline.
//!
//! This crate provides:
//! - Upload/download/delete/head against per-purpose buckets
//! - Directory upload with extension-keyed content types (HLS output)
//! - Presigned GET/PUT URLs and presigned POST policies

pub mod client;
pub mod error;
pub mod presign;

pub use client::{Buckets, ObjectStore, StorageConfig};
pub use error::{StorageError, StorageResult};
pub use presign::{PostConditions, PresignedPost};
