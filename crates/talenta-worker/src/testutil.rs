//! Shared fixtures for handler tests.
//!
//! Every component here constructs without touching the network, so
//! handlers run against the in-memory stores. Anything that would reach
//! Redis or the object store fails fast inside the handler under test.

use std::sync::Arc;

use talenta_ai_client::{Scorer, SyntheticScorer};
use talenta_queue::{ClaimConfig, JobQueue, QueueConfig, VideoClaims};
use talenta_scan::{ScanClient, ScannerConfig};
use talenta_storage::{Buckets, ObjectStore, StorageConfig};

use crate::config::WorkerConfig;
use crate::pipeline::ProcessingContext;
use crate::store::{InMemoryCommentStore, InMemoryVideoStore, InMemoryViewStore, LogNotifier};

pub(crate) async fn test_context() -> (
    ProcessingContext,
    Arc<InMemoryVideoStore>,
    Arc<InMemoryCommentStore>,
) {
    test_context_with(Arc::new(SyntheticScorer)).await
}

pub(crate) async fn test_context_with(
    scorer: Arc<dyn Scorer>,
) -> (
    ProcessingContext,
    Arc<InMemoryVideoStore>,
    Arc<InMemoryCommentStore>,
) {
    let storage = ObjectStore::new(StorageConfig {
        endpoint_url: "http://localhost:9000".to_string(),
        access_key_id: "test".to_string(),
        secret_access_key: "test".to_string(),
        region: "us-east-1".to_string(),
        buckets: Buckets {
            videos: "videos".to_string(),
            thumbnails: "thumbnails".to_string(),
            profiles: "profiles".to_string(),
        },
    })
    .await
    .expect("offline client construction");

    let videos = Arc::new(InMemoryVideoStore::new());
    let comments = Arc::new(InMemoryCommentStore::new());
    let (_, cancel_rx) = tokio::sync::watch::channel(false);

    let ctx = ProcessingContext {
        config: WorkerConfig::default(),
        storage,
        scanner: ScanClient::new(ScannerConfig::default()),
        queue: Arc::new(JobQueue::new(QueueConfig::default()).unwrap()),
        claims: VideoClaims::new("redis://localhost:6379", ClaimConfig::default()).unwrap(),
        scorer,
        videos: videos.clone(),
        views: Arc::new(InMemoryViewStore::new()),
        comments: comments.clone(),
        notifier: Arc::new(LogNotifier),
        cancel_rx,
    };
    (ctx, videos, comments)
}
