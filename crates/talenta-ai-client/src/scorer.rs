//! Scoring strategies.
//!
//! `Scorer` is the seam the analysis worker is built against. `HttpScorer`
//! talks to the real scoring service; `SyntheticScorer` fabricates plausible
//! results for development, where the service is usually absent.

use std::time::Duration;

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use rand::Rng;
use tracing::{debug, info};

use talenta_models::AiScores;

use crate::error::{AiError, AiResult};
use crate::heuristic;
use crate::types::{CommentScoreRequest, CommentScores, VideoScoreRequest, VideoScoreResponse};

/// Deadline for a full video scoring call.
pub const VIDEO_SCORE_TIMEOUT: Duration = Duration::from_secs(300);
/// Deadline for a comment scoring call.
pub const COMMENT_SCORE_TIMEOUT: Duration = Duration::from_secs(30);

const CATEGORY_TAGS: &[&str] = &[
    "singer",
    "actor",
    "dancer",
    "comedian",
    "voice-over",
    "musician",
];

/// Strategy for scoring videos and comments.
#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score_video(&self, request: VideoScoreRequest) -> AiResult<AiScores>;

    async fn score_comment(&self, comment_id: &str, content: &str) -> AiResult<CommentScores>;
}

/// Client for the external scoring service.
pub struct HttpScorer {
    client: reqwest::Client,
    base_url: String,
}

impl HttpScorer {
    pub fn new(base_url: impl Into<String>) -> AiResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(VIDEO_SCORE_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Create from `AI_SERVICE_URL`.
    pub fn from_env() -> AiResult<Self> {
        let base_url =
            std::env::var("AI_SERVICE_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());
        Self::new(base_url)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &impl serde::Serialize,
        timeout: Duration,
    ) -> AiResult<T> {
        let response = self
            .client
            .post(self.url(path))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AiError::Timeout(timeout.as_secs())
                } else {
                    AiError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Status { status, body });
        }

        Ok(response.json::<T>().await?)
    }

    /// Check the service's health endpoint.
    pub async fn health_check(&self) -> AiResult<()> {
        let response = self.client.get(self.url("/health")).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Status { status, body });
        }
        Ok(())
    }
}

#[async_trait]
impl Scorer for HttpScorer {
    async fn score_video(&self, request: VideoScoreRequest) -> AiResult<AiScores> {
        debug!("Scoring video {} via service", request.video_id);
        let response: VideoScoreResponse = self
            .post_json("/analyze/video", &request, VIDEO_SCORE_TIMEOUT)
            .await?;
        Ok(response.into_scores())
    }

    async fn score_comment(&self, comment_id: &str, content: &str) -> AiResult<CommentScores> {
        let request = CommentScoreRequest {
            comment_id: comment_id.to_string(),
            content: content.to_string(),
        };
        self.post_json("/analyze/comment", &request, COMMENT_SCORE_TIMEOUT)
            .await
    }
}

/// Development scorer: plausible random video scores, keyword heuristic
/// for comments. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticScorer;

#[async_trait]
impl Scorer for SyntheticScorer {
    async fn score_video(&self, request: VideoScoreRequest) -> AiResult<AiScores> {
        let mut rng = rand::rng();

        let performance = rng.random_range(70.0..=100.0);
        let has_vocal = rng.random_bool(0.7);
        let vocal = has_vocal.then(|| rng.random_range(70.0..=100.0));
        let expression = rng.random_range(70.0..=100.0);
        let has_movement = rng.random_bool(0.6);
        let movement = has_movement.then(|| rng.random_range(70.0..=100.0));
        let timing = rng.random_range(70.0..=100.0);
        let quality = rng.random_range(70.0..=100.0);
        let count = rng.random_range(1..=3);
        let category_tags = CATEGORY_TAGS
            .choose_multiple(&mut rng, count)
            .map(|t| t.to_string())
            .collect();

        let scores = AiScores {
            performance,
            vocal,
            expression,
            movement,
            timing,
            quality,
            category_tags,
        }
        .normalized();

        info!(
            "Synthesized scores for video {}: performance {}",
            request.video_id, scores.performance
        );
        Ok(scores)
    }

    async fn score_comment(&self, _comment_id: &str, content: &str) -> AiResult<CommentScores> {
        Ok(heuristic::score_comment(content))
    }
}

/// Development strategy: try the real service, mask failures with
/// synthetic results so the pipeline stays unblocked when the service is
/// absent.
pub struct FallbackScorer {
    primary: HttpScorer,
    fallback: SyntheticScorer,
}

impl FallbackScorer {
    pub fn new(primary: HttpScorer) -> Self {
        Self {
            primary,
            fallback: SyntheticScorer,
        }
    }
}

#[async_trait]
impl Scorer for FallbackScorer {
    async fn score_video(&self, request: VideoScoreRequest) -> AiResult<AiScores> {
        match self.primary.score_video(request.clone()).await {
            Ok(scores) => Ok(scores),
            Err(e) => {
                info!("Scoring service unavailable ({}), synthesizing scores", e);
                self.fallback.score_video(request).await
            }
        }
    }

    async fn score_comment(&self, comment_id: &str, content: &str) -> AiResult<CommentScores> {
        match self.primary.score_comment(comment_id, content).await {
            Ok(scores) => Ok(scores),
            Err(e) => {
                info!("Comment scoring unavailable ({}), using heuristic", e);
                self.fallback.score_comment(comment_id, content).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_http_scorer_video() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze/video"))
            .and(body_partial_json(json!({"videoId": "vid_1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "performanceScore": 88.25,
                "vocalScore": 79.0,
                "expressionScore": 84.0,
                "movementScore": null,
                "timingScore": 86.0,
                "qualityScore": 90.0,
                "categoryTags": ["singer", "musician"]
            })))
            .mount(&server)
            .await;

        let scorer = HttpScorer::new(server.uri()).unwrap();
        let scores = scorer
            .score_video(VideoScoreRequest {
                video_id: "vid_1".to_string(),
                video_url: "videos/vid_1/original.mp4".to_string(),
                duration: Some(40),
                category_id: None,
            })
            .await
            .unwrap();

        // rounded to one decimal place
        assert_eq!(scores.performance, 88.3);
        assert_eq!(scores.vocal, Some(79.0));
        assert_eq!(scores.movement, None);
        assert_eq!(scores.category_tags.len(), 2);
    }

    #[tokio::test]
    async fn test_http_scorer_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze/comment"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
            .mount(&server)
            .await;

        let scorer = HttpScorer::new(server.uri()).unwrap();
        let err = scorer.score_comment("c1", "nice video").await.unwrap_err();
        assert!(matches!(err, AiError::Status { .. }));
    }

    #[tokio::test]
    async fn test_synthetic_video_scores_in_range() {
        let scorer = SyntheticScorer;
        let scores = scorer
            .score_video(VideoScoreRequest {
                video_id: "vid_dev".to_string(),
                video_url: "videos/vid_dev/original.mp4".to_string(),
                duration: None,
                category_id: None,
            })
            .await
            .unwrap();

        assert!((70.0..=100.0).contains(&scores.performance));
        assert!((70.0..=100.0).contains(&scores.expression));
        assert!((70.0..=100.0).contains(&scores.timing));
        assert!((70.0..=100.0).contains(&scores.quality));
        assert!(!scores.category_tags.is_empty());
        assert!(scores.category_tags.len() <= 3);
    }

    #[tokio::test]
    async fn test_fallback_masks_service_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze/video"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let scorer = FallbackScorer::new(HttpScorer::new(server.uri()).unwrap());
        let scores = scorer
            .score_video(VideoScoreRequest {
                video_id: "vid_1".to_string(),
                video_url: "videos/vid_1/original.mp4".to_string(),
                duration: None,
                category_id: None,
            })
            .await
            .unwrap();
        assert!((70.0..=100.0).contains(&scores.performance));
    }

    #[tokio::test]
    async fn test_synthetic_comment_uses_heuristic() {
        let scorer = SyntheticScorer;
        let scores = scorer
            .score_comment("c1", "you are TRASH garbage loser WORST!!!")
            .await
            .unwrap();
        assert!(scores.is_troll);
        assert_eq!(scores.troll_confidence, 0.9);
    }
}
