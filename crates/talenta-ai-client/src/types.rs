//! Wire types for the scoring service.
//!
//! The service speaks camelCase JSON; field names here mirror its API.

use serde::{Deserialize, Serialize};
use talenta_models::AiScores;

/// Request body for `POST /analyze/video`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoScoreRequest {
    pub video_id: String,
    /// Playable URL or storage key the service can fetch
    pub video_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
}

/// Response body for `POST /analyze/video`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoScoreResponse {
    pub performance_score: f64,
    pub vocal_score: Option<f64>,
    pub expression_score: Option<f64>,
    pub movement_score: Option<f64>,
    pub timing_score: Option<f64>,
    pub quality_score: f64,
    #[serde(default)]
    pub category_tags: Vec<String>,
}

impl VideoScoreResponse {
    /// Convert into normalized model scores (clamped, one decimal place).
    pub fn into_scores(self) -> AiScores {
        AiScores {
            performance: self.performance_score,
            vocal: self.vocal_score,
            expression: self.expression_score.unwrap_or(self.performance_score),
            movement: self.movement_score,
            timing: self.timing_score.unwrap_or(self.performance_score),
            quality: self.quality_score,
            category_tags: self.category_tags,
        }
        .normalized()
    }
}

/// Request body for `POST /analyze/comment`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentScoreRequest {
    pub comment_id: String,
    pub content: String,
}

/// Sentiment and troll-likelihood for one comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentScores {
    /// -1 (negative) to 1 (positive)
    pub sentiment_score: f64,
    pub is_troll: bool,
    /// 0 to 1
    pub troll_confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_response_camel_case() {
        let json = r#"{
            "performanceScore": 87.3,
            "vocalScore": null,
            "expressionScore": 82.0,
            "movementScore": 91.5,
            "timingScore": 85.0,
            "qualityScore": 104.2,
            "categoryTags": ["dancer"]
        }"#;
        let resp: VideoScoreResponse = serde_json::from_str(json).unwrap();
        let scores = resp.into_scores();
        assert_eq!(scores.performance, 87.3);
        assert_eq!(scores.vocal, None);
        // normalized clamps into [0,100]
        assert_eq!(scores.quality, 100.0);
        assert_eq!(scores.category_tags, vec!["dancer".to_string()]);
    }

    #[test]
    fn test_comment_scores_roundtrip() {
        let scores = CommentScores {
            sentiment_score: -0.5,
            is_troll: true,
            troll_confidence: 0.9,
        };
        let json = serde_json::to_string(&scores).unwrap();
        assert!(json.contains("\"trollConfidence\":0.9"));
        let back: CommentScores = serde_json::from_str(&json).unwrap();
        assert_eq!(back, scores);
    }
}
