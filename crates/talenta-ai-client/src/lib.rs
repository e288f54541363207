//! Client for the external AI scoring service.
//!
//! Exposes the `Scorer` strategy trait with two implementations: an HTTP
//! client for the real service and a synthetic scorer for development
//! profiles where the service is unavailable.

pub mod error;
pub mod heuristic;
pub mod scorer;
pub mod types;

pub use error::{AiError, AiResult};
pub use scorer::{
    FallbackScorer, HttpScorer, Scorer, SyntheticScorer, COMMENT_SCORE_TIMEOUT,
    VIDEO_SCORE_TIMEOUT,
};
pub use types::{CommentScoreRequest, CommentScores, VideoScoreRequest, VideoScoreResponse};
