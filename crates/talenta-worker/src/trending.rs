//! Trending and engagement score recompute.
//!
//! Runs hourly over every ready, public video. Idempotent: the only side
//! effect is the final score write, so a crash mid-run leaves stale scores
//! until the next occurrence.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use talenta_models::{VideoRecord, VideoViewStats};

use crate::error::WorkerResult;
use crate::pipeline::ProcessingContext;
use crate::store::VideoUpdate;

/// Score used for videos with no AI performance score yet.
const NEUTRAL_AI_SCORE: f64 = 50.0;

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Trending score for one video at `now`.
///
/// Log-scaled engagement counts, a velocity boost from 24h/7d view
/// windows, and an exponential recency decay with a 30-day constant.
pub fn trending_score(record: &VideoRecord, stats: &VideoViewStats, now: DateTime<Utc>) -> f64 {
    let views = stats.views as f64;
    let likes = stats.likes as f64;
    let comments = stats.comments as f64;

    let ai_score = record
        .ai_scores
        .as_ref()
        .map(|s| s.performance)
        .unwrap_or(NEUTRAL_AI_SCORE);

    let base_score = 2.0 * (views + 1.0).log10()
        + 3.0 * (likes + 1.0).log10()
        + 2.0 * (comments + 1.0).log10()
        + 0.1 * ai_score;

    let daily_velocity = stats.views_24h as f64;
    let weekly_velocity = stats.views_7d as f64 / 7.0;
    let velocity_boost = 0.5 * (2.0 * daily_velocity + weekly_velocity);

    let age_days = (now - record.created_at).num_seconds().max(0) as f64 / 86_400.0;
    let decay_factor = (-age_days / 30.0).exp();

    round2((base_score + velocity_boost) * (1.0 + decay_factor))
}

/// Engagement ratio in percent; 0 for unviewed videos.
pub fn engagement_score(stats: &VideoViewStats) -> f64 {
    if stats.views == 0 {
        return 0.0;
    }
    round2(100.0 * (stats.likes as f64 + 2.0 * stats.comments as f64) / stats.views as f64)
}

/// Handle a `trending` job: recompute scores for every live video.
pub async fn recompute_all(ctx: &ProcessingContext) -> WorkerResult<()> {
    let now = Utc::now();
    let live = ctx.videos.list_live().await?;
    info!("Recomputing trending scores for {} videos", live.len());

    let mut updated = 0usize;
    for record in &live {
        let stats = match ctx.views.stats(&record.id).await {
            Ok(stats) => stats,
            Err(e) => {
                warn!("No view stats for {}: {}", record.id, e);
                continue;
            }
        };

        let update = VideoUpdate {
            trending_score: Some(trending_score(record, &stats, now)),
            engagement_score: Some(engagement_score(&stats)),
            ..Default::default()
        };
        if let Err(e) = ctx.videos.update(&record.id, update).await {
            warn!("Failed to write scores for {}: {}", record.id, e);
            continue;
        }
        updated += 1;
    }

    info!("Trending recompute complete: {}/{} updated", updated, live.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use talenta_models::{AiScores, VideoId};

    fn record_created_at(at: DateTime<Utc>) -> VideoRecord {
        let mut record = VideoRecord::new(VideoId::from_string("v1"), "u1", "k");
        record.created_at = at;
        record
    }

    #[test]
    fn test_fresh_video_with_no_engagement() {
        // base = 0.1 * 50 = 5, boost = 0, decay ~ 1 -> (5 + 0) * 2 = 10
        let now = Utc::now();
        let record = record_created_at(now);
        let stats = VideoViewStats::default();
        assert_eq!(trending_score(&record, &stats, now), 10.0);
        assert_eq!(engagement_score(&stats), 0.0);
    }

    #[test]
    fn test_ai_score_replaces_neutral_default() {
        let now = Utc::now();
        let mut record = record_created_at(now);
        record.ai_scores = Some(AiScores {
            performance: 90.0,
            ..Default::default()
        });
        let stats = VideoViewStats::default();
        // base = 0.1 * 90 = 9 -> 18
        assert_eq!(trending_score(&record, &stats, now), 18.0);
    }

    #[test]
    fn test_velocity_boost() {
        let now = Utc::now();
        let record = record_created_at(now);
        let stats = VideoViewStats {
            views: 0,
            views_24h: 10,
            views_7d: 70,
            likes: 0,
            comments: 0,
        };
        // boost = 0.5 * (2*10 + 70/7) = 15; (5 + 15) * 2 = 40
        assert_eq!(trending_score(&record, &stats, now), 40.0);
    }

    #[test]
    fn test_decay_favours_newer_content() {
        let now = Utc::now();
        let fresh = record_created_at(now);
        let old = record_created_at(now - chrono::Duration::days(60));
        let stats = VideoViewStats {
            views: 1000,
            likes: 100,
            comments: 10,
            ..Default::default()
        };
        assert!(trending_score(&fresh, &stats, now) > trending_score(&old, &stats, now));
    }

    #[test]
    fn test_recompute_is_pure() {
        let now = Utc::now();
        let record = record_created_at(now - chrono::Duration::days(3));
        let stats = VideoViewStats {
            views: 500,
            views_24h: 40,
            views_7d: 200,
            likes: 60,
            comments: 12,
        };
        let a = trending_score(&record, &stats, now);
        let b = trending_score(&record, &stats, now);
        assert_eq!(a, b);
    }

    #[test]
    fn test_engagement_formula() {
        let stats = VideoViewStats {
            views: 200,
            likes: 30,
            comments: 10,
            ..Default::default()
        };
        // 100 * (30 + 20) / 200 = 25
        assert_eq!(engagement_score(&stats), 25.0);
    }
}
