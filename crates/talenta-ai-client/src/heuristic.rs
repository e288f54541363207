//! Keyword heuristic for comment scoring.
//!
//! Used when the scoring service is unreachable: word-list sentiment plus
//! pattern-based troll detection. Deliberately crude; the service's model
//! is the real scorer.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::CommentScores;

const POSITIVE_WORDS: &[&str] = &[
    "amazing",
    "awesome",
    "beautiful",
    "brilliant",
    "excellent",
    "fantastic",
    "great",
    "incredible",
    "love",
    "perfect",
    "talented",
    "wonderful",
    "best",
    "inspiring",
    "impressive",
    "outstanding",
    "superb",
    "fire",
    "goat",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bad",
    "boring",
    "disappointing",
    "hate",
    "horrible",
    "mediocre",
    "poor",
    "terrible",
    "trash",
    "ugly",
    "untalented",
    "weak",
    "worst",
    "cringe",
];

static TROLL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(hate|stupid|ugly|trash|garbage|worst|terrible|suck|loser|pathetic)\b",
        r"(?i)\b(kill yourself|kys|die|cancer)\b",
        r"[A-Z]{5,}",
        r"[!?]{3,}",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static pattern"))
    .collect()
});

/// Five or more of the same character in a row ("aaaaah").
fn has_repeated_run(content: &str) -> bool {
    let mut run = 0u32;
    let mut prev: Option<char> = None;
    for c in content.chars() {
        let c = c.to_ascii_lowercase();
        if Some(c) == prev {
            run += 1;
            if run >= 5 {
                return true;
            }
        } else {
            prev = Some(c);
            run = 1;
        }
    }
    false
}

/// Score a comment without the service: word-list sentiment in [-1,1],
/// 0.3 troll weight per matched pattern (clamped to 1.0), plus 0.2 for
/// short aggressive messages. Troll flag above 0.5.
pub fn score_comment(content: &str) -> CommentScores {
    let sentiment_score = sentiment(content);
    let troll_confidence = troll_confidence(content);

    CommentScores {
        sentiment_score: (sentiment_score * 1000.0).round() / 1000.0,
        is_troll: troll_confidence > 0.5,
        troll_confidence: (troll_confidence * 1000.0).round() / 1000.0,
    }
}

fn sentiment(content: &str) -> f64 {
    let lower = content.to_lowercase();
    let mut positive = 0i32;
    let mut negative = 0i32;
    for word in lower.split_whitespace() {
        let word = word.trim_matches(|c: char| !c.is_alphanumeric());
        if POSITIVE_WORDS.contains(&word) {
            positive += 1;
        } else if NEGATIVE_WORDS.contains(&word) {
            negative += 1;
        }
    }

    let total = positive + negative;
    if total == 0 {
        return 0.0;
    }
    (f64::from(positive - negative) / f64::from(total)).clamp(-1.0, 1.0)
}

fn troll_confidence(content: &str) -> f64 {
    let mut score = 0.0;
    for pattern in TROLL_PATTERNS.iter() {
        if pattern.is_match(content) {
            score += 0.3;
        }
    }
    if has_repeated_run(content) {
        score += 0.3;
    }

    // Very short aggressive messages are suspicious
    if content.len() < 20 {
        let lower = content.to_lowercase();
        if NEGATIVE_WORDS[..5].iter().any(|w| lower.contains(w)) {
            score += 0.2;
        }
    }

    f64::min(score, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_sentiment() {
        let scores = score_comment("amazing performance, love it");
        assert_eq!(scores.sentiment_score, 1.0);
        assert!(!scores.is_troll);
    }

    #[test]
    fn test_mixed_sentiment() {
        // 1 positive, 1 negative
        let scores = score_comment("great singing but boring staging");
        assert_eq!(scores.sentiment_score, 0.0);
    }

    #[test]
    fn test_three_patterns_yields_flaggable_confidence() {
        // word-list hit, excessive caps, excessive punctuation
        let scores = score_comment("you are TRASH garbage loser WORST!!!");
        assert_eq!(scores.troll_confidence, 0.9);
        assert!(scores.is_troll);
    }

    #[test]
    fn test_confidence_clamped_to_one() {
        let scores = score_comment("HATE HATE kys trash!!!! aaaaah");
        assert_eq!(scores.troll_confidence, 1.0);
    }

    #[test]
    fn test_short_aggressive_bonus() {
        // one word-list pattern (0.3) plus the short-message bonus (0.2)
        let scores = score_comment("so bad, hate it");
        assert!(scores.troll_confidence >= 0.5);
    }

    #[test]
    fn test_neutral_comment() {
        let scores = score_comment("interesting choice of song");
        assert_eq!(scores.sentiment_score, 0.0);
        assert_eq!(scores.troll_confidence, 0.0);
        assert!(!scores.is_troll);
    }
}
