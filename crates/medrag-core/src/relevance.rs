//! Relevance thresholding and confidence scoring.
//!
//! Keeps matches scoring strictly above `min_score`, truncated to the first
//! `max_results` in the order the retriever produced (no re-sorting).
//! Confidence is the mean score of the kept matches, rounded to two
//! decimals, and `0` when nothing is kept.

use serde::Serialize;
use tracing::debug;

use crate::models::Match;

/// Matches that survived filtering plus their aggregate confidence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub matches: Vec<Match>,
    pub confidence: f64,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Filter ranked matches by score and compute the answer confidence.
pub fn filter_and_score(matches: Vec<Match>, min_score: f64, max_results: usize) -> Selection {
    let candidates = matches.len();
    let selected: Vec<Match> = matches
        .into_iter()
        .filter(|m| m.score > min_score)
        .take(max_results)
        .collect();

    let confidence = if selected.is_empty() {
        0.0
    } else {
        let mean = selected.iter().map(|m| m.score).sum::<f64>() / selected.len() as f64;
        round2(mean).clamp(0.0, 1.0)
    };

    debug!(
        candidates,
        selected = selected.len(),
        min_score,
        confidence,
        "Relevance filter applied"
    );

    Selection {
        matches: selected,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VectorMetadata;

    fn scored(scores: &[f64]) -> Vec<Match> {
        scores
            .iter()
            .enumerate()
            .map(|(i, &score)| Match {
                id: format!("c{}", i),
                score,
                metadata: VectorMetadata::default(),
            })
            .collect()
    }

    #[test]
    fn test_threshold_and_mean() {
        let selection = filter_and_score(scored(&[0.9, 0.8, 0.6, 0.4]), 0.7, 5);
        let scores: Vec<f64> = selection.matches.iter().map(|m| m.score).collect();
        assert_eq!(scores, vec![0.9, 0.8]);
        assert_eq!(selection.confidence, 0.85);
    }

    #[test]
    fn test_threshold_is_strict() {
        let selection = filter_and_score(scored(&[0.7, 0.7]), 0.7, 5);
        assert!(selection.is_empty());
        assert_eq!(selection.confidence, 0.0);
    }

    #[test]
    fn test_empty_input() {
        let selection = filter_and_score(Vec::new(), 0.5, 5);
        assert!(selection.is_empty());
        assert_eq!(selection.confidence, 0.0);
    }

    #[test]
    fn test_truncates_in_ranked_order() {
        let input = scored(&[0.95, 0.94, 0.93, 0.92, 0.91, 0.9, 0.89, 0.88, 0.87, 0.86]);
        let selection = filter_and_score(input, 0.5, 2);
        let ids: Vec<&str> = selection.matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["c0", "c1"]);
        assert_eq!(selection.confidence, 0.95);
    }

    #[test]
    fn test_does_not_resort() {
        let selection = filter_and_score(scored(&[0.6, 0.9, 0.1, 0.8]), 0.5, 2);
        let ids: Vec<&str> = selection.matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["c0", "c1"]);
        assert_eq!(selection.confidence, 0.75);
    }

    #[test]
    fn test_selection_size_property() {
        let scores = [0.99, 0.2, 0.71, 0.5, 0.66, 0.8, 0.0, 1.0, 0.65, 0.3];
        for &min_score in &[0.0, 0.5, 0.65, 0.7, 0.99, 1.0] {
            for max_results in 0..12 {
                let selection = filter_and_score(scored(&scores), min_score, max_results);
                let qualifying = scores.iter().filter(|&&s| s > min_score).count();
                assert_eq!(selection.matches.len(), qualifying.min(max_results));
                assert!((0.0..=1.0).contains(&selection.confidence));
                if selection.is_empty() {
                    assert_eq!(selection.confidence, 0.0);
                } else {
                    let mean = selection.matches.iter().map(|m| m.score).sum::<f64>()
                        / selection.matches.len() as f64;
                    assert_eq!(selection.confidence, round2(mean));
                }
            }
        }
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(0.8500000000000001), 0.85);
        assert_eq!(round2(0.123), 0.12);
        assert_eq!(round2(0.0), 0.0);
    }
}
