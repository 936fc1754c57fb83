use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::types::{ClipSimilarities, Scores, SimilarityResult, Weights};

/// Handling of a clip that has no similarity for a weighted stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingStreamPolicy {
    /// Drop the clip from the score map.
    #[default]
    Exclude,
    /// Score the clip over the streams it does have.
    AvailableOnly,
    /// Fail the round.
    Strict,
}

impl MissingStreamPolicy {
    pub fn label(self) -> &'static str {
        match self {
            MissingStreamPolicy::Exclude => "exclude",
            MissingStreamPolicy::AvailableOnly => "available-only",
            MissingStreamPolicy::Strict => "strict",
        }
    }
}

/// Score one clip over the streams it shares with `weights`.
///
/// Returns `None` when no weighted stream is present (the denominator
/// would be zero).
pub fn score_clip(sims: &ClipSimilarities, weights: &Weights) -> Option<f64> {
    let mut ssum = 0.0;
    let mut denom = 0.0;
    for (stream, &w) in weights.iter() {
        if let Some(sim) = sims.get(stream) {
            ssum += (w * (1.0 - sim.mean)).powi(2);
            denom += w * w;
        }
    }
    if denom > 0.0 {
        Some(1.0 - (ssum / denom).sqrt())
    } else {
        None
    }
}

fn missing_stream(sims: &ClipSimilarities, weights: &Weights) -> Option<String> {
    weights
        .iter()
        .find(|(stream, w)| **w > 0.0 && !sims.contains_key(*stream))
        .map(|(stream, _)| stream.clone())
}

/// Score every clip in the similarity result.
///
/// # Errors
/// `MissingStream` under [`MissingStreamPolicy::Strict`] for the first clip
/// (in id order) lacking a positively weighted stream.
pub fn compute_scores(
    similarities: &SimilarityResult,
    weights: &Weights,
    policy: MissingStreamPolicy,
) -> EngineResult<Scores> {
    let mut scores = Scores::new();
    let mut dropped = 0usize;

    for (&clip, sims) in similarities {
        if let Some(stream) = missing_stream(sims, weights) {
            match policy {
                MissingStreamPolicy::Strict => {
                    return Err(EngineError::MissingStream { clip, stream });
                }
                MissingStreamPolicy::Exclude => {
                    dropped += 1;
                    continue;
                }
                MissingStreamPolicy::AvailableOnly => {}
            }
        }
        match score_clip(sims, weights) {
            Some(score) => {
                scores.insert(clip, score);
            }
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        debug!(dropped, policy = policy.label(), "clips left unscored for missing streams");
    }
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClipId, StreamSimilarity};
    use approx::assert_relative_eq;

    fn sims(entries: &[(ClipId, &[(&str, f64)])]) -> SimilarityResult {
        entries
            .iter()
            .map(|(clip, streams)| {
                let m = streams
                    .iter()
                    .map(|(s, v)| {
                        (
                            s.to_string(),
                            StreamSimilarity {
                                mean: *v,
                                ensemble_size: 1,
                            },
                        )
                    })
                    .collect();
                (*clip, m)
            })
            .collect()
    }

    #[test]
    fn test_two_stream_reference_value() {
        let s = sims(&[(1, &[("rgb", 0.9), ("flow", 0.8)])]);
        let w = Weights::pinned("rgb", "flow", 1.5);
        let scores = compute_scores(&s, &w, MissingStreamPolicy::Strict).unwrap();
        let expected = 1.0 - ((0.01_f64 + 0.09) / 3.25).sqrt();
        assert_relative_eq!(scores[&1], expected, epsilon = 1e-12);
        assert_relative_eq!(scores[&1], 0.8246, epsilon = 1e-4);
    }

    #[test]
    fn test_perfect_similarity_scores_one_for_any_weights() {
        let s = sims(&[(1, &[("rgb", 1.0), ("flow", 1.0)])]);
        for w in [0.1, 1.0, 2.3, 17.0] {
            let weights = Weights::pinned("rgb", "flow", w);
            let scores = compute_scores(&s, &weights, MissingStreamPolicy::Strict).unwrap();
            assert_relative_eq!(scores[&1], 1.0);
        }
    }

    #[test]
    fn test_lower_similarity_strictly_lowers_score() {
        let w = Weights::pinned("rgb", "flow", 1.5);
        let mut last = f64::INFINITY;
        for flow in [0.95, 0.9, 0.7, 0.3, -0.2] {
            let s = sims(&[(1, &[("rgb", 0.9), ("flow", flow)])]);
            let score = compute_scores(&s, &w, MissingStreamPolicy::Strict).unwrap()[&1];
            assert!(score < last, "score {} not below {}", score, last);
            last = score;
        }
    }

    #[test]
    fn test_single_stream_example() {
        let s = sims(&[(1, &[("s1", 1.0)]), (2, &[("s1", 0.0)])]);
        let w = Weights::new().with("s1", 1.0);
        let scores = compute_scores(&s, &w, MissingStreamPolicy::Strict).unwrap();
        assert_relative_eq!(scores[&1], 1.0);
        assert_relative_eq!(scores[&2], 0.0);
    }

    #[test]
    fn test_missing_stream_policies() {
        let s = sims(&[(1, &[("rgb", 0.9), ("flow", 0.8)]), (2, &[("rgb", 0.7)])]);
        let w = Weights::pinned("rgb", "flow", 1.5);

        let excluded = compute_scores(&s, &w, MissingStreamPolicy::Exclude).unwrap();
        assert!(excluded.contains_key(&1));
        assert!(!excluded.contains_key(&2));

        let available = compute_scores(&s, &w, MissingStreamPolicy::AvailableOnly).unwrap();
        assert_relative_eq!(available[&2], 0.7, epsilon = 1e-12);

        let err = compute_scores(&s, &w, MissingStreamPolicy::Strict).unwrap_err();
        assert!(matches!(err, EngineError::MissingStream { clip: 2, .. }));
    }

    #[test]
    fn test_unweighted_streams_are_ignored() {
        let s = sims(&[(1, &[("rgb", 0.5), ("audio", -1.0)])]);
        let w = Weights::new().with("rgb", 1.0);
        let scores = compute_scores(&s, &w, MissingStreamPolicy::Strict).unwrap();
        assert_relative_eq!(scores[&1], 0.5);
    }

    #[test]
    fn test_policy_parses_kebab_case() {
        #[derive(Deserialize)]
        struct Wrap {
            p: MissingStreamPolicy,
        }
        let w: Wrap = toml::from_str(r#"p = "available-only""#).unwrap();
        assert_eq!(w.p, MissingStreamPolicy::AvailableOnly);
    }
}
