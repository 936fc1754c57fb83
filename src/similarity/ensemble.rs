use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::types::{
    CandidateIndex, ClipId, SimilarityResult, SplitIndex, StreamSimilarity, StreamSplitMap,
};

/// Per-split similarity scalars for one stream, keyed by clip.
///
/// Transient: filled split by split, then collapsed by [`average`](Self::average).
#[derive(Debug, Default)]
pub struct SimilarityAccumulator {
    values: BTreeMap<ClipId, Vec<f64>>,
}

impl SimilarityAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, clip: ClipId, similarity: f64) {
        self.values.entry(clip).or_default().push(similarity);
    }

    /// Arithmetic mean per clip with the number of contributing splits.
    ///
    /// Clips never pushed are absent, not zero.
    pub fn average(self) -> BTreeMap<ClipId, StreamSimilarity> {
        self.values
            .into_iter()
            .filter(|(_, sims)| !sims.is_empty())
            .map(|(clip, sims)| {
                let n = sims.len();
                let mean = sims.iter().sum::<f64>() / n as f64;
                (clip, StreamSimilarity { mean, ensemble_size: n })
            })
            .collect()
    }
}

/// Plain dot product. Lengths must match.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn checked_dot(
    target: &[f64],
    candidate: &[f64],
    stream: &str,
    split: SplitIndex,
) -> EngineResult<f64> {
    if target.len() != candidate.len() {
        return Err(EngineError::DimensionMismatch {
            stream: stream.to_string(),
            split,
            expected: target.len(),
            actual: candidate.len(),
        });
    }
    Ok(dot(target, candidate))
}

/// Compute ensemble-averaged similarities of every candidate to the target.
///
/// Result shape: clip -> stream -> (mean similarity, ensemble size). A
/// candidate missing a split simply contributes nothing for it; a candidate
/// with no contributing split under a stream has no entry for that stream.
///
/// # Errors
/// `DimensionMismatch` when a candidate vector's length differs from the
/// target vector of the same (stream, split).
pub fn compute_similarities(
    target: &StreamSplitMap,
    candidates: &CandidateIndex,
) -> EngineResult<SimilarityResult> {
    let mut result: SimilarityResult = BTreeMap::new();

    for (stream, splits) in target {
        let Some(stream_candidates) = candidates.get(stream) else {
            debug!(stream = %stream, "no candidate features for stream");
            continue;
        };

        let mut accumulator = SimilarityAccumulator::new();
        for (&split, target_vector) in splits {
            let Some(split_candidates) = stream_candidates.get(&split) else {
                continue;
            };
            for (&clip, candidate_vector) in split_candidates {
                let similarity = checked_dot(target_vector, candidate_vector, stream, split)?;
                accumulator.push(clip, similarity);
            }
        }

        let averaged = accumulator.average();
        debug!(stream = %stream, clips = averaged.len(), "ensemble-averaged similarities");
        for (clip, sim) in averaged {
            result.entry(clip).or_default().insert(stream.clone(), sim);
        }
    }

    Ok(result)
}
