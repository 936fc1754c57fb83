use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use rand::seq::index;
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::types::{ClipId, Feedback, MatchSelection, Scores, SelectionKind};

/// Lowest score still counted as a near miss.
///
/// `threshold - near_miss * (1 - threshold)`, which is the same number as
/// the `1 - (1 + near_miss)(1 - threshold)` form.
pub fn lower_limit(threshold: f64, near_miss: f64) -> f64 {
    threshold - near_miss * (1.0 - threshold)
}

/// Near-miss fraction for a finalize round.
///
/// Chosen so the near-miss range reaches down to the lowest-scoring clip the
/// user confirmed. Zero when no confirmed clip was scored.
pub fn finalize_near_miss(
    threshold: f64,
    scores: &Scores,
    feedback: &BTreeMap<ClipId, Feedback>,
    epsilon: f64,
) -> f64 {
    let lowest = feedback
        .iter()
        .filter(|(_, fb)| **fb == Feedback::Confirmed)
        .filter_map(|(clip, _)| scores.get(clip).copied())
        .fold(None, |acc: Option<f64>, s| Some(acc.map_or(s, |a| a.min(s))));

    match lowest {
        Some(low) => (threshold - low).max(0.0) / (1.0 - threshold).max(epsilon),
        None => 0.0,
    }
}

/// How many clips a selection may sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// Review round: at most `budget` sampled clips, half for matches.
    Review { budget: usize },
    /// Final report: every match and near miss, no sampling.
    Finalize,
}

/// Partitions scored clips and picks the set to surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchSelector {
    pub threshold: f64,
    pub near_miss: f64,
    pub mode: SelectionMode,
}

impl MatchSelector {
    pub fn review(threshold: f64, near_miss: f64, budget: usize) -> Self {
        Self {
            threshold,
            near_miss,
            mode: SelectionMode::Review { budget },
        }
    }

    pub fn finalize(threshold: f64, near_miss: f64) -> Self {
        Self {
            threshold,
            near_miss,
            mode: SelectionMode::Finalize,
        }
    }

    pub fn lower_limit(&self) -> f64 {
        lower_limit(self.threshold, self.near_miss)
    }

    /// Match quota and near-miss quota for the given partition sizes.
    ///
    /// Half the budget goes to matches; slots one partition cannot fill pass
    /// to the other.
    pub fn quotas(&self, matches: usize, near_misses: usize) -> (usize, usize) {
        match self.mode {
            SelectionMode::Finalize => (matches, near_misses),
            SelectionMode::Review { budget } => {
                let m = (budget / 2).min(matches);
                let n = (budget - m).min(near_misses);
                let m = (budget - n).min(matches);
                (m, n)
            }
        }
    }

    /// Select clips from `scores`.
    ///
    /// Every id in `forced` that has a score is added after sampling, even
    /// past the budget. Sampling walks candidates in id order, so a seeded
    /// `rng` reproduces the selection.
    ///
    /// # Errors
    /// `NoMatches` when nothing ends up selected.
    pub fn select<R: Rng + ?Sized>(
        &self,
        scores: &Scores,
        forced: &BTreeSet<ClipId>,
        round: u32,
        rng: &mut R,
    ) -> EngineResult<MatchSelection> {
        let lower = self.lower_limit();
        let matches: Vec<(ClipId, f64)> = scores
            .iter()
            .filter(|(_, s)| **s >= self.threshold)
            .map(|(c, s)| (*c, *s))
            .collect();
        let mut near: Vec<(ClipId, f64)> = scores
            .iter()
            .filter(|(_, s)| **s >= lower && **s < self.threshold)
            .map(|(c, s)| (*c, *s))
            .collect();

        let (match_quota, near_quota) = self.quotas(matches.len(), near.len());
        let mut selection = MatchSelection::default();

        for (clip, score) in sample(&matches, match_quota, rng) {
            selection.insert(clip, score, SelectionKind::Match);
        }

        if near_quota > 0 {
            // The closest call is always surfaced; ties go to the lower id.
            let top = near
                .iter()
                .enumerate()
                .fold(0, |best, (i, (_, s))| if *s > near[best].1 { i } else { best });
            let (clip, score) = near.remove(top);
            selection.insert(clip, score, SelectionKind::NearMiss);
            for (clip, score) in sample(&near, near_quota - 1, rng) {
                selection.insert(clip, score, SelectionKind::NearMiss);
            }
        }

        let mut forced_count = 0;
        for clip in forced {
            if selection.contains(*clip) {
                continue;
            }
            if let Some(&score) = scores.get(clip) {
                selection.insert(*clip, score, SelectionKind::Forced);
                forced_count += 1;
            }
        }

        debug!(
            round,
            lower_limit = lower,
            matches = selection.count(SelectionKind::Match),
            near_misses = selection.count(SelectionKind::NearMiss),
            forced = forced_count,
            "selected clips"
        );

        if selection.is_empty() {
            return Err(EngineError::NoMatches { round });
        }
        Ok(selection)
    }
}

/// Uniform sample of `amount` items without replacement.
fn sample<R: Rng + ?Sized>(items: &[(ClipId, f64)], amount: usize, rng: &mut R) -> Vec<(ClipId, f64)> {
    if amount >= items.len() {
        return items.to_vec();
    }
    index::sample(rng, items.len(), amount)
        .into_iter()
        .map(|i| items[i])
        .collect()
}
