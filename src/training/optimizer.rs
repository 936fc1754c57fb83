//! Weight and threshold tuning against user feedback.
//!
//! The reference stream's weight is pinned at 1.0 and the single free
//! weight is searched jointly with the threshold over a fixed grid. Each
//! cell's loss is
//!
//! ```text
//! sum_c (H(s_c - th) - f_c) (s_c - th) (1 + f_c * ballast) / |feedback|
//! ```
//!
//! with `H(0) = 1`. Correct calls cost nothing; a wrong call costs its
//! distance from the threshold, and with `ballast > 0` a missed true match
//! costs more than a false alarm. The grid optimum is then polished with
//! [`fit_separable_quadratic`] unless it sits on the grid edge.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use super::gridsearch::{GridCell, LossSurface};
use super::quadratic::{Stencil, fit_separable_quadratic};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::scoring::compute_scores;
use crate::types::{ClipId, Feedback, Scores, SimilarityResult, Weights};

/// Output of one optimization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizedParameters {
    /// `{reference: 1.0, other: w0}`.
    pub weights: Weights,
    /// Refined (or grid) threshold minus the round-off epsilon.
    pub threshold: f64,
    /// Best grid cell.
    pub grid_optimum: GridCell,
    /// Whether the quadratic vertex replaced the grid optimum.
    pub refined: bool,
    /// Full loss surface.
    pub surface: LossSurface,
}

/// Asymmetric classification loss of `scores` at `threshold`, averaged over
/// the feedback set. Clips with feedback but no score contribute nothing.
pub fn asymmetric_loss(
    scores: &Scores,
    feedback: &BTreeMap<ClipId, Feedback>,
    threshold: f64,
    ballast: f64,
) -> f64 {
    if feedback.is_empty() {
        return 0.0;
    }
    let total: f64 = feedback
        .iter()
        .filter_map(|(clip, fb)| scores.get(clip).map(|s| (*s, fb.indicator())))
        .map(|(score, f)| {
            let margin = score - threshold;
            let predicted = if margin >= 0.0 { 1.0 } else { 0.0 };
            (predicted - f) * margin * (1.0 + f * ballast)
        })
        .sum();
    total / feedback.len() as f64
}

/// Grid search plus quadratic refinement over (weight, threshold).
pub struct HyperparameterOptimizer<'a> {
    config: &'a EngineConfig,
}

impl<'a> HyperparameterOptimizer<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    fn streams(&self) -> EngineResult<(&'a str, &'a str)> {
        match self.config.streams.as_slice() {
            [reference, other] => Ok((reference.as_str(), other.as_str())),
            streams => Err(EngineError::UnsupportedStreamCount(streams.len())),
        }
    }

    /// Loss at every grid cell. Weight rows are evaluated in parallel and
    /// reassembled in grid order.
    pub fn loss_surface(
        &self,
        similarities: &SimilarityResult,
        feedback: &BTreeMap<ClipId, Feedback>,
    ) -> EngineResult<LossSurface> {
        let (reference, other) = self.streams()?;
        let weights = self.config.grid.weight.points();
        let thresholds = self.config.grid.threshold.points();
        let ballast = self.config.ballast;
        let policy = self.config.missing_stream;

        let values = weights
            .par_iter()
            .map(|&w| -> EngineResult<Vec<f64>> {
                let scores = compute_scores(similarities, &Weights::pinned(reference, other, w), policy)?;
                Ok(thresholds
                    .iter()
                    .map(|&th| asymmetric_loss(&scores, feedback, th, ballast))
                    .collect())
            })
            .collect::<EngineResult<Vec<Vec<f64>>>>()?;

        Ok(LossSurface::new(weights, thresholds, values))
    }

    /// Fit weights and threshold to the feedback.
    ///
    /// # Errors
    /// `NoFeedback` for an empty feedback map, `UnsupportedStreamCount`
    /// unless exactly two streams are configured, and any scoring error.
    pub fn optimize(
        &self,
        similarities: &SimilarityResult,
        feedback: &BTreeMap<ClipId, Feedback>,
    ) -> EngineResult<OptimizedParameters> {
        if feedback.is_empty() {
            return Err(EngineError::NoFeedback);
        }
        let (reference, other) = self.streams()?;
        let surface = self.loss_surface(similarities, feedback)?;
        let Some(best) = surface.argmin() else {
            return Err(EngineError::Config("optimizer grid is empty".into()));
        };
        debug!(
            weight = best.weight,
            threshold = best.threshold,
            loss = best.loss,
            "grid optimum"
        );

        let (weight, threshold, refined) = if surface.is_boundary(best.row, best.col) {
            debug!("grid optimum on boundary, skipping refinement");
            (best.weight, best.threshold, false)
        } else {
            let stencil = Stencil {
                center: (best.weight, best.threshold),
                step: (self.config.grid.weight.step, self.config.grid.threshold.step),
                center_loss: best.loss,
                weight_neighbors: (
                    surface.loss(best.row - 1, best.col),
                    surface.loss(best.row + 1, best.col),
                ),
                threshold_neighbors: (
                    surface.loss(best.row, best.col - 1),
                    surface.loss(best.row, best.col + 1),
                ),
            };
            match fit_separable_quadratic(&stencil, self.config.grid.refine_tolerance) {
                Some(fit) => (fit.w0, fit.t0, true),
                None => {
                    debug!("quadratic fit rejected, keeping grid optimum");
                    (best.weight, best.threshold, false)
                }
            }
        };

        let params = OptimizedParameters {
            weights: Weights::pinned(reference, other, weight),
            threshold: threshold - self.config.round_off_epsilon,
            grid_optimum: best,
            refined,
            surface,
        };
        info!(
            weights = %params.weights,
            threshold = params.threshold,
            refined,
            feedback = feedback.len(),
            "optimized parameters"
        );
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::AxisSpec;
    use crate::types::StreamSimilarity;
    use approx::assert_relative_eq;

    fn sim(rgb: f64, flow: f64) -> BTreeMap<String, StreamSimilarity> {
        let mut m = BTreeMap::new();
        m.insert("rgb".into(), StreamSimilarity { mean: rgb, ensemble_size: 2 });
        m.insert("warped_optical_flow".into(), StreamSimilarity { mean: flow, ensemble_size: 2 });
        m
    }

    /// Matches are strong on rgb; non-matches are strong only on flow.
    fn separable_case() -> (SimilarityResult, BTreeMap<ClipId, Feedback>) {
        let mut sims = SimilarityResult::new();
        let mut feedback = BTreeMap::new();
        for i in 0..6 {
            sims.insert(i, sim(0.95 - 0.01 * i as f64, 0.7 + 0.02 * i as f64));
            feedback.insert(i, Feedback::Confirmed);
        }
        for i in 10..16 {
            sims.insert(i, sim(0.55 + 0.01 * (i - 10) as f64, 0.95));
            feedback.insert(i, Feedback::Rejected);
        }
        (sims, feedback)
    }

    #[test]
    fn test_loss_zero_when_all_correct() {
        let scores: Scores = [(1, 0.9), (2, 0.5)].into_iter().collect();
        let mut fb = BTreeMap::new();
        fb.insert(1, Feedback::Confirmed);
        fb.insert(2, Feedback::Rejected);
        assert_eq!(asymmetric_loss(&scores, &fb, 0.8, 0.3), 0.0);
    }

    #[test]
    fn test_loss_asymmetry_and_tie() {
        let scores: Scores = [(1, 0.7), (2, 0.9), (3, 0.8)].into_iter().collect();
        // Missed true match: (0 - 1)(0.7 - 0.8)(1 + 0.5) = 0.15
        let mut fb = BTreeMap::new();
        fb.insert(1, Feedback::Confirmed);
        assert_relative_eq!(asymmetric_loss(&scores, &fb, 0.8, 0.5), 0.15, epsilon = 1e-12);
        // False alarm: (1 - 0)(0.9 - 0.8) = 0.1, no ballast
        let mut fb = BTreeMap::new();
        fb.insert(2, Feedback::Rejected);
        assert_relative_eq!(asymmetric_loss(&scores, &fb, 0.8, 0.5), 0.1, epsilon = 1e-12);
        // Exactly at threshold counts as predicted match: zero margin either way.
        let mut fb = BTreeMap::new();
        fb.insert(3, Feedback::Rejected);
        assert_eq!(asymmetric_loss(&scores, &fb, 0.8, 0.0), 0.0);
    }

    #[test]
    fn test_loss_normalized_by_feedback_size() {
        let scores: Scores = [(1, 0.7)].into_iter().collect();
        let mut fb = BTreeMap::new();
        fb.insert(1, Feedback::Confirmed);
        fb.insert(2, Feedback::Confirmed); // unscored
        assert_relative_eq!(asymmetric_loss(&scores, &fb, 0.8, 0.0), 0.05, epsilon = 1e-12);
    }

    #[test]
    fn test_grid_minimum_is_global_on_grid() {
        let (sims, feedback) = separable_case();
        let config = EngineConfig::default();
        let optimizer = HyperparameterOptimizer::new(&config);
        let params = optimizer.optimize(&sims, &feedback).unwrap();

        let best = params.grid_optimum;
        for row in &params.surface.values {
            for &loss in row {
                assert!(best.loss <= loss);
            }
        }
        assert_eq!(params.surface.rows(), 40);
        assert_eq!(params.surface.cols(), 50);
        // The separating direction is rgb, so the flow weight stays low.
        assert!(params.weights.get("warped_optical_flow").unwrap() < 1.0);
        assert_eq!(params.weights.get("rgb"), Some(1.0));
    }

    #[test]
    fn test_optimized_parameters_separate_feedback() {
        let (sims, feedback) = separable_case();
        let config = EngineConfig::default();
        let params = HyperparameterOptimizer::new(&config)
            .optimize(&sims, &feedback)
            .unwrap();
        let scores = compute_scores(&sims, &params.weights, config.missing_stream).unwrap();
        for (clip, fb) in &feedback {
            let is_match = scores[clip] >= params.threshold;
            assert_eq!(is_match, fb.indicator() == 1.0, "clip {}", clip);
        }
    }

    #[test]
    fn test_boundary_optimum_returned_unrefined() {
        // Everything is a match with perfect similarity: the lowest threshold
        // row is never better than any other, and the first cell wins.
        let mut sims = SimilarityResult::new();
        let mut feedback = BTreeMap::new();
        sims.insert(1, sim(1.0, 1.0));
        feedback.insert(1, Feedback::Confirmed);
        let config = EngineConfig::default();
        let params = HyperparameterOptimizer::new(&config)
            .optimize(&sims, &feedback)
            .unwrap();
        assert!(!params.refined);
        assert_eq!((params.grid_optimum.row, params.grid_optimum.col), (0, 0));
        assert_relative_eq!(params.threshold, 0.6 - 1e-5, epsilon = 1e-12);
        assert_relative_eq!(params.weights.get("warped_optical_flow").unwrap(), 0.5);
    }

    /// Two rejected clips trading rgb against flow, and one confirmed clip
    /// scoring 0.85 at any weight. On a 3x3 grid the only zero-loss cell is
    /// the centre (w = 1.0, th = 0.8), with uneven neighbours on both axes.
    fn curved_case() -> (SimilarityResult, BTreeMap<ClipId, Feedback>, EngineConfig) {
        let mut sims = SimilarityResult::new();
        let mut feedback = BTreeMap::new();
        sims.insert(1, sim(0.98, 0.7));
        feedback.insert(1, Feedback::Rejected);
        sims.insert(2, sim(0.7, 0.98));
        feedback.insert(2, Feedback::Rejected);
        sims.insert(3, sim(0.85, 0.85));
        feedback.insert(3, Feedback::Confirmed);

        let mut config = EngineConfig::default();
        config.grid.weight = AxisSpec::new(0.5, 2.0, 0.5);
        config.grid.threshold = AxisSpec::new(0.7, 0.95, 0.1);
        (sims, feedback, config)
    }

    #[test]
    fn test_interior_optimum_is_refined() {
        let (sims, feedback, config) = curved_case();
        let params = HyperparameterOptimizer::new(&config)
            .optimize(&sims, &feedback)
            .unwrap();

        let best = params.grid_optimum;
        assert_eq!((best.row, best.col), (1, 1));
        assert_relative_eq!(best.weight, 1.0);
        assert_relative_eq!(best.threshold, 0.8, epsilon = 1e-12);
        assert_eq!(best.loss, 0.0);
        assert!(params.refined);

        // Flow-heavy weights lose less than rgb-heavy ones, so the vertex
        // moves toward 1.5; the false-alarm side pulls the threshold up.
        let w = params.weights.get("warped_optical_flow").unwrap();
        assert!(w > 1.05 && w < 1.15, "weight {}", w);
        let th = params.threshold + config.round_off_epsilon;
        assert!(th > 0.815 && th < 0.84, "threshold {}", th);
        assert_eq!(params.weights.get("rgb"), Some(1.0));
    }

    #[test]
    fn test_refinement_rejected_by_tight_tolerance_keeps_grid_point() {
        let (sims, feedback, mut config) = curved_case();
        config.grid.refine_tolerance = -1.0;
        let params = HyperparameterOptimizer::new(&config)
            .optimize(&sims, &feedback)
            .unwrap();
        assert!(!params.refined);
        assert_relative_eq!(params.weights.get("warped_optical_flow").unwrap(), 1.0);
        assert_relative_eq!(params.threshold, 0.8 - config.round_off_epsilon, epsilon = 1e-12);
    }

    #[test]
    fn test_threshold_carries_round_off_margin() {
        let (sims, feedback) = separable_case();
        let mut config = EngineConfig::default();
        config.round_off_epsilon = 0.0;
        let exact = HyperparameterOptimizer::new(&config)
            .optimize(&sims, &feedback)
            .unwrap();
        config.round_off_epsilon = 1e-3;
        let shifted = HyperparameterOptimizer::new(&config)
            .optimize(&sims, &feedback)
            .unwrap();
        assert_relative_eq!(exact.threshold - shifted.threshold, 1e-3, epsilon = 1e-12);
    }

    #[test]
    fn test_small_grid_surface_shape() {
        let (sims, feedback) = separable_case();
        let mut config = EngineConfig::default();
        config.grid.weight = AxisSpec::new(0.5, 1.0, 0.25);
        config.grid.threshold = AxisSpec::new(0.7, 0.9, 0.1);
        let surface = HyperparameterOptimizer::new(&config)
            .loss_surface(&sims, &feedback)
            .unwrap();
        assert_eq!(surface.weights.len(), 2);
        assert_eq!(surface.thresholds.len(), 2);
        assert_eq!(surface.values.len(), 2);
        assert!(surface.values.iter().all(|row| row.len() == 2));
    }

    #[test]
    fn test_errors() {
        let (sims, _) = separable_case();
        let config = EngineConfig::default();
        let err = HyperparameterOptimizer::new(&config)
            .optimize(&sims, &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::NoFeedback));

        let mut fb = BTreeMap::new();
        fb.insert(1, Feedback::Confirmed);
        let mut three = EngineConfig::default();
        three.streams.push("audio".into());
        let err = HyperparameterOptimizer::new(&three)
            .optimize(&sims, &fb)
            .unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedStreamCount(3)));
    }
}
