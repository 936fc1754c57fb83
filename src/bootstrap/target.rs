use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use rand::seq::index;
use serde::Serialize;
use tracing::{debug, info};

use super::BootstrapMode;
use super::fit::{FitSite, fit_matches_only, fit_with_nonmatches, scale_feature};
use crate::config::BootstrapConfig;
use crate::error::{EngineError, EngineResult};
use crate::types::{ClipFeatures, FeatureVector, SplitIndex, StreamName, StreamSplitMap};

/// Where a round's target came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum TargetOrigin {
    /// The scaled reference clip.
    Reference,
    /// Refit from reviewed clips.
    Bootstrapped {
        mode: BootstrapMode,
        matches: usize,
        nonmatches: usize,
        smoothed: bool,
    },
}

impl TargetOrigin {
    pub fn label(&self) -> String {
        match self {
            TargetOrigin::Reference => "reference clip".to_string(),
            TargetOrigin::Bootstrapped {
                mode,
                matches,
                nonmatches,
                smoothed,
            } => format!(
                "bootstrapped ({}, {} matches, {} non-matches{})",
                mode.label(),
                matches,
                nonmatches,
                if *smoothed { ", smoothed" } else { "" }
            ),
        }
    }
}

/// The feature map a round matches against.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Target {
    pub features: StreamSplitMap,
    pub origin: TargetOrigin,
}

impl Target {
    /// Splits present under any stream.
    pub fn splits(&self) -> BTreeSet<SplitIndex> {
        self.features
            .values()
            .flat_map(|splits| splits.keys().copied())
            .collect()
    }
}

/// Inputs for one target estimate.
#[derive(Debug, Clone, Copy)]
pub struct BootstrapInput<'a> {
    pub reference: &'a ClipFeatures,
    /// Features of clips the user confirmed.
    pub matches: &'a [ClipFeatures],
    /// Features of clips the user rejected.
    pub nonmatches: &'a [ClipFeatures],
    /// Target stored with the previous round, if any.
    pub previous: Option<&'a StreamSplitMap>,
}

/// Index sample of `round(len * fraction)` items (at least one), sorted.
///
/// Drawing with replacement keeps each drawn index once; a repeated column
/// would only make the Gram matrix singular.
pub fn sample_indices<R: Rng + ?Sized>(
    len: usize,
    fraction: f64,
    with_replacement: bool,
    rng: &mut R,
) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    let count = ((len as f64 * fraction).round() as usize).max(1);
    if with_replacement {
        let drawn: BTreeSet<usize> = (0..count).map(|_| rng.gen_range(0..len)).collect();
        drawn.into_iter().collect()
    } else if count >= len {
        (0..len).collect()
    } else {
        let mut picked = index::sample(rng, len, count).into_vec();
        picked.sort_unstable();
        picked
    }
}

/// Builds the target for a round.
pub struct TargetBootstrapper<'a> {
    config: &'a BootstrapConfig,
}

impl<'a> TargetBootstrapper<'a> {
    pub fn new(config: &'a BootstrapConfig) -> Self {
        Self { config }
    }

    /// Every reference vector scaled by `1 / (f.f)`.
    pub fn reference_target(reference: &StreamSplitMap) -> EngineResult<StreamSplitMap> {
        let mut target = StreamSplitMap::new();
        for (stream, splits) in reference {
            let scaled = target.entry(stream.clone()).or_default();
            for (&split, feature) in splits {
                scaled.insert(split, scale_feature(feature, FitSite::new(stream, split))?);
            }
        }
        Ok(target)
    }

    /// Estimate the target.
    ///
    /// Falls back to the scaled reference when bootstrapping is disabled or
    /// there is no confirmed match. Sites (stream, split) that no sampled
    /// match covers keep their scaled reference vector.
    ///
    /// # Errors
    /// Any fit error is fatal for the round; nothing is retried.
    pub fn bootstrap<R: Rng + ?Sized>(
        &self,
        input: &BootstrapInput<'_>,
        rng: &mut R,
    ) -> EngineResult<Target> {
        let reference = Self::reference_target(&input.reference.features)?;
        let mode = self.config.mode;

        if !mode.is_enabled() || input.matches.is_empty() {
            debug!(mode = mode.label(), "using scaled reference as target");
            return Ok(Target {
                features: reference,
                origin: TargetOrigin::Reference,
            });
        }

        let nonmatches: &[ClipFeatures] = if mode.uses_nonmatches() {
            input.nonmatches
        } else {
            &[]
        };

        let mut features = if mode == BootstrapMode::Bagging {
            self.bagged(&reference, input.matches, nonmatches, rng)?
        } else {
            let m = sample_indices(
                input.matches.len(),
                self.config.sample_fraction,
                self.config.with_replacement,
                rng,
            );
            let y = sample_indices(
                nonmatches.len(),
                self.config.sample_fraction,
                self.config.with_replacement,
                rng,
            );
            let m: Vec<_> = m.into_iter().map(|i| &input.matches[i]).collect();
            let y: Vec<_> = y.into_iter().map(|i| &nonmatches[i]).collect();
            self.fit_once(&reference, &m, &y)?
        };

        let smoothed = match (self.config.memory, input.previous) {
            (Some(memory), Some(previous)) => smooth(&mut features, previous, memory)?,
            _ => false,
        };

        let origin = TargetOrigin::Bootstrapped {
            mode,
            matches: input.matches.len(),
            nonmatches: nonmatches.len(),
            smoothed,
        };
        info!(origin = %origin.label(), "bootstrapped target");
        Ok(Target { features, origin })
    }

    /// The scaled reference with every site a sampled match covers refit.
    fn fit_once(
        &self,
        reference: &StreamSplitMap,
        matches: &[&ClipFeatures],
        nonmatches: &[&ClipFeatures],
    ) -> EngineResult<StreamSplitMap> {
        let mut target = reference.clone();
        for ((stream, split), fitted) in self.fit_sites(matches, nonmatches)? {
            target.entry(stream).or_default().insert(split, fitted);
        }
        Ok(target)
    }

    /// Fitted vectors for the sites the sampled matches cover, and only those.
    fn fit_sites(
        &self,
        matches: &[&ClipFeatures],
        nonmatches: &[&ClipFeatures],
    ) -> EngineResult<BTreeMap<(StreamName, SplitIndex), FeatureVector>> {
        let mut fitted = BTreeMap::new();
        for (stream, split) in sites(matches) {
            let site = FitSite::new(&stream, split);
            let x = vectors_at(matches, &stream, split);
            let y = vectors_at(nonmatches, &stream, split);
            let vector = if y.is_empty() {
                fit_matches_only(&x, site)?
            } else {
                fit_with_nonmatches(&x, &y, self.config.regularization, site)?
            };
            fitted.insert((stream, split), vector);
        }
        Ok(fitted)
    }

    /// Mean of `bags` independent with-replacement fits.
    ///
    /// Each site is averaged over the bags whose sampled matches covered it.
    /// A site no bag covered keeps its scaled reference vector.
    fn bagged<R: Rng + ?Sized>(
        &self,
        reference: &StreamSplitMap,
        matches: &[ClipFeatures],
        nonmatches: &[ClipFeatures],
        rng: &mut R,
    ) -> EngineResult<StreamSplitMap> {
        let mut sums: BTreeMap<(StreamName, SplitIndex), (FeatureVector, usize)> = BTreeMap::new();

        for bag in 0..self.config.bags {
            let m: Vec<_> = sample_indices(matches.len(), 1.0, true, rng)
                .into_iter()
                .map(|i| &matches[i])
                .collect();
            let y: Vec<_> = sample_indices(nonmatches.len(), 1.0, true, rng)
                .into_iter()
                .map(|i| &nonmatches[i])
                .collect();
            debug!(bag, matches = m.len(), nonmatches = y.len(), "fitting bag");

            for ((stream, split), vector) in self.fit_sites(&m, &y)? {
                let (sum, count) = sums
                    .entry((stream.clone(), split))
                    .or_insert_with(|| (vec![0.0; vector.len()], 0));
                if sum.len() != vector.len() {
                    return Err(EngineError::DimensionMismatch {
                        stream,
                        split,
                        expected: sum.len(),
                        actual: vector.len(),
                    });
                }
                sum.iter_mut().zip(&vector).for_each(|(s, v)| *s += v);
                *count += 1;
            }
        }

        let mut target = reference.clone();
        for ((stream, split), (sum, count)) in sums {
            let mean = sum.into_iter().map(|s| s / count as f64).collect();
            target.entry(stream).or_default().insert(split, mean);
        }
        Ok(target)
    }
}

/// Every (stream, split) at least one clip has a vector for.
fn sites(clips: &[&ClipFeatures]) -> BTreeSet<(StreamName, SplitIndex)> {
    clips
        .iter()
        .flat_map(|clip| {
            clip.features
                .iter()
                .flat_map(|(stream, splits)| splits.keys().map(move |split| (stream.clone(), *split)))
        })
        .collect()
}

fn vectors_at<'c>(clips: &[&'c ClipFeatures], stream: &str, split: SplitIndex) -> Vec<&'c FeatureVector> {
    clips
        .iter()
        .filter_map(|clip| clip.features.get(stream).and_then(|s| s.get(&split)))
        .collect()
}

/// `memory * new + (1 - memory) * old` wherever the previous target has the
/// same (stream, split). Returns whether anything was blended.
fn smooth(target: &mut StreamSplitMap, previous: &StreamSplitMap, memory: f64) -> EngineResult<bool> {
    let mut blended = false;
    for (stream, splits) in target.iter_mut() {
        let Some(old_splits) = previous.get(stream) else {
            continue;
        };
        for (split, vector) in splits.iter_mut() {
            let Some(old) = old_splits.get(split) else {
                continue;
            };
            if old.len() != vector.len() {
                return Err(EngineError::DimensionMismatch {
                    stream: stream.clone(),
                    split: *split,
                    expected: vector.len(),
                    actual: old.len(),
                });
            }
            vector
                .iter_mut()
                .zip(old)
                .for_each(|(v, o)| *v = memory * *v + (1.0 - memory) * o);
            blended = true;
        }
    }
    Ok(blended)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::dot;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn clip(entries: &[(&str, SplitIndex, Vec<f64>)]) -> ClipFeatures {
        let mut c = ClipFeatures::default();
        for (stream, split, v) in entries {
            c.features
                .entry(stream.to_string())
                .or_default()
                .insert(*split, v.clone());
            c.splits.insert(*split);
        }
        c
    }

    fn config(mode: BootstrapMode) -> BootstrapConfig {
        BootstrapConfig {
            mode,
            memory: None,
            ..BootstrapConfig::default()
        }
    }

    #[test]
    fn test_sample_indices_counts() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(sample_indices(10, 1.0, false, &mut rng), (0..10).collect::<Vec<_>>());
        assert_eq!(sample_indices(10, 0.5, false, &mut rng).len(), 5);
        // Always at least one.
        assert_eq!(sample_indices(10, 0.01, false, &mut rng).len(), 1);
        assert!(sample_indices(0, 1.0, false, &mut rng).is_empty());

        let drawn = sample_indices(10, 1.0, true, &mut rng);
        assert!(!drawn.is_empty() && drawn.len() <= 10);
        assert!(drawn.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_disabled_equals_scaled_reference() {
        let reference = clip(&[("rgb", 1, vec![3.0, 4.0]), ("flow", 2, vec![0.0, 2.0])]);
        let matches = vec![clip(&[("rgb", 1, vec![1.0, 0.0])])];
        let cfg = config(BootstrapMode::Disabled);
        let input = BootstrapInput {
            reference: &reference,
            matches: &matches,
            nonmatches: &[],
            previous: None,
        };
        let target = TargetBootstrapper::new(&cfg)
            .bootstrap(&input, &mut StdRng::seed_from_u64(0))
            .unwrap();
        assert_eq!(target.origin, TargetOrigin::Reference);
        let expected = TargetBootstrapper::reference_target(&reference.features).unwrap();
        assert_eq!(target.features, expected);
        assert_eq!(target.features["rgb"][&1], vec![0.12, 0.16]);
        assert_eq!(target.features["flow"][&2], vec![0.0, 0.5]);
    }

    #[test]
    fn test_no_matches_falls_back_to_reference() {
        let reference = clip(&[("rgb", 1, vec![1.0, 1.0])]);
        let cfg = config(BootstrapMode::MatchesOnly);
        let input = BootstrapInput {
            reference: &reference,
            matches: &[],
            nonmatches: &[],
            previous: None,
        };
        let target = TargetBootstrapper::new(&cfg)
            .bootstrap(&input, &mut StdRng::seed_from_u64(0))
            .unwrap();
        assert_eq!(target.origin, TargetOrigin::Reference);
    }

    #[test]
    fn test_matches_only_fit_and_uncovered_sites() {
        let reference = clip(&[("rgb", 1, vec![1.0, 0.0, 0.0]), ("rgb", 2, vec![2.0, 0.0, 0.0])]);
        let matches = vec![
            clip(&[("rgb", 1, vec![1.0, 0.2, 0.0])]),
            clip(&[("rgb", 1, vec![0.1, 1.0, 0.3])]),
        ];
        let cfg = config(BootstrapMode::MatchesOnly);
        let input = BootstrapInput {
            reference: &reference,
            matches: &matches,
            nonmatches: &[],
            previous: None,
        };
        let target = TargetBootstrapper::new(&cfg)
            .bootstrap(&input, &mut StdRng::seed_from_u64(0))
            .unwrap();

        let t1 = &target.features["rgb"][&1];
        for m in &matches {
            assert_relative_eq!(dot(t1, &m.features["rgb"][&1]), 1.0, epsilon = 1e-9);
        }
        // Split 2 has no match vectors: scaled reference kept.
        assert_eq!(target.features["rgb"][&2], vec![0.5, 0.0, 0.0]);
        assert_eq!(target.splits().len(), 2);
    }

    #[test]
    fn test_matches_only_ignores_nonmatches() {
        let reference = clip(&[("rgb", 1, vec![1.0, 0.0])]);
        let matches = vec![clip(&[("rgb", 1, vec![1.0, 0.0])])];
        let nonmatches = vec![clip(&[("rgb", 1, vec![0.0, 1.0])])];
        let cfg = config(BootstrapMode::MatchesOnly);
        let input = BootstrapInput {
            reference: &reference,
            matches: &matches,
            nonmatches: &nonmatches,
            previous: None,
        };
        let target = TargetBootstrapper::new(&cfg)
            .bootstrap(&input, &mut StdRng::seed_from_u64(0))
            .unwrap();
        assert_relative_eq!(target.features["rgb"][&1][1], 0.0);
        assert!(matches!(
            target.origin,
            TargetOrigin::Bootstrapped { nonmatches: 0, .. }
        ));
    }

    #[test]
    fn test_nonmatches_shift_target() {
        let reference = clip(&[("rgb", 1, vec![1.0, 0.0])]);
        let matches = vec![clip(&[("rgb", 1, vec![1.0, 0.0])])];
        let nonmatches = vec![clip(&[("rgb", 1, vec![0.0, 1.0])])];
        let cfg = config(BootstrapMode::MatchesPlusNonMatches);
        let input = BootstrapInput {
            reference: &reference,
            matches: &matches,
            nonmatches: &nonmatches,
            previous: None,
        };
        let target = TargetBootstrapper::new(&cfg)
            .bootstrap(&input, &mut StdRng::seed_from_u64(0))
            .unwrap();
        let mu = cfg.regularization;
        assert_relative_eq!(target.features["rgb"][&1][1], mu / (1.0 + mu), epsilon = 1e-12);
    }

    #[test]
    fn test_temporal_smoothing_blends_existing_sites() {
        let reference = clip(&[("rgb", 1, vec![1.0, 0.0]), ("rgb", 2, vec![1.0, 0.0])]);
        let matches = vec![clip(&[("rgb", 1, vec![2.0, 0.0]), ("rgb", 2, vec![2.0, 0.0])])];
        let mut previous = StreamSplitMap::new();
        previous.entry("rgb".into()).or_default().insert(1, vec![1.5, 1.0]);

        let cfg = BootstrapConfig {
            mode: BootstrapMode::MatchesOnly,
            memory: Some(0.7),
            ..BootstrapConfig::default()
        };
        let input = BootstrapInput {
            reference: &reference,
            matches: &matches,
            nonmatches: &[],
            previous: Some(&previous),
        };
        let target = TargetBootstrapper::new(&cfg)
            .bootstrap(&input, &mut StdRng::seed_from_u64(0))
            .unwrap();
        // Fit gives [0.5, 0]; blended with [1.5, 1.0].
        let t1 = &target.features["rgb"][&1];
        assert_relative_eq!(t1[0], 0.7 * 0.5 + 0.3 * 1.5, epsilon = 1e-12);
        assert_relative_eq!(t1[1], 0.3, epsilon = 1e-12);
        // No previous entry for split 2.
        assert_relative_eq!(target.features["rgb"][&2][0], 0.5, epsilon = 1e-12);
        assert!(matches!(target.origin, TargetOrigin::Bootstrapped { smoothed: true, .. }));
    }

    /// Four matches along the axes of a 4-dim space, one per axis.
    fn axis_matches() -> Vec<ClipFeatures> {
        (0..4)
            .map(|axis| {
                let mut v = vec![0.0; 4];
                v[axis] = 2.0;
                clip(&[("rgb", 1, v)])
            })
            .collect()
    }

    /// Indices of the matches the fitted target has unit similarity with.
    fn fitted_to(target: &Target, matches: &[ClipFeatures]) -> Vec<usize> {
        let t = &target.features["rgb"][&1];
        matches
            .iter()
            .enumerate()
            .filter_map(|(i, m)| {
                let sim = dot(t, &m.features["rgb"][&1]);
                if (sim - 1.0).abs() < 1e-9 {
                    Some(i)
                } else {
                    assert!(sim.abs() < 1e-9, "match {} at similarity {}", i, sim);
                    None
                }
            })
            .collect()
    }

    #[test]
    fn test_half_sample_without_replacement() {
        let reference = clip(&[("rgb", 1, vec![1.0, 0.0, 0.0, 0.0])]);
        let matches = axis_matches();
        let cfg = BootstrapConfig {
            mode: BootstrapMode::MatchesOnly,
            sample_fraction: 0.5,
            with_replacement: false,
            memory: None,
            ..BootstrapConfig::default()
        };
        let input = BootstrapInput {
            reference: &reference,
            matches: &matches,
            nonmatches: &[],
            previous: None,
        };
        let bootstrapper = TargetBootstrapper::new(&cfg);

        for seed in 0..6 {
            let a = bootstrapper.bootstrap(&input, &mut StdRng::seed_from_u64(seed)).unwrap();
            let b = bootstrapper.bootstrap(&input, &mut StdRng::seed_from_u64(seed)).unwrap();
            assert_eq!(a, b);

            let expected = sample_indices(4, 0.5, false, &mut StdRng::seed_from_u64(seed));
            assert_eq!(expected.len(), 2);
            assert_eq!(fitted_to(&a, &matches), expected);
        }
    }

    #[test]
    fn test_sampling_with_replacement_drops_repeats() {
        let reference = clip(&[("rgb", 1, vec![1.0, 0.0, 0.0, 0.0])]);
        let matches = axis_matches();
        let cfg = BootstrapConfig {
            mode: BootstrapMode::MatchesOnly,
            sample_fraction: 1.0,
            with_replacement: true,
            memory: None,
            ..BootstrapConfig::default()
        };
        let input = BootstrapInput {
            reference: &reference,
            matches: &matches,
            nonmatches: &[],
            previous: None,
        };
        let bootstrapper = TargetBootstrapper::new(&cfg);

        let mut saw_repeat = false;
        for seed in 0..12 {
            // A repeated match would make the Gram matrix singular.
            let target = bootstrapper.bootstrap(&input, &mut StdRng::seed_from_u64(seed)).unwrap();
            let expected = sample_indices(4, 1.0, true, &mut StdRng::seed_from_u64(seed));
            saw_repeat |= expected.len() < 4;
            assert_eq!(fitted_to(&target, &matches), expected);
        }
        assert!(saw_repeat);

        let half = BootstrapConfig {
            sample_fraction: 0.5,
            ..cfg
        };
        let target = TargetBootstrapper::new(&half)
            .bootstrap(&input, &mut StdRng::seed_from_u64(5))
            .unwrap();
        let expected = sample_indices(4, 0.5, true, &mut StdRng::seed_from_u64(5));
        assert!((1..=2).contains(&expected.len()));
        assert_eq!(fitted_to(&target, &matches), expected);
    }

    #[test]
    fn test_bagging_averages_bag_fits() {
        let reference = clip(&[("rgb", 1, vec![1.0, 0.0])]);
        let matches = vec![
            clip(&[("rgb", 1, vec![2.0, 0.0])]),
            clip(&[("rgb", 1, vec![1.0, 1.0])]),
        ];
        let cfg = BootstrapConfig {
            bags: 5,
            memory: None,
            ..BootstrapConfig::default()
        };
        let input = BootstrapInput {
            reference: &reference,
            matches: &matches,
            nonmatches: &[],
            previous: None,
        };
        let bootstrapper = TargetBootstrapper::new(&cfg);

        for seed in [3, 11] {
            let target = bootstrapper.bootstrap(&input, &mut StdRng::seed_from_u64(seed)).unwrap();
            assert_eq!(
                target,
                bootstrapper.bootstrap(&input, &mut StdRng::seed_from_u64(seed)).unwrap()
            );

            // Replay the draws and average the per-bag fits by hand.
            let mut replay = StdRng::seed_from_u64(seed);
            let mut expected = [0.0; 2];
            for _ in 0..cfg.bags {
                let drawn: Vec<_> = sample_indices(2, 1.0, true, &mut replay)
                    .into_iter()
                    .map(|i| &matches[i].features["rgb"][&1])
                    .collect();
                let fit = fit_matches_only(&drawn, FitSite::new("rgb", 1)).unwrap();
                expected.iter_mut().zip(&fit).for_each(|(e, f)| *e += f / cfg.bags as f64);
            }
            let t = &target.features["rgb"][&1];
            assert_relative_eq!(t[0], expected[0], epsilon = 1e-12);
            assert_relative_eq!(t[1], expected[1], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_bagging_averages_only_bags_covering_a_site() {
        let reference = clip(&[
            ("rgb", 1, vec![1.0, 0.0]),
            ("rgb", 2, vec![1.0, 0.0]),
            ("rgb", 3, vec![2.0, 0.0]),
        ]);
        let matches = vec![
            clip(&[("rgb", 1, vec![2.0, 0.0]), ("rgb", 2, vec![0.0, 4.0])]),
            clip(&[("rgb", 1, vec![0.0, 1.0])]),
        ];
        let cfg = BootstrapConfig {
            bags: 4,
            memory: None,
            ..BootstrapConfig::default()
        };
        let input = BootstrapInput {
            reference: &reference,
            matches: &matches,
            nonmatches: &[],
            previous: None,
        };
        let bootstrapper = TargetBootstrapper::new(&cfg);

        for seed in 0..4 {
            let target = bootstrapper.bootstrap(&input, &mut StdRng::seed_from_u64(seed)).unwrap();
            // Only the first match covers split 2, so every covering bag fits it alone.
            assert_eq!(target.features["rgb"][&2], vec![0.0, 0.25], "seed {}", seed);
            // No match covers split 3.
            assert_eq!(target.features["rgb"][&3], vec![0.5, 0.0]);
        }
    }

    #[test]
    fn test_degenerate_fit_propagates() {
        let reference = clip(&[("rgb", 1, vec![1.0, 0.0])]);
        let matches = vec![
            clip(&[("rgb", 1, vec![1.0, 0.0])]),
            clip(&[("rgb", 1, vec![0.0, 1.0])]),
            clip(&[("rgb", 1, vec![1.0, 1.0])]),
        ];
        let cfg = config(BootstrapMode::MatchesOnly);
        let input = BootstrapInput {
            reference: &reference,
            matches: &matches,
            nonmatches: &[],
            previous: None,
        };
        let err = TargetBootstrapper::new(&cfg)
            .bootstrap(&input, &mut StdRng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(err, EngineError::SingularMatrix { .. }));
    }

    #[test]
    fn test_origin_labels() {
        assert_eq!(TargetOrigin::Reference.label(), "reference clip");
        let origin = TargetOrigin::Bootstrapped {
            mode: BootstrapMode::Bagging,
            matches: 4,
            nonmatches: 2,
            smoothed: true,
        };
        assert_eq!(origin.label(), "bootstrapped (bagging, 4 matches, 2 non-matches, smoothed)");
    }
}
