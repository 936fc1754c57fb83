//! Engine configuration loaded from clipmatch.toml.
//!
//! One immutable [`EngineConfig`] is built at process start and passed by
//! reference into every round. Nothing mutates it afterwards.
//!
//! ## Example
//!
//! ```toml
//! streams = ["rgb", "warped_optical_flow"]
//! feature-name = "global_pool"
//! default-threshold = 0.8
//! near-miss = 0.5
//! review-budget = 20
//!
//! [default-weights]
//! rgb = 1.0
//! warped_optical_flow = 1.5
//!
//! [bootstrap]
//! mode = "bagging"
//! bags = 3
//! memory = 0.7
//!
//! [grid]
//! weight = { min = 0.5, max = 2.5, step = 0.05 }
//! threshold = { min = 0.6, max = 1.1, step = 0.01 }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::bootstrap::BootstrapMode;
use crate::error::{EngineError, EngineResult};
use crate::scoring::MissingStreamPolicy;
use crate::training::AxisSpec;
use crate::types::{StreamName, Weights};

/// File name searched for by [`EngineConfig::load`].
pub const CONFIG_FILE: &str = "clipmatch.toml";

/// Target bootstrapping settings.
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapConfig {
    pub mode: BootstrapMode,
    /// Number of independent refits averaged in bagging mode.
    pub bags: usize,
    /// Fraction of confirmed clips drawn before each fit (1.0 = all).
    pub sample_fraction: f64,
    /// Draw with replacement outside bagging mode.
    pub with_replacement: bool,
    /// Weight of the new target against the previous round's: f*new + (1-f)*old.
    /// `None` disables temporal smoothing.
    pub memory: Option<f64>,
    /// Ridge strength for the matches-plus-non-matches fit.
    pub regularization: f64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            mode: BootstrapMode::Bagging,
            bags: 3,
            sample_fraction: 1.0,
            with_replacement: false,
            memory: Some(0.7),
            regularization: 0.05,
        }
    }
}

/// Weight x threshold grid for the optimizer.
#[derive(Debug, Clone, PartialEq)]
pub struct GridConfig {
    pub weight: AxisSpec,
    pub threshold: AxisSpec,
    /// Max deviation of the quadratic fit from the five grid losses.
    pub refine_tolerance: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            weight: AxisSpec::new(0.5, 2.5, 0.05),
            threshold: AxisSpec::new(0.6, 1.1, 0.01),
            refine_tolerance: 1e-6,
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Source file for this config (for display).
    pub source: Option<PathBuf>,

    /// Streams in use. The first one is the reference stream whose weight is pinned at 1.0.
    pub streams: Vec<StreamName>,

    /// DNN feature name to read (e.g. "global_pool").
    pub feature_name: String,

    /// Weights for rounds without feedback.
    pub default_weights: Weights,

    /// Threshold for rounds without feedback.
    pub default_threshold: f64,

    /// Width of the near-miss band relative to (1 - threshold).
    pub near_miss: f64,

    /// Extra penalty on missed true matches in the optimizer loss.
    pub ballast: f64,

    /// Max clips surfaced for review per round.
    pub review_budget: usize,

    /// Safety margin subtracted from an optimized threshold.
    pub round_off_epsilon: f64,

    /// What to do with a clip lacking a weighted stream.
    pub missing_stream: MissingStreamPolicy,

    /// Fixed RNG seed. Unset means a fresh seed per round.
    pub seed: Option<u64>,

    pub bootstrap: BootstrapConfig,
    pub grid: GridConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let streams: Vec<StreamName> = vec!["rgb".into(), "warped_optical_flow".into()];
        Self {
            source: None,
            default_weights: Weights::pinned(&streams[0], &streams[1], 1.5),
            streams,
            feature_name: "global_pool".into(),
            default_threshold: 0.8,
            near_miss: 0.5,
            ballast: 0.0,
            review_budget: 20,
            round_off_epsilon: 1e-5,
            missing_stream: MissingStreamPolicy::Exclude,
            seed: None,
            bootstrap: BootstrapConfig::default(),
            grid: GridConfig::default(),
        }
    }
}

/// Raw config as deserialized from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawConfig {
    streams: Option<Vec<String>>,
    feature_name: Option<String>,
    default_weights: Option<BTreeMap<String, f64>>,
    default_threshold: Option<f64>,
    near_miss: Option<f64>,
    ballast: Option<f64>,
    review_budget: Option<usize>,
    round_off_epsilon: Option<f64>,
    missing_stream: Option<MissingStreamPolicy>,
    seed: Option<u64>,
    bootstrap: Option<RawBootstrap>,
    grid: Option<RawGrid>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawBootstrap {
    mode: Option<BootstrapMode>,
    bags: Option<usize>,
    sample_fraction: Option<f64>,
    with_replacement: Option<bool>,
    memory: Option<f64>,
    /// `false` turns smoothing off regardless of `memory`.
    smoothing: Option<bool>,
    regularization: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawGrid {
    weight: Option<AxisSpec>,
    threshold: Option<AxisSpec>,
    refine_tolerance: Option<f64>,
}

impl EngineConfig {
    /// Load configuration for the given directory.
    ///
    /// Search order:
    /// 1. clipmatch.toml in directory
    /// 2. Walk up to the first parent holding clipmatch.toml
    /// 3. Default config if nothing found
    pub fn load(directory: &Path) -> Result<Self> {
        let mut current = Some(directory.to_path_buf());
        while let Some(dir) = current {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.is_file() {
                return Self::load_file(&candidate);
            }
            current = dir.parent().map(Path::to_path_buf);
        }
        Ok(Self::default())
    }

    /// Load and validate one config file.
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let raw: RawConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        let config = Self::from_raw(raw, Some(path.to_path_buf()));
        config
            .validate()
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Parse a config from TOML text (no file source).
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content).context("Failed to parse config")?;
        let config = Self::from_raw(raw, None);
        config.validate()?;
        Ok(config)
    }

    fn from_raw(raw: RawConfig, source: Option<PathBuf>) -> Self {
        let defaults = Self::default();
        let streams = raw.streams.unwrap_or(defaults.streams);

        let default_weights = match raw.default_weights {
            Some(map) => map.into_iter().collect(),
            None if streams.len() == 2 => Weights::pinned(&streams[0], &streams[1], 1.5),
            None => streams.iter().map(|s| (s.clone(), 1.0)).collect(),
        };

        let rb = raw.bootstrap.unwrap_or_default();
        let bd = defaults.bootstrap;
        let memory = match (rb.smoothing, rb.memory) {
            (Some(false), _) => None,
            (_, Some(m)) => Some(m),
            _ => bd.memory,
        };
        let bootstrap = BootstrapConfig {
            mode: rb.mode.unwrap_or(bd.mode),
            bags: rb.bags.unwrap_or(bd.bags),
            sample_fraction: rb.sample_fraction.unwrap_or(bd.sample_fraction),
            with_replacement: rb.with_replacement.unwrap_or(bd.with_replacement),
            memory,
            regularization: rb.regularization.unwrap_or(bd.regularization),
        };

        let rg = raw.grid.unwrap_or_default();
        let gd = defaults.grid;
        let grid = GridConfig {
            weight: rg.weight.unwrap_or(gd.weight),
            threshold: rg.threshold.unwrap_or(gd.threshold),
            refine_tolerance: rg.refine_tolerance.unwrap_or(gd.refine_tolerance),
        };

        Self {
            source,
            streams,
            feature_name: raw.feature_name.unwrap_or(defaults.feature_name),
            default_weights,
            default_threshold: raw.default_threshold.unwrap_or(defaults.default_threshold),
            near_miss: raw.near_miss.unwrap_or(defaults.near_miss),
            ballast: raw.ballast.unwrap_or(defaults.ballast),
            review_budget: raw.review_budget.unwrap_or(defaults.review_budget),
            round_off_epsilon: raw.round_off_epsilon.unwrap_or(defaults.round_off_epsilon),
            missing_stream: raw.missing_stream.unwrap_or(defaults.missing_stream),
            seed: raw.seed.or(defaults.seed),
            bootstrap,
            grid,
        }
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> EngineResult<()> {
        let bad = |msg: String| Err(EngineError::Config(msg));

        if self.streams.is_empty() {
            return bad("at least one stream is required".into());
        }
        if self.feature_name.trim().is_empty() {
            return bad("feature-name must not be empty".into());
        }
        for stream in &self.streams {
            match self.default_weights.get(stream) {
                Some(w) if w > 0.0 && w.is_finite() => {}
                Some(w) => return bad(format!("default weight for '{}' must be positive, got {}", stream, w)),
                None => return bad(format!("no default weight for stream '{}'", stream)),
            }
        }
        if !self.default_threshold.is_finite() || self.default_threshold > 1.0 {
            return bad(format!("default-threshold must be finite and <= 1, got {}", self.default_threshold));
        }
        if !(self.near_miss >= 0.0 && self.near_miss.is_finite()) {
            return bad(format!("near-miss must be >= 0, got {}", self.near_miss));
        }
        if !(self.ballast >= 0.0 && self.ballast.is_finite()) {
            return bad(format!("ballast must be >= 0, got {}", self.ballast));
        }
        if !(self.round_off_epsilon >= 0.0 && self.round_off_epsilon < 0.1) {
            return bad(format!("round-off-epsilon must be in [0, 0.1), got {}", self.round_off_epsilon));
        }

        let b = &self.bootstrap;
        if b.bags == 0 {
            return bad("bootstrap.bags must be at least 1".into());
        }
        if !(b.sample_fraction > 0.0 && b.sample_fraction <= 1.0) {
            return bad(format!("bootstrap.sample-fraction must be in (0, 1], got {}", b.sample_fraction));
        }
        if let Some(m) = b.memory {
            if !(0.0..=1.0).contains(&m) {
                return bad(format!("bootstrap.memory must be in [0, 1], got {}", m));
            }
        }
        if !(b.regularization > 0.0 && b.regularization.is_finite()) {
            return bad(format!("bootstrap.regularization must be positive, got {}", b.regularization));
        }

        for (name, axis) in [("weight", &self.grid.weight), ("threshold", &self.grid.threshold)] {
            if !(axis.step > 0.0 && axis.step.is_finite()) {
                return bad(format!("grid.{} step must be positive, got {}", name, axis.step));
            }
            if axis.len() < 1 {
                return bad(format!("grid.{} is empty ({} .. {})", name, axis.min, axis.max));
            }
        }
        if self.grid.weight.min <= 0.0 {
            return bad(format!("grid.weight must lie in positive reals, min is {}", self.grid.weight.min));
        }
        if !(self.grid.refine_tolerance > 0.0) {
            return bad("grid.refine-tolerance must be positive".into());
        }
        Ok(())
    }

    /// The stream whose weight is pinned at 1.0, if any stream is configured.
    pub fn reference_stream(&self) -> Option<&str> {
        self.streams.first().map(String::as_str)
    }

    /// Format config for verbose display.
    pub fn display_summary(&self) -> String {
        let mut lines = Vec::new();

        if let Some(ref source) = self.source {
            lines.push(format!("   Config: {}", source.display()));
        } else {
            lines.push("   Config: (defaults)".to_string());
        }
        let pinned = self
            .reference_stream()
            .map(|s| format!(", {} pinned at 1.0", s))
            .unwrap_or_default();
        lines.push(format!(
            "   Streams: {} ({}){}",
            self.streams.join(", "),
            self.feature_name,
            pinned
        ));
        lines.push(format!(
            "   Defaults: weights {}, threshold {:.3}, near-miss {:.2}, budget {}",
            self.default_weights, self.default_threshold, self.near_miss, self.review_budget
        ));

        let b = &self.bootstrap;
        let memory = b
            .memory
            .map(|m| format!("memory {:.2}", m))
            .unwrap_or_else(|| "no smoothing".to_string());
        lines.push(format!(
            "   Bootstrap: {} (bags {}, fraction {:.2}, {}, mu {})",
            b.mode.label(),
            b.bags,
            b.sample_fraction,
            memory,
            b.regularization
        ));
        lines.push(format!(
            "   Grid: weight {} x threshold {} ({} cells)",
            self.grid.weight,
            self.grid.threshold,
            self.grid.weight.len() * self.grid.threshold.len()
        ));
        if let Some(seed) = self.seed {
            lines.push(format!("   Seed: {}", seed));
        }

        lines.join("\n")
    }
}
