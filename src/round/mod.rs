//! One round of a query: bootstrap the target, score the search set, tune
//! parameters on feedback, select clips for review and persist them.
//!
//! ```text
//! pre-flight -> target -> similarities -> weights/threshold -> scores -> selection -> persist
//! ```
//!
//! [`RoundProcessor::run`] never fails because of the round itself. Engine
//! errors end up as notes on the query and an `Errored` state in the
//! returned [`RoundReport`]. Store writes are a different matter: nothing is
//! written until the selection is complete, and a write that then fails
//! (round, matches, notes or state) is returned as `Err`.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::bootstrap::TargetOrigin;
use crate::training::GridCell;
use crate::types::{
    ClipId, JobKind, MatchSelection, ProcessState, QueryId, RoundId, SelectionKind, Weights,
};

mod processor;

pub use processor::RoundProcessor;

/// What to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoundRequest {
    pub query: QueryId,
    pub job: JobKind,
    /// Overrides both the query's and the configured review budget.
    pub budget: Option<usize>,
}

impl RoundRequest {
    pub fn new(query: QueryId, job: JobKind) -> Self {
        Self {
            query,
            job,
            budget: None,
        }
    }

    pub fn with_budget(mut self, budget: usize) -> Self {
        self.budget = Some(budget);
        self
    }
}

/// How the round's weights and threshold were chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "source")]
pub enum ParameterSource {
    /// Configured defaults.
    Defaults,
    /// Fitted on the previous round's feedback.
    Optimized { grid_optimum: GridCell, refined: bool },
    /// Carried from the previous round; none of its reviewed clips was scored.
    Carried { round: u32 },
}

/// Display category of a selected clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchType {
    AlgorithmMatch,
    NearMiss,
    UserMatch,
    UserNonMatch,
    Reference,
}

impl MatchType {
    pub fn label(self) -> &'static str {
        match self {
            MatchType::AlgorithmMatch => "algorithm match",
            MatchType::NearMiss => "near miss",
            MatchType::UserMatch => "user-identified match",
            MatchType::UserNonMatch => "user-identified non-match",
            MatchType::Reference => "reference clip",
        }
    }
}

/// One line of the round report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReportRow {
    pub clip: ClipId,
    pub score: f64,
    pub match_type: MatchType,
}

/// Everything a successful round produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundOutcome {
    pub round_id: RoundId,
    pub round: u32,
    pub reference_clip: ClipId,
    pub weights: Weights,
    pub threshold: f64,
    pub near_miss: f64,
    pub lower_limit: f64,
    pub parameters: ParameterSource,
    pub target: TargetOrigin,
    /// Clips that received a score.
    pub scored: usize,
    pub selection: MatchSelection,
    /// Explicit verdicts persisted with the selection.
    pub verdicts: BTreeMap<ClipId, bool>,
    /// Review cycles before this round; the first round runs on defaults.
    pub reviews: u32,
    /// Clips the user judged in the previous round.
    pub last_reviewed: usize,
}

impl RoundOutcome {
    /// Selected clips with their display category, highest score first.
    pub fn rows(&self) -> Vec<ReportRow> {
        self.selection
            .ranked()
            .into_iter()
            .map(|(clip, selected)| {
                let match_type = match (self.verdicts.get(&clip), selected.kind) {
                    (Some(true), _) => MatchType::UserMatch,
                    (Some(false), _) => MatchType::UserNonMatch,
                    (None, SelectionKind::Match) => MatchType::AlgorithmMatch,
                    (None, SelectionKind::NearMiss) => MatchType::NearMiss,
                    (None, SelectionKind::Forced) if clip == self.reference_clip => MatchType::Reference,
                    (None, SelectionKind::Forced) if selected.score >= self.threshold => {
                        MatchType::AlgorithmMatch
                    }
                    (None, SelectionKind::Forced) => MatchType::NearMiss,
                };
                ReportRow {
                    clip,
                    score: selected.score,
                    match_type,
                }
            })
            .collect()
    }
}

/// Result of [`RoundProcessor::run`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundReport {
    pub query: QueryId,
    pub job: JobKind,
    pub state: ProcessState,
    pub outcome: Option<RoundOutcome>,
    /// The fatal error, if the round aborted.
    pub error: Option<String>,
    /// Notes appended to the query during this round.
    pub notes: Vec<String>,
    /// Every note on the query after this round, oldest first.
    pub history: Vec<String>,
}

impl RoundReport {
    pub fn is_errored(&self) -> bool {
        self.state == ProcessState::Errored
    }
}
