use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use tracing::{debug, error, info, warn};

use super::{ParameterSource, RoundOutcome, RoundReport, RoundRequest};
use crate::bootstrap::{BootstrapInput, Target, TargetBootstrapper};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::scoring::{MatchSelector, compute_scores, finalize_near_miss};
use crate::similarity::compute_similarities;
use crate::store::{FeatureStore, QueryRecord, RoundRecord, RoundSink};
use crate::training::HyperparameterOptimizer;
use crate::types::{
    ClipFeatures, ClipId, Feedback, JobKind, MatchRecord, MatchSelection, ProcessState, QueryId,
    SelectionKind, SimilarityResult, Weights,
};

/// Runs rounds against a store with one immutable configuration.
pub struct RoundProcessor<'a> {
    config: &'a EngineConfig,
}

/// What the pre-flight checks established.
struct Preflight {
    query: QueryRecord,
    reference_clip: ClipId,
    /// Number of the round about to run.
    round: u32,
    previous: Option<(RoundRecord, Vec<MatchRecord>)>,
    /// Explicit verdicts over every earlier round.
    verdicts: BTreeMap<ClipId, bool>,
    adjust_target: bool,
}

/// A scored and selected round that is not stored yet.
struct PendingRound {
    query: QueryId,
    round: u32,
    reference_clip: ClipId,
    weights: Weights,
    /// `weights` in configured stream order, as stored.
    stored_weights: Vec<f64>,
    threshold: f64,
    near_miss: f64,
    lower_limit: f64,
    parameters: ParameterSource,
    target: Target,
    scored: usize,
    selection: MatchSelection,
    /// Explicit verdicts over every earlier round.
    verdicts: BTreeMap<ClipId, bool>,
    last_reviewed: usize,
}

impl<'a> RoundProcessor<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Run one round and record its state and notes on the query.
    ///
    /// # Errors
    /// Only store write failures. Engine errors are reported through the
    /// returned [`RoundReport`]. A write that fails while the round is
    /// being persisted leaves the query `Errored` if the store still
    /// accepts the state change.
    pub fn run<S, R>(&self, store: &mut S, request: &RoundRequest, rng: &mut R) -> EngineResult<RoundReport>
    where
        S: FeatureStore + RoundSink,
        R: Rng + ?Sized,
    {
        info!(query = request.query, job = request.job.label(), "processing round");
        store.set_process_state(request.query, ProcessState::Processing)?;

        let mut notes = Vec::new();
        let result = self.execute(&*store, request, rng, &mut notes);

        let (state, outcome, error) = match result {
            Ok(pending) => {
                let outcome = match persist(store, pending) {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!(query = request.query, error = %e, "failed to persist round");
                        let marked = store.set_process_state(request.query, ProcessState::Errored);
                        if let Err(state_err) = marked {
                            warn!(query = request.query, error = %state_err, "failed to mark query errored");
                        }
                        return Err(e);
                    }
                };
                notes.push(summary_note(&outcome));
                let state = if request.job == JobKind::Finalize {
                    ProcessState::Finalized
                } else {
                    ProcessState::Completed
                };
                (state, Some(outcome), None)
            }
            Err(e) => {
                warn!(query = request.query, error = %e, "round failed");
                notes.push(e.note());
                (ProcessState::Errored, None, Some(e.to_string()))
            }
        };

        for note in &notes {
            store.append_note(request.query, note)?;
        }
        store.set_process_state(request.query, state)?;
        let history = store.query_notes(request.query)?;

        Ok(RoundReport {
            query: request.query,
            job: request.job,
            state,
            outcome,
            error,
            notes,
            history,
        })
    }

    /// Everything up to and including the selection. Reads only.
    fn execute<S, R>(
        &self,
        store: &S,
        request: &RoundRequest,
        rng: &mut R,
        notes: &mut Vec<String>,
    ) -> EngineResult<PendingRound>
    where
        S: FeatureStore,
        R: Rng + ?Sized,
    {
        let config = self.config;
        let pre = self.preflight(store, request, notes)?;
        let round = pre.round;

        let reference = store.clip_features(pre.reference_clip, &config.streams, &config.feature_name)?;
        if reference.is_empty() {
            return Err(EngineError::MissingReferenceFeatures {
                clip: pre.reference_clip,
                feature_name: config.feature_name.clone(),
            });
        }

        let target = self.target(store, &pre, &reference, rng)?;
        let candidates = store.candidate_features(
            pre.query.search_set,
            &config.streams,
            &target.splits(),
            &config.feature_name,
        )?;
        let similarities = compute_similarities(&target.features, &candidates)?;
        debug!(round, candidates = similarities.len(), "similarities computed");

        let (weights, threshold, parameters) = self.parameters(&pre, &similarities)?;
        let scores = compute_scores(&similarities, &weights, config.missing_stream)?;

        let selector = match request.job {
            JobKind::Finalize => {
                let feedback: BTreeMap<ClipId, Feedback> = pre
                    .verdicts
                    .iter()
                    .filter(|(_, v)| **v)
                    .map(|(c, _)| (*c, Feedback::Confirmed))
                    .collect();
                let nm = finalize_near_miss(threshold, &scores, &feedback, config.round_off_epsilon);
                MatchSelector::finalize(threshold, nm)
            }
            JobKind::New | JobKind::Revise => {
                let budget = request
                    .budget
                    .or(pre.query.max_matches_for_review)
                    .unwrap_or(config.review_budget);
                MatchSelector::review(threshold, config.near_miss, budget)
            }
        };

        let mut forced: BTreeSet<ClipId> = pre.verdicts.keys().copied().collect();
        forced.insert(pre.reference_clip);
        let selection = selector.select(&scores, &forced, round, rng)?;

        let last_reviewed = pre.previous.as_ref().map_or(0, |(_, matches)| {
            matches.iter().filter(|m| m.feedback().is_explicit()).count()
        });

        Ok(PendingRound {
            query: pre.query.id,
            round,
            reference_clip: pre.reference_clip,
            stored_weights: weights.ordered(&config.streams),
            weights,
            threshold,
            near_miss: selector.near_miss,
            lower_limit: selector.lower_limit(),
            parameters,
            target,
            scored: scores.len(),
            selection,
            verdicts: pre.verdicts,
            last_reviewed,
        })
    }

    fn preflight<S: FeatureStore>(
        &self,
        store: &S,
        request: &RoundRequest,
        notes: &mut Vec<String>,
    ) -> EngineResult<Preflight> {
        let query = store.query(request.query)?;
        let Some(reference_clip) = query.reference_clip else {
            return Err(EngineError::MissingReferenceClip);
        };

        let latest = store.latest_round(query.id)?;
        let round = latest.as_ref().map_or(1, |r| r.round + 1);
        let previous = match request.job {
            JobKind::New => None,
            JobKind::Revise | JobKind::Finalize => {
                let Some(last) = latest else {
                    return Err(EngineError::NoPreviousRound);
                };
                let matches = store.round_matches(last.id)?;
                if matches.is_empty() {
                    return Err(EngineError::NoPreviousMatches { round_id: last.id });
                }
                Some((last, matches))
            }
        };

        let verdicts = store.user_verdicts(query.id)?;

        let mut adjust_target = previous.is_some()
            && query.dynamic_target_adjustment
            && self.config.bootstrap.mode.is_enabled();
        if let Some((_, matches)) = &previous {
            let confirmed = matches
                .iter()
                .any(|m| m.feedback() == Feedback::Confirmed);
            if adjust_target && !confirmed {
                let e = EngineError::NoConfirmedMatches;
                warn!(query = query.id, "{}", e);
                notes.push(e.note());
                adjust_target = false;
            }
        }

        Ok(Preflight {
            query,
            reference_clip,
            round,
            previous,
            verdicts,
            adjust_target,
        })
    }

    fn target<S: FeatureStore, R: Rng + ?Sized>(
        &self,
        store: &S,
        pre: &Preflight,
        reference: &ClipFeatures,
        rng: &mut R,
    ) -> EngineResult<Target> {
        let mut matches = Vec::new();
        let mut nonmatches = Vec::new();
        if pre.adjust_target {
            for (&clip, &verdict) in &pre.verdicts {
                let features = store.clip_features(clip, &self.config.streams, &self.config.feature_name)?;
                if features.is_empty() {
                    debug!(clip, "reviewed clip has no features, skipped");
                    continue;
                }
                if verdict {
                    matches.push(features);
                } else {
                    nonmatches.push(features);
                }
            }
        }

        let previous = pre
            .previous
            .as_ref()
            .and_then(|(round, _)| round.bootstrapped_target.as_ref());
        let input = BootstrapInput {
            reference,
            matches: &matches,
            nonmatches: &nonmatches,
            previous,
        };
        TargetBootstrapper::new(&self.config.bootstrap).bootstrap(&input, rng)
    }

    fn parameters(
        &self,
        pre: &Preflight,
        similarities: &SimilarityResult,
    ) -> EngineResult<(Weights, f64, ParameterSource)> {
        let config = self.config;
        let Some((previous, matches)) = pre.previous.as_ref() else {
            return Ok((
                config.default_weights.clone(),
                config.default_threshold,
                ParameterSource::Defaults,
            ));
        };

        let feedback: BTreeMap<ClipId, Feedback> = matches
            .iter()
            .filter(|m| similarities.contains_key(&m.clip_id))
            .map(|m| (m.clip_id, m.feedback()))
            .collect();

        if feedback.is_empty() {
            if previous.weights.len() != config.streams.len() {
                return Err(EngineError::Store(format!(
                    "round {} stores {} weights for {} configured streams",
                    previous.id,
                    previous.weights.len(),
                    config.streams.len()
                )));
            }
            let weights: Weights = config
                .streams
                .iter()
                .cloned()
                .zip(previous.weights.iter().copied())
                .collect();
            debug!(round = previous.round, "no scored feedback, carrying parameters");
            return Ok((
                weights,
                previous.threshold,
                ParameterSource::Carried {
                    round: previous.round,
                },
            ));
        }

        let params = HyperparameterOptimizer::new(config).optimize(similarities, &feedback)?;
        Ok((
            params.weights,
            params.threshold,
            ParameterSource::Optimized {
                grid_optimum: params.grid_optimum,
                refined: params.refined,
            },
        ))
    }
}

/// Store the round and its selection, carrying earlier verdicts onto the
/// clips that were selected again.
fn persist<S>(store: &mut S, pending: PendingRound) -> EngineResult<RoundOutcome>
where
    S: RoundSink + ?Sized,
{
    let round_id = store.persist_round(
        pending.query,
        pending.round,
        pending.threshold,
        &pending.stored_weights,
        &pending.target.features,
    )?;
    let mut verdicts = BTreeMap::new();
    for (&clip, selected) in &pending.selection.entries {
        let verdict = pending.verdicts.get(&clip).copied();
        store.persist_match(round_id, clip, selected.score, verdict)?;
        if let Some(v) = verdict {
            verdicts.insert(clip, v);
        }
    }
    debug!(round_id, selected = pending.selection.len(), "round persisted");

    Ok(RoundOutcome {
        round_id,
        round: pending.round,
        reference_clip: pending.reference_clip,
        weights: pending.weights,
        threshold: pending.threshold,
        near_miss: pending.near_miss,
        lower_limit: pending.lower_limit,
        parameters: pending.parameters,
        target: pending.target.origin,
        scored: pending.scored,
        selection: pending.selection,
        verdicts,
        reviews: pending.round.saturating_sub(1),
        last_reviewed: pending.last_reviewed,
    })
}

fn summary_note(outcome: &RoundOutcome) -> String {
    format!(
        "Round {}: {} matches, {} near misses, {} forced of {} scored clips (threshold {:.4}, weights {}, target {})",
        outcome.round,
        outcome.selection.count(SelectionKind::Match),
        outcome.selection.count(SelectionKind::NearMiss),
        outcome.selection.count(SelectionKind::Forced),
        outcome.scored,
        outcome.threshold,
        outcome.weights,
        outcome.target.label()
    )
}
