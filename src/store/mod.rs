//! Data access seams for the engine.
//!
//! The engine reads features and reviewed matches through [`FeatureStore`]
//! and writes results through [`RoundSink`]. Production code backs both with
//! the query service; [`MemoryStore`] backs them with a JSON fixture for
//! tests and for the command line.
//!
//! Record field names follow the service's API (`video_clip_id`,
//! `dnn_stream_id`, `dnn_stream_split`, ...) so that fixtures can be dumped
//! straight from it.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::EngineResult;
use crate::types::{
    CandidateIndex, ClipFeatures, ClipId, FeatureVector, MatchRecord, ProcessState, QueryId, RoundId,
    SearchSetId, SplitIndex, StreamName, StreamSplitMap,
};

mod memory;

pub use memory::{Fixture, MemoryStore, SearchSet, StoredMatch};

/// One feature vector as served by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub video_clip_id: ClipId,
    /// Stream name (the API calls it an id).
    pub dnn_stream_id: StreamName,
    pub dnn_stream_split: SplitIndex,
    /// Feature name, e.g. "global_pool".
    pub name: String,
    pub feature_vector: FeatureVector,
}

fn default_true() -> bool {
    true
}

/// A query as the engine needs to see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub id: QueryId,
    pub search_set: SearchSetId,
    /// Clip at the reference time; absent when the time lies outside the video.
    #[serde(default)]
    pub reference_clip: Option<ClipId>,
    /// Overrides the configured review budget.
    #[serde(default)]
    pub max_matches_for_review: Option<usize>,
    #[serde(default = "default_true")]
    pub dynamic_target_adjustment: bool,
}

/// One persisted round (the API's query result).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub id: RoundId,
    pub query: QueryId,
    pub round: u32,
    /// Match threshold the round used.
    #[serde(alias = "match_criterion")]
    pub threshold: f64,
    /// Weights in configured stream order.
    pub weights: Vec<f64>,
    #[serde(default)]
    pub bootstrapped_target: Option<StreamSplitMap>,
}

/// Read access to features, queries and past rounds.
pub trait FeatureStore {
    /// Features of one clip for the given streams and feature name.
    ///
    /// An unknown clip yields empty features, not an error.
    fn clip_features(&self, clip: ClipId, streams: &[StreamName], feature_name: &str)
    -> EngineResult<ClipFeatures>;

    /// Features of every clip in a search set, restricted to `splits`.
    fn candidate_features(
        &self,
        search_set: SearchSetId,
        streams: &[StreamName],
        splits: &BTreeSet<SplitIndex>,
        feature_name: &str,
    ) -> EngineResult<CandidateIndex>;

    /// Matches stored for a round, with any user verdicts.
    fn round_matches(&self, round: RoundId) -> EngineResult<Vec<MatchRecord>>;

    fn query(&self, query: QueryId) -> EngineResult<QueryRecord>;

    /// All rounds of a query in ascending round number.
    fn query_rounds(&self, query: QueryId) -> EngineResult<Vec<RoundRecord>>;

    /// Most recent round of a query.
    fn latest_round(&self, query: QueryId) -> EngineResult<Option<RoundRecord>> {
        Ok(self.query_rounds(query)?.into_iter().max_by_key(|r| r.round))
    }

    /// Explicit user verdicts over every round of a query; later rounds win.
    fn user_verdicts(&self, query: QueryId) -> EngineResult<BTreeMap<ClipId, bool>> {
        let mut verdicts = BTreeMap::new();
        for round in self.query_rounds(query)? {
            for m in self.round_matches(round.id)? {
                if let Some(v) = m.user_match {
                    verdicts.insert(m.clip_id, v);
                }
            }
        }
        Ok(verdicts)
    }

    /// Notes appended to a query so far, oldest first.
    fn query_notes(&self, query: QueryId) -> EngineResult<Vec<String>>;
}

/// Write access for round results and query status.
pub trait RoundSink {
    /// Store a round; returns its id.
    fn persist_round(
        &mut self,
        query: QueryId,
        round: u32,
        threshold: f64,
        weights: &[f64],
        target: &StreamSplitMap,
    ) -> EngineResult<RoundId>;

    /// Store one selected clip of a round.
    fn persist_match(&mut self, round: RoundId, clip: ClipId, score: f64, user_match: Option<bool>)
    -> EngineResult<()>;

    /// Append to the query's notes. Existing notes are never rewritten.
    fn append_note(&mut self, query: QueryId, note: &str) -> EngineResult<()>;

    fn set_process_state(&mut self, query: QueryId, state: ProcessState) -> EngineResult<()>;
}
