//! In-memory store loaded from a JSON fixture.
//!
//! Expected format:
//! ```json
//! {
//!   "queries": [{ "id": 1, "search_set": 1, "reference_clip": 10 }],
//!   "search_sets": [{ "id": 1, "clips": [10, 11, 12] }],
//!   "features": [
//!     { "video_clip_id": 10, "dnn_stream_id": "rgb", "dnn_stream_split": 1,
//!       "name": "global_pool", "feature_vector": [0.1, 0.2] }
//!   ],
//!   "rounds": [],
//!   "matches": []
//! }
//! ```
//!
//! Every section is optional. Rounds and matches written by the engine are
//! appended, so a store saved after one round is the fixture for the next.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::{FeatureRecord, FeatureStore, QueryRecord, RoundRecord, RoundSink};
use crate::error::{EngineError, EngineResult};
use crate::types::{
    CandidateIndex, ClipFeatures, ClipId, MatchRecord, ProcessState, QueryId, RoundId, SearchSetId,
    SplitIndex, StreamName, StreamSplitMap,
};

/// Clips making up a search set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSet {
    pub id: SearchSetId,
    pub clips: Vec<ClipId>,
}

/// A match row as stored by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMatch {
    pub query_result: RoundId,
    pub video_clip: ClipId,
    pub score: f64,
    #[serde(default)]
    pub user_match: Option<bool>,
    #[serde(default)]
    pub is_match: bool,
}

impl StoredMatch {
    fn record(&self) -> MatchRecord {
        MatchRecord {
            clip_id: self.video_clip,
            score: self.score,
            user_match: self.user_match,
            is_match: self.is_match,
        }
    }
}

/// Serialized form of a [`MemoryStore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fixture {
    pub queries: Vec<QueryRecord>,
    pub search_sets: Vec<SearchSet>,
    pub features: Vec<FeatureRecord>,
    pub rounds: Vec<RoundRecord>,
    pub matches: Vec<StoredMatch>,
    pub notes: BTreeMap<QueryId, Vec<String>>,
    pub process_states: BTreeMap<QueryId, ProcessState>,
}

/// [`FeatureStore`] and [`RoundSink`] over plain collections.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    fixture: Fixture,
    /// clip -> indices into `fixture.features`
    by_clip: BTreeMap<ClipId, Vec<usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: Fixture) -> Self {
        let mut store = Self {
            fixture,
            by_clip: BTreeMap::new(),
        };
        store.reindex();
        store
    }

    /// Load a fixture file.
    pub fn from_fixture_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture {}", path.display()))?;
        Self::from_json_str(&content).with_context(|| format!("Invalid fixture {}", path.display()))
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let fixture: Fixture = serde_json::from_str(content).context("Failed to parse fixture JSON")?;
        Ok(Self::from_fixture(fixture))
    }

    /// Write the current state (including persisted rounds) as a fixture.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.fixture).context("Failed to serialize store")?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn fixture(&self) -> &Fixture {
        &self.fixture
    }

    fn reindex(&mut self) {
        self.by_clip.clear();
        for (i, f) in self.fixture.features.iter().enumerate() {
            self.by_clip.entry(f.video_clip_id).or_default().push(i);
        }
    }

    pub fn add_feature(&mut self, record: FeatureRecord) {
        self.by_clip
            .entry(record.video_clip_id)
            .or_default()
            .push(self.fixture.features.len());
        self.fixture.features.push(record);
    }

    pub fn add_query(&mut self, query: QueryRecord) {
        self.fixture.queries.push(query);
    }

    pub fn add_search_set(&mut self, id: SearchSetId, clips: Vec<ClipId>) {
        self.fixture.search_sets.push(SearchSet { id, clips });
    }

    /// Record a user verdict on a stored match, as the review UI does.
    pub fn set_user_match(&mut self, round: RoundId, clip: ClipId, verdict: Option<bool>) -> EngineResult<()> {
        let Some(m) = self
            .fixture
            .matches
            .iter_mut()
            .find(|m| m.query_result == round && m.video_clip == clip)
        else {
            return Err(EngineError::Store(format!("no match for clip {} in round {}", clip, round)));
        };
        m.user_match = verdict;
        Ok(())
    }

    /// Notes of a query, oldest first.
    pub fn notes(&self, query: QueryId) -> &[String] {
        self.fixture.notes.get(&query).map_or(&[], Vec::as_slice)
    }

    pub fn process_state(&self, query: QueryId) -> Option<ProcessState> {
        self.fixture.process_states.get(&query).copied()
    }

    fn clip_records(&self, clip: ClipId) -> impl Iterator<Item = &FeatureRecord> {
        self.by_clip
            .get(&clip)
            .into_iter()
            .flatten()
            .map(|&i| &self.fixture.features[i])
    }
}

impl FeatureStore for MemoryStore {
    fn clip_features(
        &self,
        clip: ClipId,
        streams: &[StreamName],
        feature_name: &str,
    ) -> EngineResult<ClipFeatures> {
        let mut out = ClipFeatures::default();
        for record in self.clip_records(clip) {
            if record.name != feature_name || !streams.contains(&record.dnn_stream_id) {
                continue;
            }
            out.splits.insert(record.dnn_stream_split);
            out.features
                .entry(record.dnn_stream_id.clone())
                .or_default()
                .insert(record.dnn_stream_split, record.feature_vector.clone());
        }
        Ok(out)
    }

    fn candidate_features(
        &self,
        search_set: SearchSetId,
        streams: &[StreamName],
        splits: &BTreeSet<SplitIndex>,
        feature_name: &str,
    ) -> EngineResult<CandidateIndex> {
        let Some(set) = self.fixture.search_sets.iter().find(|s| s.id == search_set) else {
            return Err(EngineError::Store(format!("unknown search set {}", search_set)));
        };

        let mut index = CandidateIndex::new();
        for &clip in &set.clips {
            for record in self.clip_records(clip) {
                if record.name != feature_name
                    || !streams.contains(&record.dnn_stream_id)
                    || !splits.contains(&record.dnn_stream_split)
                {
                    continue;
                }
                index
                    .entry(record.dnn_stream_id.clone())
                    .or_default()
                    .entry(record.dnn_stream_split)
                    .or_default()
                    .insert(clip, record.feature_vector.clone());
            }
        }
        Ok(index)
    }

    fn round_matches(&self, round: RoundId) -> EngineResult<Vec<MatchRecord>> {
        Ok(self
            .fixture
            .matches
            .iter()
            .filter(|m| m.query_result == round)
            .map(StoredMatch::record)
            .collect())
    }

    fn query(&self, query: QueryId) -> EngineResult<QueryRecord> {
        self.fixture
            .queries
            .iter()
            .find(|q| q.id == query)
            .cloned()
            .ok_or_else(|| EngineError::Store(format!("unknown query {}", query)))
    }

    fn query_rounds(&self, query: QueryId) -> EngineResult<Vec<RoundRecord>> {
        let mut rounds: Vec<_> = self
            .fixture
            .rounds
            .iter()
            .filter(|r| r.query == query)
            .cloned()
            .collect();
        rounds.sort_by_key(|r| r.round);
        Ok(rounds)
    }

    fn query_notes(&self, query: QueryId) -> EngineResult<Vec<String>> {
        Ok(self.notes(query).to_vec())
    }
}

impl RoundSink for MemoryStore {
    fn persist_round(
        &mut self,
        query: QueryId,
        round: u32,
        threshold: f64,
        weights: &[f64],
        target: &StreamSplitMap,
    ) -> EngineResult<RoundId> {
        let id = self.fixture.rounds.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        self.fixture.rounds.push(RoundRecord {
            id,
            query,
            round,
            threshold,
            weights: weights.to_vec(),
            bootstrapped_target: Some(target.clone()),
        });
        Ok(id)
    }

    fn persist_match(
        &mut self,
        round: RoundId,
        clip: ClipId,
        score: f64,
        user_match: Option<bool>,
    ) -> EngineResult<()> {
        let Some(record) = self.fixture.rounds.iter().find(|r| r.id == round) else {
            return Err(EngineError::Store(format!("unknown round {}", round)));
        };
        let is_match = score >= record.threshold;
        self.fixture.matches.push(StoredMatch {
            query_result: round,
            video_clip: clip,
            score,
            user_match,
            is_match,
        });
        Ok(())
    }

    fn append_note(&mut self, query: QueryId, note: &str) -> EngineResult<()> {
        self.fixture
            .notes
            .entry(query)
            .or_default()
            .push(note.to_string());
        Ok(())
    }

    fn set_process_state(&mut self, query: QueryId, state: ProcessState) -> EngineResult<()> {
        self.fixture.process_states.insert(query, state);
        Ok(())
    }
}
