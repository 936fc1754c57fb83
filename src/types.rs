//! Core types for clipmatch.
//!
//! A clip's embedding is a two-level map: stream name -> split index ->
//! feature vector. Splits are independently trained members of one stream's
//! ensemble; everything downstream averages over them. Keyed maps are
//! `BTreeMap` so that iteration order (and therefore seeded sampling) is
//! stable across runs.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Primary key of a video clip.
pub type ClipId = i64;
/// Primary key of a persisted round (query result).
pub type RoundId = i64;
/// Primary key of a query.
pub type QueryId = i64;
/// Primary key of a search set.
pub type SearchSetId = i64;
/// Ensemble member index within one stream.
pub type SplitIndex = u32;
/// Stream name, e.g. "rgb" or "warped_optical_flow".
pub type StreamName = String;

/// One embedding. Fixed length per (stream, feature name).
pub type FeatureVector = Vec<f64>;
/// split -> vector for one stream.
pub type SplitFeatures = BTreeMap<SplitIndex, FeatureVector>;
/// stream -> split -> vector for one clip (or for the target).
pub type StreamSplitMap = BTreeMap<StreamName, SplitFeatures>;
/// stream -> split -> clip -> vector for a whole search set.
pub type CandidateIndex =
    BTreeMap<StreamName, BTreeMap<SplitIndex, BTreeMap<ClipId, FeatureVector>>>;

/// Ensemble-averaged similarity of one clip under one stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamSimilarity {
    /// Arithmetic mean over contributing splits.
    pub mean: f64,
    /// Number of splits that contributed (always >= 1).
    pub ensemble_size: usize,
}

/// stream -> averaged similarity for one clip.
pub type ClipSimilarities = BTreeMap<StreamName, StreamSimilarity>;
/// clip -> stream -> averaged similarity.
pub type SimilarityResult = BTreeMap<ClipId, ClipSimilarities>;
/// clip -> match score in (-inf, 1].
pub type Scores = BTreeMap<ClipId, f64>;

/// Features of one clip plus the splits that appeared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClipFeatures {
    pub features: StreamSplitMap,
    pub splits: BTreeSet<SplitIndex>,
}

impl ClipFeatures {
    pub fn is_empty(&self) -> bool {
        self.features.values().all(|splits| splits.is_empty())
    }
}

/// Per-stream weights for the score function.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Weights(BTreeMap<StreamName, f64>);

impl Weights {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Reference stream pinned at 1.0, one free stream at `weight`.
    pub fn pinned(reference: &str, other: &str, weight: f64) -> Self {
        let mut map = BTreeMap::new();
        map.insert(reference.to_string(), 1.0);
        map.insert(other.to_string(), weight);
        Self(map)
    }

    pub fn with(mut self, stream: &str, weight: f64) -> Self {
        self.0.insert(stream.to_string(), weight);
        self
    }

    pub fn get(&self, stream: &str) -> Option<f64> {
        self.0.get(stream).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StreamName, &f64)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Weights listed in the given stream order (missing streams as 0.0),
    /// the shape the round record stores.
    pub fn ordered(&self, streams: &[StreamName]) -> Vec<f64> {
        streams
            .iter()
            .map(|s| self.get(s).unwrap_or(0.0))
            .collect()
    }
}

impl FromIterator<(StreamName, f64)> for Weights {
    fn from_iter<I: IntoIterator<Item = (StreamName, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Weights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<_> = self.0.iter().map(|(s, w)| format!("{}={:.3}", s, w)).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// User verdict on a reviewed clip.
///
/// Explicit verdicts come from the review UI. Clips the user did not judge
/// inherit the algorithm's own call from the round that surfaced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Feedback {
    Confirmed,
    Rejected,
    Inferred(bool),
}

impl Feedback {
    pub fn from_record(user_match: Option<bool>, is_match: bool) -> Self {
        match user_match {
            Some(true) => Feedback::Confirmed,
            Some(false) => Feedback::Rejected,
            None => Feedback::Inferred(is_match),
        }
    }

    /// 0/1 indicator used by the loss function.
    pub fn indicator(self) -> f64 {
        match self {
            Feedback::Confirmed | Feedback::Inferred(true) => 1.0,
            Feedback::Rejected | Feedback::Inferred(false) => 0.0,
        }
    }

    pub fn is_explicit(self) -> bool {
        matches!(self, Feedback::Confirmed | Feedback::Rejected)
    }
}

/// One stored match of a previous round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    #[serde(alias = "video_clip")]
    pub clip_id: ClipId,
    #[serde(default)]
    pub score: f64,
    /// Explicit user verdict, if the user reviewed the clip.
    #[serde(default)]
    pub user_match: Option<bool>,
    /// Algorithm verdict at the time the match was stored.
    #[serde(default)]
    pub is_match: bool,
}

impl MatchRecord {
    pub fn feedback(&self) -> Feedback {
        Feedback::from_record(self.user_match, self.is_match)
    }
}

/// Why a clip is in a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionKind {
    /// Scored at or above the threshold.
    Match,
    /// Scored in [lower_limit, threshold).
    NearMiss,
    /// Included by rule rather than sampling (reference clip, reviewed clips).
    Forced,
}

/// A selected clip and its score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectedClip {
    pub score: f64,
    pub kind: SelectionKind,
}

/// The clip set handed to persistence at the end of a round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchSelection {
    pub entries: BTreeMap<ClipId, SelectedClip>,
}

impl MatchSelection {
    pub fn insert(&mut self, clip: ClipId, score: f64, kind: SelectionKind) {
        self.entries.insert(clip, SelectedClip { score, kind });
    }

    pub fn contains(&self, clip: ClipId) -> bool {
        self.entries.contains_key(&clip)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, kind: SelectionKind) -> usize {
        self.entries.values().filter(|s| s.kind == kind).count()
    }

    pub fn scores(&self) -> Scores {
        self.entries.iter().map(|(c, s)| (*c, s.score)).collect()
    }

    /// Entries sorted by descending score.
    pub fn ranked(&self) -> Vec<(ClipId, SelectedClip)> {
        let mut rows: Vec<_> = self.entries.iter().map(|(c, s)| (*c, *s)).collect();
        rows.sort_by(|a, b| {
            b.1.score
                .partial_cmp(&a.1.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        rows
    }
}

/// Kind of update a round performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// First round, default weights and threshold.
    New,
    /// Later round, parameters tuned on the previous round's feedback.
    Revise,
    /// Final report: unbounded budget, all user-confirmed matches kept.
    Finalize,
}

impl JobKind {
    pub fn label(self) -> &'static str {
        match self {
            JobKind::New => "new",
            JobKind::Revise => "revise",
            JobKind::Finalize => "finalize",
        }
    }
}

impl std::str::FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "new" => Ok(JobKind::New),
            "revise" => Ok(JobKind::Revise),
            "finalize" => Ok(JobKind::Finalize),
            other => Err(format!("unknown job kind '{}': expected new, revise or finalize", other)),
        }
    }
}

/// Processing state of a query as seen by the review UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    Processing,
    Completed,
    Finalized,
    Errored,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feedback_conversion_rule() {
        assert_eq!(Feedback::from_record(Some(true), false).indicator(), 1.0);
        // An explicit rejection wins over the algorithm's own call.
        assert_eq!(Feedback::from_record(Some(false), true).indicator(), 0.0);
        assert_eq!(Feedback::from_record(None, true).indicator(), 1.0);
        assert_eq!(Feedback::from_record(None, false).indicator(), 0.0);
        assert!(!Feedback::Inferred(true).is_explicit());
        assert!(Feedback::Rejected.is_explicit());
    }

    #[test]
    fn test_weights_ordered_by_streams() {
        let w = Weights::pinned("rgb", "warped_optical_flow", 1.5);
        let streams = vec!["rgb".to_string(), "warped_optical_flow".to_string(), "audio".to_string()];
        assert_eq!(w.ordered(&streams), vec![1.0, 1.5, 0.0]);
    }

    #[test]
    fn test_selection_ranked_descending() {
        let mut sel = MatchSelection::default();
        sel.insert(1, 0.5, SelectionKind::NearMiss);
        sel.insert(2, 0.9, SelectionKind::Match);
        sel.insert(3, 0.7, SelectionKind::Forced);
        let order: Vec<_> = sel.ranked().into_iter().map(|(c, _)| c).collect();
        assert_eq!(order, vec![2, 3, 1]);
        assert_eq!(sel.count(SelectionKind::Match), 1);
    }

    #[test]
    fn test_job_kind_parse() {
        assert_eq!("Revise".parse::<JobKind>().unwrap(), JobKind::Revise);
        assert!("other".parse::<JobKind>().is_err());
    }

    #[test]
    fn test_match_record_accepts_api_field_name() {
        let json = r#"{"video_clip": 7, "score": 0.9, "user_match": null, "is_match": true}"#;
        let rec: MatchRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.clip_id, 7);
        assert_eq!(rec.feedback(), Feedback::Inferred(true));
    }
}
