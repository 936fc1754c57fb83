//! Error types for the matching engine.
//!
//! Every failure a round can hit is one variant of [`EngineError`]. The
//! round processor turns them into notes on the query record; nothing here
//! panics the host process.

use thiserror::Error;

use crate::types::{ClipId, RoundId, SplitIndex};

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// How a failure affects the round that raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The round is aborted and marked errored.
    Fatal,
    /// The round continues with a corrected setting.
    Recoverable,
}

/// Errors that can occur while computing a round.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The query has no reference clip (reference time outside the video).
    #[error("a video clip corresponding to the reference time does not exist")]
    MissingReferenceClip,

    /// The reference clip exists but has no feature vectors for the configured streams.
    #[error("reference clip {clip} has no '{feature_name}' features for the configured streams")]
    MissingReferenceFeatures { clip: ClipId, feature_name: String },

    /// A matrix that must be inverted is singular or too ill-conditioned.
    #[error("singular matrix in {stage} for stream '{stream}' split {split} (rcond {rcond:.3e})")]
    SingularMatrix {
        stage: &'static str,
        stream: String,
        split: SplitIndex,
        rcond: f64,
    },

    /// Two vectors that must be combined have different lengths.
    #[error("dimension mismatch for stream '{stream}' split {split}: expected {expected}, got {actual}")]
    DimensionMismatch {
        stream: String,
        split: SplitIndex,
        expected: usize,
        actual: usize,
    },

    /// A feature vector with zero norm cannot be scaled into a target.
    #[error("feature vector for stream '{stream}' split {split} has zero norm")]
    ZeroNormFeature { stream: String, split: SplitIndex },

    /// Non-match features whose Gram trace vanishes cannot set the ridge scale.
    #[error("non-match features for stream '{stream}' split {split} are all zero")]
    DegenerateNonMatches { stream: String, split: SplitIndex },

    /// Strict scoring found a clip without a similarity for a weighted stream.
    #[error("clip {clip} has no similarity for weighted stream '{stream}'")]
    MissingStream { clip: ClipId, stream: String },

    /// The closed-form optimizer only handles a reference stream plus one free stream.
    #[error("weight optimization needs exactly 2 streams, configured {0}")]
    UnsupportedStreamCount(usize),

    /// The optimizer was handed an empty feedback set.
    #[error("no user feedback to optimize against")]
    NoFeedback,

    /// Nothing scored inside the match or near-miss range and nothing was forced in.
    #[error("no matches found for round {round}")]
    NoMatches { round: u32 },

    /// A revise or finalize job arrived without a previous round.
    #[error("this is not a new query but no previous round exists")]
    NoPreviousRound,

    /// The previous round has no match records to learn from.
    #[error("this is not a new query but there are 0 matches computed for round {round_id}; cannot update without matches")]
    NoPreviousMatches { round_id: RoundId },

    /// Dynamic target adjustment requested, but the user confirmed nothing.
    #[error("dynamic target adjustment requested but no user-confirmed matches exist for the previous round; disabling it for this round")]
    NoConfirmedMatches,

    /// The configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A data-access collaborator failed.
    #[error("store error: {0}")]
    Store(String),
}

impl EngineError {
    /// Create a store error from any displayable error.
    pub fn store<E: std::fmt::Display>(e: E) -> Self {
        Self::Store(e.to_string())
    }

    /// Whether this failure aborts the round or is corrected in place.
    pub fn severity(&self) -> Severity {
        match self {
            EngineError::NoConfirmedMatches => Severity::Recoverable,
            _ => Severity::Fatal,
        }
    }

    /// Note text for the query's audit log.
    pub fn note(&self) -> String {
        match self.severity() {
            Severity::Fatal => format!("*** Fatal Error: {} ***", self),
            Severity::Recoverable => format!("*** Error: {} ***", self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_classification() {
        assert_eq!(EngineError::NoConfirmedMatches.severity(), Severity::Recoverable);
        assert_eq!(EngineError::MissingReferenceClip.severity(), Severity::Fatal);
        assert_eq!(EngineError::NoMatches { round: 2 }.severity(), Severity::Fatal);
    }

    #[test]
    fn test_no_matches_message_names_round() {
        let err = EngineError::NoMatches { round: 4 };
        assert_eq!(err.to_string(), "no matches found for round 4");
        assert!(err.note().starts_with("*** Fatal Error"));
    }
}
