//! clipmatch - feedback-tuned video clip retrieval over ensemble embeddings
//!
//! A query names a reference clip and a search set. Each round scores every
//! clip in the search set against a target built from the reference (and,
//! after review, from the clips the user confirmed or rejected), then picks
//! a budgeted mix of matches and near misses for the next review.
//!
//! # Architecture
//!
//! ```text
//! FeatureStore → TargetBootstrapper → Similarities → Optimizer → Scores → MatchSelector → RoundSink
//!      ↓               ↓                   ↓             ↓          ↓           ↓
//!  fixtures /      nalgebra fits      split-averaged   rayon      weighted    seeded
//!   service        + bagging          dot products     grid       RMS          rand
//! ```
//!
//! [`round::RoundProcessor`] drives one round end to end.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod rendering;
pub mod round;
pub mod scoring;
pub mod similarity;
pub mod store;
pub mod training;
pub mod types;

// Re-export core types
pub use types::{
    CandidateIndex, ClipFeatures, ClipId, Feedback, JobKind, MatchRecord, MatchSelection,
    ProcessState, Scores, SelectionKind, SimilarityResult, StreamSplitMap, Weights,
};

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use round::{RoundProcessor, RoundReport, RoundRequest};
pub use store::{FeatureStore, MemoryStore, RoundSink};
