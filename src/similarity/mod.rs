//! Ensemble similarity between a target and a search set.
//!
//! For every stream in the target and every split in that stream, the
//! target vector is dotted against each candidate vector of the same
//! (stream, split). Per-clip results are then averaged over the splits that
//! contributed. The target is pre-scaled by 1/(f·f), so a clip identical to
//! the reference scores exactly 1.0.

mod ensemble;

pub use ensemble::{SimilarityAccumulator, compute_similarities, dot};
