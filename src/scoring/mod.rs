//! Match scores and review selection.
//!
//! # Score
//!
//! ```text
//! score(c) = 1 - sqrt( sum_s [w_s (1 - sim_s(c))]^2 / sum_s w_s^2 )
//! ```
//!
//! A weighted root-mean-square distance from perfect similarity, flipped so
//! that 1.0 is best. How a clip lacking a weighted stream is handled is set
//! by [`MissingStreamPolicy`].
//!
//! # Selection
//!
//! Scored clips split into matches (`score >= threshold`) and near-misses
//! (`lower_limit <= score < threshold`). A review round samples both
//! partitions under a budget; a finalize round keeps everything down to the
//! lowest user-confirmed match.

mod score;
mod select;

pub use score::{MissingStreamPolicy, compute_scores, score_clip};
pub use select::{MatchSelector, SelectionMode, finalize_near_miss, lower_limit};
