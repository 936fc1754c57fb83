//! Tuning the score function from user feedback.
//!
//! After each review round the user's verdicts (and the algorithm's own
//! calls for clips they skipped) form a labelled set. This module finds the
//! free stream weight and the match threshold that best separate that set:
//!
//! 1. Evaluate an asymmetric loss on a weight x threshold grid
//!    ([`gridsearch`], [`optimizer`])
//! 2. Take the first strict minimum in row-major order
//! 3. Unless it lies on the grid edge, fit a separable quadratic through it
//!    and its four neighbours and move to the vertex ([`quadratic`])
//!
//! Only a reference stream plus one free stream is supported. More streams
//! would need a higher-dimensional grid or a gradient method.

pub mod gridsearch;
pub mod optimizer;
pub mod quadratic;

pub use gridsearch::{AxisSpec, GridCell, LossSurface};
pub use optimizer::{HyperparameterOptimizer, OptimizedParameters, asymmetric_loss};
pub use quadratic::{SeparableQuadratic, Stencil, fit_separable_quadratic};
