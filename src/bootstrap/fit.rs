//! Closed-form target fits for one (stream, split).
//!
//! # Matches only
//!
//! With confirmed match vectors as the columns of `X` (d x n):
//!
//! ```text
//! M = X^T X,   target = X * rowsum(M^-1)
//! ```
//!
//! `X^T target = M M^-1 1 = 1`, so the new target has unit similarity to
//! every confirmed match. With the reference as the only match this is the
//! scaled reference `f / (f.f)`.
//!
//! # Matches plus non-matches
//!
//! With matches as the rows of `X` (n x d) and non-matches as the rows of
//! `Y` (m x d):
//!
//! ```text
//! s  = mu / tr(Y Y^T)
//! M  = I + s Y^T Y
//! B  = X M^-1 X^T
//! w1 = M^-1 X^T B^-1
//! w2 = M^-1 - w1 X M^-1
//! target = rowsum(w2 s Y^T) + rowsum(w1)
//! ```

use nalgebra::{DMatrix, DVector, SymmetricEigen};

use crate::error::{EngineError, EngineResult};
use crate::types::{FeatureVector, SplitIndex};

/// Reciprocal condition number below which a matrix counts as singular.
const MIN_RCOND: f64 = 1e-12;

/// The (stream, split) a fit runs for. Used to label errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitSite<'a> {
    pub stream: &'a str,
    pub split: SplitIndex,
}

impl<'a> FitSite<'a> {
    pub fn new(stream: &'a str, split: SplitIndex) -> Self {
        Self { stream, split }
    }

    fn singular(&self, stage: &'static str, rcond: f64) -> EngineError {
        EngineError::SingularMatrix {
            stage,
            stream: self.stream.to_string(),
            split: self.split,
            rcond,
        }
    }

    fn mismatch(&self, expected: usize, actual: usize) -> EngineError {
        EngineError::DimensionMismatch {
            stream: self.stream.to_string(),
            split: self.split,
            expected,
            actual,
        }
    }
}

/// `f / (f.f)`, so that the scaled vector dotted with `f` is exactly 1.
pub fn scale_feature(feature: &[f64], site: FitSite<'_>) -> EngineResult<FeatureVector> {
    let norm_sq: f64 = feature.iter().map(|x| x * x).sum();
    if !(norm_sq > 0.0 && norm_sq.is_finite()) {
        return Err(EngineError::ZeroNormFeature {
            stream: site.stream.to_string(),
            split: site.split,
        });
    }
    Ok(feature.iter().map(|x| x / norm_sq).collect())
}

/// Invert a symmetric matrix, refusing singular or ill-conditioned input.
///
/// The condition estimate is the ratio of the smallest to the largest
/// absolute eigenvalue.
pub fn invert_checked(
    m: &DMatrix<f64>,
    stage: &'static str,
    site: FitSite<'_>,
) -> EngineResult<DMatrix<f64>> {
    if m.iter().any(|x| !x.is_finite()) {
        return Err(site.singular(stage, f64::NAN));
    }

    let eigen = SymmetricEigen::new(m.clone());
    let (lo, hi) = eigen
        .eigenvalues
        .iter()
        .map(|v| v.abs())
        .fold((f64::INFINITY, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let rcond = if hi > 0.0 { lo / hi } else { 0.0 };
    if rcond < MIN_RCOND {
        return Err(site.singular(stage, rcond));
    }

    let Some(inverse) = m.clone().try_inverse() else {
        return Err(site.singular(stage, rcond));
    };
    if inverse.iter().any(|x| !x.is_finite()) {
        return Err(site.singular(stage, rcond));
    }
    Ok(inverse)
}

fn common_dim(vectors: &[&FeatureVector], site: FitSite<'_>) -> EngineResult<usize> {
    let dim = vectors.first().map_or(0, |v| v.len());
    if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
        return Err(site.mismatch(dim, bad.len()));
    }
    Ok(dim)
}

/// Target with unit similarity to every confirmed match.
///
/// # Errors
/// `SingularMatrix` when the Gram matrix is rank deficient (duplicate or
/// collinear matches, or more matches than dimensions).
pub fn fit_matches_only(matches: &[&FeatureVector], site: FitSite<'_>) -> EngineResult<FeatureVector> {
    let d = common_dim(matches, site)?;
    let n = matches.len();
    if n == 0 || d == 0 {
        return Err(site.singular("matches gram", 0.0));
    }

    let x = DMatrix::from_fn(d, n, |i, j| matches[j][i]);
    let gram = x.transpose() * &x;
    let gram_inv = invert_checked(&gram, "matches gram", site)?;
    let mu: DVector<f64> = gram_inv.column_sum();
    let target = &x * mu;

    Ok(target.iter().copied().collect())
}

/// Ridge-regularized target pulled toward matches and away from non-matches.
///
/// # Errors
/// `DegenerateNonMatches` if every non-match vector is zero, and
/// `SingularMatrix` if either inversion fails.
pub fn fit_with_nonmatches(
    matches: &[&FeatureVector],
    nonmatches: &[&FeatureVector],
    regularization: f64,
    site: FitSite<'_>,
) -> EngineResult<FeatureVector> {
    let d = common_dim(matches, site)?;
    let nd = common_dim(nonmatches, site)?;
    if nd != d {
        return Err(site.mismatch(d, nd));
    }
    let n = matches.len();
    let m = nonmatches.len();
    if n == 0 || d == 0 {
        return Err(site.singular("matches gram", 0.0));
    }

    let x = DMatrix::from_fn(n, d, |i, j| matches[i][j]);
    let y = DMatrix::from_fn(m, d, |i, j| nonmatches[i][j]);

    // tr(Y Y^T) is the squared Frobenius norm.
    let trace = y.norm_squared();
    if !(trace > 0.0 && trace.is_finite()) {
        return Err(EngineError::DegenerateNonMatches {
            stream: site.stream.to_string(),
            split: site.split,
        });
    }
    let scale = regularization / trace;

    let ridge = DMatrix::<f64>::identity(d, d) + (y.transpose() * &y) * scale;
    let ridge_inv = invert_checked(&ridge, "non-match ridge", site)?;

    let xt = x.transpose();
    let b = &x * &ridge_inv * &xt;
    let b_inv = invert_checked(&b, "match projection", site)?;

    let w1 = &ridge_inv * &xt * &b_inv;
    let w2 = &ridge_inv - &w1 * &x * &ridge_inv;
    let w3: DVector<f64> = (w2 * (y.transpose() * scale)).column_sum();
    let target = w3 + w1.column_sum();

    Ok(target.iter().copied().collect())
}
