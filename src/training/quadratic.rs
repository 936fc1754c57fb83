//! Closed-form local refinement of a grid optimum.
//!
//! The five losses at a grid minimum and its four axis neighbours determine
//! a separable quadratic `a(w-w0)^2 + b(t-t0)^2 + c` exactly: each axis is a
//! parabola through three equally spaced points, and the constant follows
//! from the centre value. The vertex `(w0, t0)` is the refined optimum.

use serde::Serialize;

/// Loss values at a grid minimum and its axis neighbours.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stencil {
    /// Grid coordinates of the centre point.
    pub center: (f64, f64),
    /// Grid step along each axis.
    pub step: (f64, f64),
    pub center_loss: f64,
    /// Losses at `(w-h, t)` and `(w+h, t)`.
    pub weight_neighbors: (f64, f64),
    /// Losses at `(w, t-h)` and `(w, t+h)`.
    pub threshold_neighbors: (f64, f64),
}

/// Fitted separable quadratic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeparableQuadratic {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub w0: f64,
    pub t0: f64,
}

impl SeparableQuadratic {
    pub fn eval(&self, w: f64, t: f64) -> f64 {
        self.a * (w - self.w0).powi(2) + self.b * (t - self.t0).powi(2) + self.c
    }
}

/// Parabola `a(x - x0)^2 + k` through (c-h, ym), (c, y0), (c+h, yp).
///
/// `None` when the three points curve downward, or lie on a sloped line.
/// Three equal values give a flat parabola with its vertex at the centre.
fn fit_axis(center: f64, h: f64, ym: f64, y0: f64, yp: f64) -> Option<(f64, f64)> {
    let curvature = yp + ym - 2.0 * y0;
    let scale = ym.abs().max(y0.abs()).max(yp.abs()).max(1.0);
    if curvature.abs() <= 1e-14 * scale {
        return if (yp - ym).abs() <= 1e-14 * scale {
            Some((0.0, center))
        } else {
            None
        };
    }
    if curvature < 0.0 {
        return None;
    }
    let a = curvature / (2.0 * h * h);
    let x0 = center - h * (yp - ym) / (2.0 * curvature);
    Some((a, x0))
}

/// Fit the separable quadratic through a five-point stencil.
///
/// The vertex is clamped into the neighbour interval on each axis, then the
/// fit is checked against all five input losses; any residual above
/// `tolerance` (or a degenerate axis) returns `None` and the caller keeps the
/// grid point.
pub fn fit_separable_quadratic(stencil: &Stencil, tolerance: f64) -> Option<SeparableQuadratic> {
    let (wc, tc) = stencil.center;
    let (hw, ht) = stencil.step;
    if !(hw > 0.0 && ht > 0.0) {
        return None;
    }
    let y0 = stencil.center_loss;
    let (ywm, ywp) = stencil.weight_neighbors;
    let (ytm, ytp) = stencil.threshold_neighbors;

    let (a, w0) = fit_axis(wc, hw, ywm, y0, ywp)?;
    let (b, t0) = fit_axis(tc, ht, ytm, y0, ytp)?;
    let w0 = w0.clamp(wc - hw, wc + hw);
    let t0 = t0.clamp(tc - ht, tc + ht);
    let c = y0 - a * (wc - w0).powi(2) - b * (tc - t0).powi(2);

    let fit = SeparableQuadratic { a, b, c, w0, t0 };
    let points = [
        (wc, tc, y0),
        (wc - hw, tc, ywm),
        (wc + hw, tc, ywp),
        (wc, tc - ht, ytm),
        (wc, tc + ht, ytp),
    ];
    let fits = points
        .iter()
        .all(|&(w, t, y)| (fit.eval(w, t) - y).abs() <= tolerance);
    if !fits || !fit.w0.is_finite() || !fit.t0.is_finite() {
        return None;
    }
    Some(fit)
}
