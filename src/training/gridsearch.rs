//! Parameter grid for the weight x threshold search.
//!
//! ## Axes
//!
//! Each axis is a half-open arithmetic range `[min, max)` walked with a
//! fixed step, so `AxisSpec::new(0.5, 2.5, 0.05)` yields 40 points starting
//! at 0.5 and stopping short of 2.5. Points are computed as `min + i*step`
//! rather than by accumulation to keep round-off from drifting along the axis.
//!
//! ## Loss surface
//!
//! | Axis      | Role                                     |
//! |-----------|------------------------------------------|
//! | weight    | free stream weight (reference pinned 1.0)|
//! | threshold | match threshold                          |
//!
//! Values are stored row-major: one row per weight, one column per
//! threshold. [`LossSurface::argmin`] scans in that order and keeps the
//! first strict minimum.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Range specification for one grid axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisSpec {
    pub min: f64,
    /// Exclusive upper end.
    pub max: f64,
    pub step: f64,
}

impl AxisSpec {
    pub fn new(min: f64, max: f64, step: f64) -> Self {
        Self { min, max, step }
    }

    /// Number of grid points.
    pub fn len(&self) -> usize {
        if !(self.step > 0.0) || !(self.max > self.min) {
            return 0;
        }
        // Tolerance keeps 0.5/0.01 = 50.000000000000004 from growing a 51st point.
        ((self.max - self.min) / self.step - 1e-9).ceil().max(0.0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The i-th point on the axis.
    pub fn value(&self, i: usize) -> f64 {
        self.min + i as f64 * self.step
    }

    /// All axis points in ascending order.
    pub fn points(&self) -> Vec<f64> {
        (0..self.len()).map(|i| self.value(i)).collect()
    }
}

impl fmt::Display for AxisSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}) step {}", self.min, self.max, self.step)
    }
}

/// One cell of the loss surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridCell {
    /// Row index (weight axis).
    pub row: usize,
    /// Column index (threshold axis).
    pub col: usize,
    pub weight: f64,
    pub threshold: f64,
    pub loss: f64,
}

/// Loss at every (weight, threshold) grid point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LossSurface {
    pub weights: Vec<f64>,
    pub thresholds: Vec<f64>,
    /// `values[row][col]` is the loss at `(weights[row], thresholds[col])`.
    pub values: Vec<Vec<f64>>,
}

impl LossSurface {
    pub fn new(weights: Vec<f64>, thresholds: Vec<f64>, values: Vec<Vec<f64>>) -> Self {
        Self {
            weights,
            thresholds,
            values,
        }
    }

    pub fn rows(&self) -> usize {
        self.weights.len()
    }

    pub fn cols(&self) -> usize {
        self.thresholds.len()
    }

    pub fn loss(&self, row: usize, col: usize) -> f64 {
        self.values[row][col]
    }

    pub fn cell(&self, row: usize, col: usize) -> GridCell {
        GridCell {
            row,
            col,
            weight: self.weights[row],
            threshold: self.thresholds[col],
            loss: self.values[row][col],
        }
    }

    /// First strict minimum in row-major order. Non-finite losses are skipped.
    pub fn argmin(&self) -> Option<GridCell> {
        let mut best: Option<(usize, usize, f64)> = None;
        for (row, values) in self.values.iter().enumerate() {
            for (col, &loss) in values.iter().enumerate() {
                if !loss.is_finite() {
                    continue;
                }
                match best {
                    Some((_, _, b)) if loss >= b => {}
                    _ => best = Some((row, col, loss)),
                }
            }
        }
        best.map(|(row, col, _)| self.cell(row, col))
    }

    /// Whether the cell sits on the outer edge of either axis.
    pub fn is_boundary(&self, row: usize, col: usize) -> bool {
        row == 0 || col == 0 || row + 1 >= self.rows() || col + 1 >= self.cols()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_lengths_match_production_grids() {
        assert_eq!(AxisSpec::new(0.5, 2.5, 0.05).len(), 40);
        assert_eq!(AxisSpec::new(0.6, 1.1, 0.01).len(), 50);
        assert_eq!(AxisSpec::new(0.5, 1.1, 0.025).len(), 24);
    }

    #[test]
    fn test_axis_points_exclude_max() {
        let axis = AxisSpec::new(0.0, 1.0, 0.25);
        let points = axis.points();
        assert_eq!(points.len(), 4);
        assert!((points[0] - 0.0).abs() < 1e-12);
        assert!((points[3] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_axes_are_empty() {
        assert!(AxisSpec::new(1.0, 0.5, 0.1).is_empty());
        assert!(AxisSpec::new(0.0, 1.0, 0.0).is_empty());
        assert!(AxisSpec::new(0.0, 1.0, -0.1).is_empty());
    }

    #[test]
    fn test_axis_deserializes_from_inline_table() {
        let axis: AxisSpec = toml::from_str("min = 0.5\nmax = 1.0\nstep = 0.1").unwrap();
        assert_eq!(axis, AxisSpec::new(0.5, 1.0, 0.1));
        assert_eq!(axis.to_string(), "[0.5, 1) step 0.1");
    }

    #[test]
    fn test_argmin_first_strict_minimum_wins() {
        let surface = LossSurface::new(
            vec![1.0, 2.0, 3.0],
            vec![0.1, 0.2, 0.3],
            vec![
                vec![5.0, 4.0, 5.0],
                vec![4.0, 1.0, 1.0],
                vec![1.0, 3.0, 2.0],
            ],
        );
        let best = surface.argmin().unwrap();
        assert_eq!((best.row, best.col), (1, 1));
        assert_eq!(best.weight, 2.0);
        assert_eq!(best.threshold, 0.2);
    }

    #[test]
    fn test_argmin_skips_nan() {
        let surface = LossSurface::new(vec![1.0], vec![0.1, 0.2], vec![vec![f64::NAN, 3.0]]);
        assert_eq!(surface.argmin().unwrap().col, 1);
    }

    #[test]
    fn test_boundary_detection() {
        let surface = LossSurface::new(vec![0.0; 3], vec![0.0; 4], vec![vec![0.0; 4]; 3]);
        assert!(surface.is_boundary(0, 2));
        assert!(surface.is_boundary(1, 0));
        assert!(surface.is_boundary(2, 1));
        assert!(surface.is_boundary(1, 3));
        assert!(!surface.is_boundary(1, 1));
        assert!(!surface.is_boundary(1, 2));
    }
}
