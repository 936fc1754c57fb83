//! Text and JSON rendering of a [`RoundReport`].

use std::fmt::Write;

use super::colors::{Badge, Colorizer};
use crate::round::RoundReport;

/// Renders round reports for the terminal.
pub struct ReportRenderer {
    colors: Colorizer,
}

impl ReportRenderer {
    pub fn new(color: bool) -> Self {
        Self {
            colors: Colorizer::new(color),
        }
    }

    /// Header, one row per selected clip (highest score first), then every
    /// note on the query so far.
    pub fn render(&self, report: &RoundReport) -> String {
        let c = &self.colors;
        let mut out = String::new();

        let _ = writeln!(
            out,
            "{}",
            c.header(&format!("Query {} - {} job - {:?}", report.query, report.job.label(), report.state))
        );

        if let Some(error) = &report.error {
            let _ = writeln!(out, "{}", c.error(&format!("error: {}", error)));
        }

        if let Some(outcome) = &report.outcome {
            let _ = writeln!(
                out,
                "{}",
                c.dim(&format!(
                    "round {} (id {}), threshold {:.4}, near-miss {:.3} (lower limit {:.4}), weights {}",
                    outcome.round,
                    outcome.round_id,
                    outcome.threshold,
                    outcome.near_miss,
                    outcome.lower_limit,
                    outcome.weights
                ))
            );
            let _ = writeln!(
                out,
                "{}",
                c.dim(&format!("target: {}, {} clips scored", outcome.target.label(), outcome.scored))
            );
            let _ = writeln!(
                out,
                "{}",
                c.dim(&format!(
                    "reviews: {} ({} clips judged in the last one)",
                    outcome.reviews, outcome.last_reviewed
                ))
            );
            let _ = writeln!(out);

            for row in outcome.rows() {
                let _ = writeln!(
                    out,
                    "  {:>10}  {}  {}",
                    c.clip(&row.clip.to_string()),
                    c.score(&format!("{:.4}", row.score)),
                    Badge(row.match_type).render(c.enabled)
                );
            }
        }

        if !report.history.is_empty() {
            let _ = writeln!(out);
            for note in &report.history {
                let _ = writeln!(out, "{}", c.dim(note));
            }
        }

        out
    }

    /// Pretty-printed JSON of the whole report.
    pub fn render_json(report: &RoundReport) -> serde_json::Result<String> {
        serde_json::to_string_pretty(report)
    }
}
