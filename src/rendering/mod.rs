//! Output rendering - from round reports to terminal/JSON output.

mod colors;
mod report;

pub use colors::{Badge, Colorizer};
pub use report::ReportRenderer;
