//! ANSI color utilities and badge rendering for round reports.
//!
//! Color scheme:
//! - Bright for calls the user made (they are ground truth)
//! - Plain green/yellow for the algorithm's own matches and near misses
//! - Dimmed for metadata (scores, notes)

use owo_colors::{OwoColorize, Style};

use crate::round::MatchType;

/// Badge shown next to each reported clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Badge(pub MatchType);

impl Badge {
    pub fn label(&self) -> &'static str {
        self.0.label()
    }

    /// Get the badge's display color/style
    pub fn style(&self) -> Style {
        match self.0 {
            // Ground truth from the user - bright to catch attention
            MatchType::UserMatch => Style::new().bright_green().bold(),
            MatchType::UserNonMatch => Style::new().bright_red().bold(),

            // Algorithm calls
            MatchType::AlgorithmMatch => Style::new().green(),
            MatchType::NearMiss => Style::new().yellow(),

            MatchType::Reference => Style::new().bright_cyan().dimmed(),
        }
    }

    /// Render the badge, with color when `color` is set.
    pub fn render(&self, color: bool) -> String {
        if color {
            format!("[{}]", self.label().style(self.style()))
        } else {
            format!("[{}]", self.label())
        }
    }
}

/// Colorize report fields. Every method passes text through untouched when
/// color is off.
#[derive(Debug, Clone, Copy)]
pub struct Colorizer {
    pub enabled: bool,
}

impl Colorizer {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Section headers (bold blue)
    pub fn header(&self, s: &str) -> String {
        if self.enabled {
            s.bright_blue().bold().to_string()
        } else {
            s.to_string()
        }
    }

    /// Clip ids (magenta)
    pub fn clip(&self, s: &str) -> String {
        if self.enabled { s.magenta().to_string() } else { s.to_string() }
    }

    /// Scores (cyan)
    pub fn score(&self, s: &str) -> String {
        if self.enabled { s.cyan().to_string() } else { s.to_string() }
    }

    pub fn error(&self, s: &str) -> String {
        if self.enabled {
            s.bright_red().bold().to_string()
        } else {
            s.to_string()
        }
    }

    /// Secondary information (parameters, notes)
    pub fn dim(&self, s: &str) -> String {
        if self.enabled { s.dimmed().to_string() } else { s.to_string() }
    }
}
