//! Re-estimating the query target from reviewed matches.
//!
//! The first round matches against the reference clip itself. Once the user
//! has confirmed some matches, the target for each (stream, split) can be
//! refit so that it is equally close to all of them ([`fit_matches_only`]),
//! or additionally pushed away from rejected clips ([`fit_with_nonmatches`]).
//! Sub-sampling, bagging and blending with the previous round's target sit
//! on top in [`TargetBootstrapper`].

use serde::{Deserialize, Serialize};

mod fit;
mod target;

pub use fit::{FitSite, fit_matches_only, fit_with_nonmatches, invert_checked, scale_feature};
pub use target::{BootstrapInput, Target, TargetBootstrapper, TargetOrigin, sample_indices};

/// How the target is derived from feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BootstrapMode {
    /// Always use the scaled reference clip.
    Disabled,
    /// One fit on confirmed matches only.
    MatchesOnly,
    /// One fit on confirmed matches, pushed away from rejected clips.
    MatchesPlusNonMatches,
    /// Average of several with-replacement refits on matches and non-matches.
    #[default]
    Bagging,
}

impl BootstrapMode {
    pub fn label(self) -> &'static str {
        match self {
            BootstrapMode::Disabled => "disabled",
            BootstrapMode::MatchesOnly => "matches-only",
            BootstrapMode::MatchesPlusNonMatches => "matches-plus-non-matches",
            BootstrapMode::Bagging => "bagging",
        }
    }

    pub fn is_enabled(self) -> bool {
        self != BootstrapMode::Disabled
    }

    /// Whether rejected clips take part in the fit.
    pub fn uses_nonmatches(self) -> bool {
        matches!(
            self,
            BootstrapMode::MatchesPlusNonMatches | BootstrapMode::Bagging
        )
    }
}
