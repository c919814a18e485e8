use serde::{Deserialize, Serialize};

use crate::{op::ExpectedPrior, roll::Roll};

/// Which tier located a roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    /// `OC_tela_color_lote_rollId` equality.
    CompositeKey,
    /// Bare `rollId` equality against the target id.
    DirectId,
    /// Bare `rollId` equality against the expected prior's `rollId`.
    ExpectedPrior,
}

/// Result of one matcher tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// This tier found nothing; the next tier may try.
    Miss,
    /// Index of the matched roll.
    Hit(usize),
    /// More than one roll satisfied this tier.
    Ambiguous(Vec<usize>),
}

/// A located roll and the tier that found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollMatch {
    /// Position in the document.
    pub index: usize,
    /// Tier that produced the hit.
    pub method: MatchMethod,
}

/// One identity-matching tier.
pub trait RollMatcher: Send + Sync {
    /// Tier reported on a hit.
    fn method(&self) -> MatchMethod;

    /// Looks for the roll `target_id` refers to.
    fn try_match(
        &self,
        rolls: &[Roll],
        target_id: &str,
        expected: Option<&ExpectedPrior>,
    ) -> MatchOutcome;
}
