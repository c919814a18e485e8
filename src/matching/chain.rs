use tracing::{debug, warn};

use crate::{
    op::ExpectedPrior,
    roll::{Roll, is_composite_id},
};

use super::traits::{MatchMethod, MatchOutcome, RollMatch, RollMatcher};

/// Exact `OC_tela_color_lote_rollId` match, only for ids containing `_`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CompositeKeyMatcher;

impl RollMatcher for CompositeKeyMatcher {
    fn method(&self) -> MatchMethod {
        MatchMethod::CompositeKey
    }

    fn try_match(&self, rolls: &[Roll], target_id: &str, _expected: Option<&ExpectedPrior>) -> MatchOutcome {
        if !is_composite_id(target_id) {
            return MatchOutcome::Miss;
        }

        let hits: Vec<usize> = rolls
            .iter()
            .enumerate()
            .filter(|(_, roll)| roll.composite_key() == target_id)
            .map(|(idx, _)| idx)
            .collect();

        match hits.as_slice() {
            [] => MatchOutcome::Miss,
            [idx] => MatchOutcome::Hit(*idx),
            _ => MatchOutcome::Ambiguous(hits),
        }
    }
}

/// First roll whose `rollId` equals the target id exactly.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectIdMatcher;

impl RollMatcher for DirectIdMatcher {
    fn method(&self) -> MatchMethod {
        MatchMethod::DirectId
    }

    fn try_match(&self, rolls: &[Roll], target_id: &str, _expected: Option<&ExpectedPrior>) -> MatchOutcome {
        rolls
            .iter()
            .position(|roll| roll.roll_id == target_id)
            .map_or(MatchOutcome::Miss, MatchOutcome::Hit)
    }
}

/// First roll whose `rollId` equals the expected prior's `rollId`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExpectedPriorMatcher;

impl RollMatcher for ExpectedPriorMatcher {
    fn method(&self) -> MatchMethod {
        MatchMethod::ExpectedPrior
    }

    fn try_match(&self, rolls: &[Roll], _target_id: &str, expected: Option<&ExpectedPrior>) -> MatchOutcome {
        let Some(expected) = expected else {
            return MatchOutcome::Miss;
        };
        rolls
            .iter()
            .position(|roll| roll.roll_id == expected.roll_id)
            .map_or(MatchOutcome::Miss, MatchOutcome::Hit)
    }
}

/// Why [`MatcherChain::locate`] produced no roll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocateFailure {
    /// Every tier missed.
    NotFound,
    /// The first tier to respond matched several rolls.
    Ambiguous {
        /// Tier that matched.
        method: MatchMethod,
        /// Number of rolls it matched.
        count: usize,
    },
}

/// Ordered tiers; the first tier that does not miss decides the outcome.
pub struct MatcherChain {
    matchers: Vec<Box<dyn RollMatcher>>,
}

impl MatcherChain {
    /// Composite key, then direct `rollId`, then expected prior.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(CompositeKeyMatcher),
            Box::new(DirectIdMatcher),
            Box::new(ExpectedPriorMatcher),
        ])
    }

    /// Builds a chain from explicit tiers, tried in order.
    pub fn new(matchers: Vec<Box<dyn RollMatcher>>) -> Self {
        Self { matchers }
    }

    /// Tiers in precedence order.
    pub fn methods(&self) -> Vec<MatchMethod> {
        self.matchers.iter().map(|m| m.method()).collect()
    }

    /// Finds the roll `target_id` refers to.
    ///
    /// A hit outside `rolls` counts as a miss for that tier.
    pub fn locate(
        &self,
        rolls: &[Roll],
        target_id: &str,
        expected: Option<&ExpectedPrior>,
    ) -> Result<RollMatch, LocateFailure> {
        for matcher in &self.matchers {
            match matcher.try_match(rolls, target_id, expected) {
                MatchOutcome::Miss => continue,
                MatchOutcome::Hit(index) if index >= rolls.len() => {
                    warn!(target_id, index, len = rolls.len(), method = ?matcher.method(), "matcher hit out of range; ignoring");
                    continue;
                }
                MatchOutcome::Hit(index) => {
                    let method = matcher.method();
                    debug!(target_id, index, ?method, "located roll");
                    return Ok(RollMatch { index, method });
                }
                MatchOutcome::Ambiguous(indices) => {
                    return Err(LocateFailure::Ambiguous {
                        method: matcher.method(),
                        count: indices.len(),
                    });
                }
            }
        }
        Err(LocateFailure::NotFound)
    }
}

impl Default for MatcherChain {
    fn default() -> Self {
        Self::standard()
    }
}
