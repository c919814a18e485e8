//! Roll identity matching.

/// Ordered matcher chain and the three standard tiers.
pub mod chain;
/// Pre-mutation integrity guard.
pub mod guard;
/// Matcher trait and match outcome model.
pub mod traits;
