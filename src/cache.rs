//! Downstream read-cache invalidation.

use thiserror::Error;

/// Cache backend refused or failed an invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cache invalidation of `{pattern}` failed: {message}")]
pub struct CacheError {
    /// Pattern that was being invalidated.
    pub pattern: String,
    /// Backend message.
    pub message: String,
}

/// Drops cached reads whose keys match a glob-style pattern.
pub trait CacheInvalidator: Send {
    /// Invalidates every key matching `pattern`.
    fn invalidate_pattern(&mut self, pattern: &str) -> Result<(), CacheError>;
}

/// Invalidator that performs no work.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopInvalidator;

impl CacheInvalidator for NoopInvalidator {
    fn invalidate_pattern(&mut self, _pattern: &str) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Invalidator that remembers every pattern it was asked to drop.
#[derive(Debug, Default, Clone)]
pub struct RecordingInvalidator {
    patterns: Vec<String>,
}

impl RecordingInvalidator {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Patterns received so far, in call order.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl CacheInvalidator for RecordingInvalidator {
    fn invalidate_pattern(&mut self, pattern: &str) -> Result<(), CacheError> {
        self.patterns.push(pattern.to_string());
        Ok(())
    }
}
