//! Caller authorization and per-caller rate limiting.

use std::time::{Duration, Instant};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Caller role resolved from the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Read-only dashboard user.
    User,
    /// Inventory administrator.
    Admin,
    /// Senior administrator.
    MajorAdmin,
}

impl Role {
    /// True for the roles allowed to mutate inventory.
    pub fn can_mutate(self) -> bool {
        matches!(self, Self::Admin | Self::MajorAdmin)
    }
}

/// Authenticated identity attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// Stable user identifier, also the rate-limit bucket.
    pub user: String,
    /// Resolved role.
    pub role: Role,
}

impl Caller {
    /// Convenience constructor.
    pub fn new(user: impl Into<String>, role: Role) -> Self {
        Self {
            user: user.into(),
            role,
        }
    }
}

/// Request refused before reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// No session.
    #[error("authentication required")]
    Unauthenticated,
    /// Session role may not mutate inventory.
    #[error("role {0:?} may not modify inventory")]
    Forbidden(Role),
    /// Too many requests in the current window.
    #[error("too many requests; retry in {retry_after_ms} ms")]
    RateLimited {
        /// Time until the caller's window resets.
        retry_after_ms: u64,
    },
}

/// Admits only callers whose role can mutate.
pub fn authorize(caller: Option<&Caller>) -> Result<&Caller, AccessError> {
    let caller = caller.ok_or(AccessError::Unauthenticated)?;
    if !caller.role.can_mutate() {
        return Err(AccessError::Forbidden(caller.role));
    }
    Ok(caller)
}

/// Fixed-window request counter keyed by caller.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    windows: HashMap<String, (Instant, u32)>,
}

impl RateLimiter {
    /// `max_requests == 0` admits everything.
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: HashMap::new(),
        }
    }

    /// Counts one request for `key` at the current instant.
    pub fn check(&mut self, key: &str) -> Result<(), AccessError> {
        self.check_at(key, Instant::now())
    }

    /// Counts one request for `key` at `now`, forgetting expired windows.
    pub fn check_at(&mut self, key: &str, now: Instant) -> Result<(), AccessError> {
        if self.max_requests == 0 {
            return Ok(());
        }

        let window = self.window;
        self.windows
            .retain(|_, (started, _)| now.saturating_duration_since(*started) < window);
        let entry = self.windows.entry(key.to_string()).or_insert((now, 0));

        if entry.1 >= self.max_requests {
            let elapsed = now.saturating_duration_since(entry.0);
            return Err(AccessError::RateLimited {
                retry_after_ms: window.saturating_sub(elapsed).as_millis() as u64,
            });
        }

        entry.1 += 1;
        Ok(())
    }
}
