//! Tokio front end for the reconciler.
//!
//! Requests are funneled through one command loop, so documents are never
//! rewritten by two requests of the same process at once. Storage work runs
//! on the blocking pool.

/// Notifications broadcast after each request.
pub mod events;
/// `spawn_reconciler`, the cloneable handle, and its command loop.
pub mod handle;
