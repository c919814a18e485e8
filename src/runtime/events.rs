//! Runtime event stream payloads.

use crate::types::ObjectKey;

/// Events emitted from the single-writer runtime loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent {
    /// A pre-mutation copy was stored.
    BackupWritten {
        /// Backup key.
        key: ObjectKey,
    },
    /// A document was rewritten.
    DocumentWritten {
        /// Document key.
        key: ObjectKey,
        /// OC whose mutations were applied.
        oc: String,
        /// Mutations persisted in the document.
        changes_applied: usize,
    },
    /// Read caches were asked to drop these patterns.
    CachesInvalidated {
        /// Patterns sent to the invalidator.
        patterns: Vec<String>,
    },
    /// A request finished; emitted even when nothing was applied.
    BatchCompleted {
        /// Mutations in the request.
        changes_requested: usize,
        /// Mutations persisted.
        changes_applied: usize,
    },
}
