//! Error taxonomy shared across layers.

use thiserror::Error;

use crate::{
    access::AccessError,
    persist::PersistError,
};

/// Batch rejected before any document was touched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Request body could not be decoded.
    #[error("malformed request: {0}")]
    Malformed(String),
    /// Request carried no mutations.
    #[error("request carries no changes")]
    EmptyBatch,
    /// Update or delete without a target.
    #[error("change {index}: targetId is required")]
    MissingTargetId {
        /// Position in the batch.
        index: usize,
    },
    /// Add whose patch is not a complete roll.
    #[error("change {index}: new roll is missing `{field}`")]
    IncompleteRoll {
        /// Position in the batch.
        index: usize,
        /// First missing field.
        field: &'static str,
    },
    /// Negative or non-finite quantity.
    #[error("change {index}: cantidad must be a finite number >= 0, got {value}")]
    InvalidQuantity {
        /// Position in the batch.
        index: usize,
        /// Offending value.
        value: f64,
    },
    /// Replace-style request without an OC.
    #[error("oc is required")]
    MissingOc,
}

/// Failure that aborts a whole reconcile request.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Input validation failed.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Caller was rejected.
    #[error(transparent)]
    Access(#[from] AccessError),
    /// Document listing failed.
    #[error("storage error: {0}")]
    Persist(#[from] PersistError),
}
