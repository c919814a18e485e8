//! Document handling and the roll reconciler.

/// Packing-list documents, key filter, and encoding.
pub mod document;
/// Scan-based OC-to-document locator.
pub mod locator;
/// Batch reconciliation over an object store.
pub mod reconciler;
/// Per-mutation and per-file result model.
pub mod report;
/// Up-front batch validation.
pub mod validate;
