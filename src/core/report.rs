use serde::{Deserialize, Serialize};

use crate::{
    matching::traits::MatchMethod,
    op::MutationKind,
    types::ObjectKey,
};

/// Why a mutation was not applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum SkipReason {
    /// Neither a route, the expected prior, nor the patch names an OC.
    MissingOc,
    /// No document holds a roll with the mutation's OC.
    OcUnresolved,
    /// No matcher tier located a roll.
    NotFound,
    /// The located roll disagrees with the expected prior.
    IntegrityMismatch {
        /// First differing field.
        field: String,
        /// Value the caller expected.
        expected: String,
        /// Value found.
        actual: String,
    },
    /// The composite key matched several rolls.
    AmbiguousCompositeKey {
        /// Number of rolls sharing the key.
        count: usize,
    },
    /// An `add` without a complete roll.
    InvalidRoll {
        /// First missing field.
        field: String,
    },
    /// The document could not be written.
    StorageFailure {
        /// Store error text.
        message: String,
    },
}

/// Result of one mutation, in request order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationOutcome {
    /// Position in the request.
    pub index: usize,
    /// Target as supplied by the caller.
    pub target_id: String,
    /// Mutation kind.
    pub kind: MutationKind,
    /// True when the change is part of a persisted document.
    pub applied: bool,
    /// Tier that located the roll, for updates and deletes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<MatchMethod>,
    /// Why it was skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<SkipReason>,
}

impl MutationOutcome {
    pub(crate) fn applied(index: usize, target_id: &str, kind: MutationKind, method: Option<MatchMethod>) -> Self {
        Self {
            index,
            target_id: target_id.to_string(),
            kind,
            applied: true,
            method,
            reason: None,
        }
    }

    pub(crate) fn skipped(index: usize, target_id: &str, kind: MutationKind, reason: SkipReason) -> Self {
        Self {
            index,
            target_id: target_id.to_string(),
            kind,
            applied: false,
            method: None,
            reason: Some(reason),
        }
    }
}

/// Summary for one document touched by a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResult {
    /// Document key.
    pub key: ObjectKey,
    /// OC whose mutations were routed here.
    pub oc: String,
    /// Mutations persisted in this document.
    pub changes_applied: usize,
    /// Mutations routed to this document.
    pub total_changes_requested: usize,
    /// Key of the pre-mutation copy, when one was written.
    pub backup_reference: Option<ObjectKey>,
    /// Store error that prevented the write.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileResult {
    /// True when the document was rewritten.
    pub fn written(&self) -> bool {
        self.error.is_none() && self.changes_applied > 0
    }
}

/// Aggregate response for one request.
///
/// `success` only says the request was valid and authorized; compare
/// `changes_applied` with `changes_requested` to detect skipped work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    /// Always true for a report; failures are errors instead.
    pub success: bool,
    /// Mutations in the request.
    pub changes_requested: usize,
    /// Mutations persisted.
    pub changes_applied: usize,
    /// Documents located for the request.
    pub files_processed: usize,
    /// One entry per located document.
    pub per_file_results: Vec<FileResult>,
    /// One entry per mutation, in request order.
    pub outcomes: Vec<MutationOutcome>,
}

impl ReconcileReport {
    /// Outcomes that were not applied.
    pub fn skipped(&self) -> impl Iterator<Item = &MutationOutcome> {
        self.outcomes.iter().filter(|o| !o.applied)
    }
}
