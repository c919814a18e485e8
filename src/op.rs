//! Mutation model and request entry points.

use serde::{Deserialize, Serialize};

use crate::{
    error::ValidationError,
    roll::{Roll, RollPatch},
};

/// What a mutation does to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    /// Append a new roll.
    Add,
    /// Shallow-merge a patch over an existing roll.
    Update,
    /// Remove an existing roll.
    Delete,
}

/// The caller's belief about a roll's current identity fields.
///
/// A complete roll record deserializes into this type; fields beyond the
/// identity fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedPrior {
    /// Expected `rollId`, used by the last matching tier.
    #[serde(rename = "rollId")]
    pub roll_id: String,
    /// Expected purchase order.
    #[serde(rename = "OC")]
    pub oc: String,
    /// Expected fabric type.
    pub tela: String,
    /// Expected color.
    pub color: String,
    /// Expected lot.
    pub lote: String,
}

impl From<&Roll> for ExpectedPrior {
    fn from(roll: &Roll) -> Self {
        Self {
            roll_id: roll.roll_id.clone(),
            oc: roll.oc.clone(),
            tela: roll.tela.clone(),
            color: roll.color.clone(),
            lote: roll.lote.clone(),
        }
    }
}

/// One requested change against the roll inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    /// Add, update, or delete.
    pub kind: MutationKind,
    /// Bare `rollId` or composite key; unused by `add`.
    #[serde(rename = "targetId", default)]
    pub target_id: String,
    /// Fields to write; for `add` this must be a complete roll.
    #[serde(default)]
    pub patch: RollPatch,
    /// Optional staleness guard for `update` and `delete`.
    #[serde(rename = "expectedPrior", default, skip_serializing_if = "Option::is_none")]
    pub expected_prior: Option<ExpectedPrior>,
    /// Explicit routing OC; takes precedence over the prior and the patch.
    #[serde(rename = "OC", default, skip_serializing_if = "Option::is_none")]
    pub oc: Option<String>,
}

impl Mutation {
    /// Builds an `add` for a complete roll.
    pub fn add(roll: Roll) -> Self {
        Self {
            kind: MutationKind::Add,
            target_id: roll.roll_id.clone(),
            patch: roll.into(),
            expected_prior: None,
            oc: None,
        }
    }

    /// Builds an `update` with no staleness guard.
    pub fn update(target_id: impl Into<String>, patch: RollPatch) -> Self {
        Self {
            kind: MutationKind::Update,
            target_id: target_id.into(),
            patch,
            expected_prior: None,
            oc: None,
        }
    }

    /// Builds a `delete` with no staleness guard.
    pub fn delete(target_id: impl Into<String>) -> Self {
        Self {
            kind: MutationKind::Delete,
            target_id: target_id.into(),
            patch: RollPatch::default(),
            expected_prior: None,
            oc: None,
        }
    }

    /// Attaches an expected prior state.
    pub fn expecting(mut self, prior: ExpectedPrior) -> Self {
        self.expected_prior = Some(prior);
        self
    }

    /// Routes this mutation to the document holding `oc`.
    pub fn routed_to(mut self, oc: impl Into<String>) -> Self {
        self.oc = Some(oc.into());
        self
    }

    /// OC used to route this mutation to a document: the explicit route,
    /// else the expected prior's OC, else the patch's OC.
    pub fn routing_oc(&self) -> Option<&str> {
        [
            self.oc.as_deref(),
            self.expected_prior.as_ref().map(|p| p.oc.as_str()),
            self.patch.oc.as_deref(),
        ]
        .into_iter()
        .flatten()
        .find(|oc| !oc.trim().is_empty())
    }
}

/// The two request shapes accepted by the reconciler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChangeRequest {
    /// Heterogeneous bulk mutations.
    Changes {
        /// Mutations in caller order.
        changes: Vec<Mutation>,
    },
    /// Replace-style update of rolls belonging to one OC.
    ReplaceOc {
        /// Purchase order the rolls belong to.
        oc: String,
        /// New roll contents, each addressed by its `rollId`.
        #[serde(rename = "updatedRolls")]
        updated_rolls: Vec<RollPatch>,
    },
}

impl ChangeRequest {
    /// Parses a request body.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ValidationError> {
        serde_json::from_slice(bytes).map_err(|e| ValidationError::Malformed(e.to_string()))
    }

    /// Number of mutations the request expands to.
    pub fn len(&self) -> usize {
        match self {
            Self::Changes { changes } => changes.len(),
            Self::ReplaceOc { updated_rolls, .. } => updated_rolls.len(),
        }
    }

    /// True when the request carries no mutations.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expands the request into the mutation list the reconciler applies.
    ///
    /// `ReplaceOc` entries become updates targeted at their `rollId` and
    /// routed to the request's OC.
    pub fn into_mutations(self) -> Vec<Mutation> {
        match self {
            Self::Changes { changes } => changes,
            Self::ReplaceOc { oc, updated_rolls } => updated_rolls
                .into_iter()
                .map(|patch| {
                    let target = patch.roll_id.clone().unwrap_or_default();
                    Mutation::update(target, patch).routed_to(oc.clone())
                })
                .collect(),
        }
    }
}
