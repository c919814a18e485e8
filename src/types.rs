//! Shared primitive aliases and inventory enums.

use serde::{Deserialize, Serialize};

/// Object-store key of a document or backup.
pub type ObjectKey = String;
/// Monotonic per-key version assigned by the object store on every put.
pub type ObjectVersion = u64;

/// Unit in which a roll's `cantidad` is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unidad {
    /// Kilograms.
    KG,
    /// Meters.
    MTS,
}

/// Lifecycle state of a roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollStatus {
    /// Announced on a packing list, not yet received.
    Pending,
    /// In stock.
    Active,
    /// Sold to a customer.
    Sold,
    /// Returned to the supplier.
    Returned,
}
