//! Roll record, sparse patch, and identity helpers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{RollStatus, Unidad};

/// Separator between the fields of a composite key.
pub const COMPOSITE_KEY_SEPARATOR: char = '_';

/// One physical roll of fabric as stored inside a packing-list document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roll {
    /// Operator-assigned identifier, unique only within `(OC, tela, color, lote)`.
    #[serde(rename = "rollId")]
    pub roll_id: String,
    /// Purchase-order identifier.
    #[serde(rename = "OC")]
    pub oc: String,
    /// Fabric type.
    pub tela: String,
    /// Color name.
    pub color: String,
    /// Lot / batch identifier.
    pub lote: String,
    /// Unit of `cantidad`.
    pub unidad: Unidad,
    /// Quantity in `unidad` units.
    pub cantidad: f64,
    /// Intake date-time string.
    #[serde(rename = "fechaIngreso")]
    pub fecha_ingreso: String,
    /// Lifecycle state.
    pub status: RollStatus,
    /// Fields this crate does not model, carried through rewrites untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Roll {
    /// Renders `OC_tela_color_lote_rollId`.
    pub fn composite_key(&self) -> String {
        composite_key(&self.oc, &self.tela, &self.color, &self.lote, &self.roll_id)
    }
}

/// Renders a composite key from its parts.
pub fn composite_key(oc: &str, tela: &str, color: &str, lote: &str, roll_id: &str) -> String {
    let sep = COMPOSITE_KEY_SEPARATOR;
    format!("{oc}{sep}{tela}{sep}{color}{sep}{lote}{sep}{roll_id}")
}

/// True when `id` looks like a composite key rather than a bare `rollId`.
pub fn is_composite_id(id: &str) -> bool {
    id.contains(COMPOSITE_KEY_SEPARATOR)
}

/// Canonical form used to compare OCs: trimmed and lowercased.
pub fn normalize_oc(oc: &str) -> String {
    oc.trim().to_lowercase()
}

/// Trimmed, case-insensitive OC equality.
pub fn oc_matches(a: &str, b: &str) -> bool {
    normalize_oc(a) == normalize_oc(b)
}

/// Sparse patch where each `Some` field overwrites the roll value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RollPatch {
    /// Optional replacement for `rollId`.
    #[serde(rename = "rollId", default, skip_serializing_if = "Option::is_none")]
    pub roll_id: Option<String>,
    /// Optional replacement for `OC`.
    #[serde(rename = "OC", default, skip_serializing_if = "Option::is_none")]
    pub oc: Option<String>,
    /// Optional replacement for `tela`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tela: Option<String>,
    /// Optional replacement for `color`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Optional replacement for `lote`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lote: Option<String>,
    /// Optional replacement for `unidad`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unidad: Option<Unidad>,
    /// Optional replacement for `cantidad`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cantidad: Option<f64>,
    /// Optional replacement for `fechaIngreso`.
    #[serde(rename = "fechaIngreso", default, skip_serializing_if = "Option::is_none")]
    pub fecha_ingreso: Option<String>,
    /// Optional replacement for `status`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RollStatus>,
    /// Unmodelled fields, merged key by key into the roll.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RollPatch {
    /// Returns true when no fields are set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Applies this patch in place to `roll`.
    pub fn apply_to(&self, roll: &mut Roll) {
        if let Some(v) = &self.roll_id {
            roll.roll_id = v.clone();
        }
        if let Some(v) = &self.oc {
            roll.oc = v.clone();
        }
        if let Some(v) = &self.tela {
            roll.tela = v.clone();
        }
        if let Some(v) = &self.color {
            roll.color = v.clone();
        }
        if let Some(v) = &self.lote {
            roll.lote = v.clone();
        }
        if let Some(v) = self.unidad {
            roll.unidad = v;
        }
        if let Some(v) = self.cantidad {
            roll.cantidad = v;
        }
        if let Some(v) = &self.fecha_ingreso {
            roll.fecha_ingreso = v.clone();
        }
        if let Some(v) = self.status {
            roll.status = v;
        }
        for (k, v) in &self.extra {
            roll.extra.insert(k.clone(), v.clone());
        }
    }

    /// Materializes a full roll, or names the first missing required field.
    pub fn to_roll(&self) -> Result<Roll, &'static str> {
        Ok(Roll {
            roll_id: self.roll_id.clone().ok_or("rollId")?,
            oc: self.oc.clone().ok_or("OC")?,
            tela: self.tela.clone().ok_or("tela")?,
            color: self.color.clone().ok_or("color")?,
            lote: self.lote.clone().ok_or("lote")?,
            unidad: self.unidad.ok_or("unidad")?,
            cantidad: self.cantidad.ok_or("cantidad")?,
            fecha_ingreso: self.fecha_ingreso.clone().ok_or("fechaIngreso")?,
            status: self.status.ok_or("status")?,
            extra: self.extra.clone(),
        })
    }
}

impl From<Roll> for RollPatch {
    fn from(roll: Roll) -> Self {
        Self {
            roll_id: Some(roll.roll_id),
            oc: Some(roll.oc),
            tela: Some(roll.tela),
            color: Some(roll.color),
            lote: Some(roll.lote),
            unidad: Some(roll.unidad),
            cantidad: Some(roll.cantidad),
            fecha_ingreso: Some(roll.fecha_ingreso),
            status: Some(roll.status),
            extra: roll.extra,
        }
    }
}
