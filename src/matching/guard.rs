use crate::{op::ExpectedPrior, roll::Roll};

/// First identity field where the located roll differs from the caller's belief.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityMismatch {
    /// Field name as stored (`tela`, `color`, `lote`, `OC`).
    pub field: &'static str,
    /// Value the caller expected.
    pub expected: String,
    /// Value found in the document.
    pub actual: String,
}

/// Compares `tela`, `color`, `lote`, and `OC` exactly.
pub fn check_integrity(candidate: &Roll, expected: &ExpectedPrior) -> Result<(), IntegrityMismatch> {
    let pairs = [
        ("tela", &candidate.tela, &expected.tela),
        ("color", &candidate.color, &expected.color),
        ("lote", &candidate.lote, &expected.lote),
        ("OC", &candidate.oc, &expected.oc),
    ];

    for (field, actual, want) in pairs {
        if actual != want {
            return Err(IntegrityMismatch {
                field,
                expected: want.clone(),
                actual: actual.clone(),
            });
        }
    }
    Ok(())
}
