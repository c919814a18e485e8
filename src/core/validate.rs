use crate::{
    error::ValidationError,
    op::{ChangeRequest, MutationKind},
    roll::RollPatch,
};

/// Checks the whole request before any document is read.
pub fn validate_request(request: &ChangeRequest) -> Result<(), ValidationError> {
    if request.is_empty() {
        return Err(ValidationError::EmptyBatch);
    }

    match request {
        ChangeRequest::Changes { changes } => {
            for (index, change) in changes.iter().enumerate() {
                match change.kind {
                    MutationKind::Add => {
                        change
                            .patch
                            .to_roll()
                            .map_err(|field| ValidationError::IncompleteRoll { index, field })?;
                    }
                    MutationKind::Update | MutationKind::Delete => {
                        if change.target_id.trim().is_empty() {
                            return Err(ValidationError::MissingTargetId { index });
                        }
                    }
                }
                check_quantity(index, &change.patch)?;
            }
        }
        ChangeRequest::ReplaceOc { oc, updated_rolls } => {
            if oc.trim().is_empty() {
                return Err(ValidationError::MissingOc);
            }
            for (index, patch) in updated_rolls.iter().enumerate() {
                if patch.roll_id.as_deref().is_none_or(|id| id.trim().is_empty()) {
                    return Err(ValidationError::MissingTargetId { index });
                }
                check_quantity(index, patch)?;
            }
        }
    }
    Ok(())
}

fn check_quantity(index: usize, patch: &RollPatch) -> Result<(), ValidationError> {
    match patch.cantidad {
        Some(value) if !value.is_finite() || value < 0.0 => {
            Err(ValidationError::InvalidQuantity { index, value })
        }
        _ => Ok(()),
    }
}
