pub mod claims;
pub mod ledger;

use crate::{
    error::{BillingError, Result},
    storage::models::ClaimStatus,
};

pub use claims::{ClaimAssembler, ClaimBalance};
pub use ledger::{ChargeLedger, ChargeUpdate, NewCharge};

/// Reject any claim status change outside the lifecycle table.
pub fn ensure_transition(from: ClaimStatus, to: ClaimStatus) -> Result<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(BillingError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
