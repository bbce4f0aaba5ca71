pub mod denials;
pub mod reasons;
pub mod remittance;

pub use denials::DenialManager;
pub use remittance::{BatchOutcome, ClaimError, Reconciler};
