pub mod charges;
pub mod claims;
pub mod db;
pub mod denials;
pub mod models;
pub mod reference;
pub mod remittance;

pub use db::{Database, DatabaseStats};
pub use models::{
    Adjustment, BillingCode, Charge, ChargeStatus, Claim, ClaimCharge, ClaimStatus, Denial,
    DenialAppeal, DenialStatus, Payment,
};
