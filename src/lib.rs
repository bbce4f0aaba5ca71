pub mod audit;
pub mod billing;
pub mod clearinghouse;
pub mod coding;
pub mod config;
pub mod edi;
pub mod error;
pub mod money;
pub mod reconcile;
pub mod storage;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use error::{BillingError, ErrorKind, Result};
