use thiserror::Error;

use crate::edi::ParseError;

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("Billing code not registered: {0}")]
    CodeNotFound(String),

    #[error("Charge has no diagnosis pointers")]
    MissingDiagnosisLink,

    #[error("Charge links {count} diagnoses; a service line carries at most {max}")]
    TooManyDiagnosisPointers { count: usize, max: usize },

    #[error("Diagnosis pointer {pointer} out of range: encounter {encounter_id} has {available} diagnoses")]
    InvalidDiagnosisPointer {
        encounter_id: i64,
        pointer: u32,
        available: u32,
    },

    #[error("Charge units must be at least 1, got {0}")]
    InvalidUnits(u32),

    #[error("Charge {code} already recorded for encounter {encounter_id} on {service_date}")]
    DuplicateCharge {
        encounter_id: i64,
        code: String,
        service_date: chrono::NaiveDate,
    },

    #[error("No pending charges to bill for encounter {0}")]
    NoChargesToBill(i64),

    #[error("Claim validation failed: missing or invalid {field}")]
    ClaimValidation { field: String },

    #[error("Claim not found: {0}")]
    ClaimNotFound(String),

    #[error("Denial not found: {0}")]
    DenialNotFound(i64),

    #[error("Encounter not found: {0}")]
    EncounterNotFound(i64),

    #[error("Insurance policy not found: {0}")]
    InsuranceNotFound(i64),

    #[error("Charge not found: {0}")]
    ChargeNotFound(i64),

    #[error("Charge {0} is already on a claim and can no longer change")]
    ChargeLocked(i64),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Remittance {trace_number} already posted to claim {claim_number}")]
    AlreadyPosted {
        claim_number: String,
        trace_number: String,
    },

    #[error("Clearinghouse submission failed: {0}")]
    ClearinghouseSubmissionFailed(String),

    #[error("Remittance parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    ExternalService,
    Parse,
    Storage,
    Config,
}

impl BillingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BillingError::MissingDiagnosisLink
            | BillingError::InvalidDiagnosisPointer { .. }
            | BillingError::TooManyDiagnosisPointers { .. }
            | BillingError::InvalidUnits(_)
            | BillingError::DuplicateCharge { .. }
            | BillingError::NoChargesToBill(_)
            | BillingError::ClaimValidation { .. } => ErrorKind::Validation,
            BillingError::CodeNotFound(_)
            | BillingError::ClaimNotFound(_)
            | BillingError::DenialNotFound(_)
            | BillingError::EncounterNotFound(_)
            | BillingError::InsuranceNotFound(_)
            | BillingError::ChargeNotFound(_) => ErrorKind::NotFound,
            BillingError::InvalidTransition { .. }
            | BillingError::AlreadyPosted { .. }
            | BillingError::ChargeLocked(_) => ErrorKind::Conflict,
            BillingError::ClearinghouseSubmissionFailed(_) => ErrorKind::ExternalService,
            BillingError::Parse(_) => ErrorKind::Parse,
            BillingError::Database(_) | BillingError::Json(_) | BillingError::Io(_) => {
                ErrorKind::Storage
            }
            BillingError::Config(_) => ErrorKind::Config,
        }
    }

    /// Only external-service failures are worth retrying as-is.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::ExternalService
    }

    pub(crate) fn validation(field: impl Into<String>) -> Self {
        BillingError::ClaimValidation { field: field.into() }
    }
}

pub type Result<T> = std::result::Result<T, BillingError>;
