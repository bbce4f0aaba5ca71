pub mod http;

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use http::HttpClearinghouse;

/// Request body for one claim submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimSubmission {
    pub edi_content: String,
    pub claim_number: String,
    pub payer_id: String,
}

/// Acknowledgement from the clearinghouse. `claim_id` is its tracking id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub claim_id: String,
    pub status: String,
}

/// Outbound edge to the clearinghouse. Failures surface as
/// `ClearinghouseSubmissionFailed` and are never retried here.
pub trait ClearinghouseGateway {
    fn submit(
        &self,
        submission: &ClaimSubmission,
    ) -> impl Future<Output = Result<SubmissionReceipt>> + Send;
}
