use std::time::Duration;

use tracing::{debug, info};

use crate::{
    clearinghouse::{ClaimSubmission, ClearinghouseGateway, SubmissionReceipt},
    config::ClearinghouseConfig,
    error::{BillingError, Result},
};

/// Clearinghouse reached over HTTPS with a bearer token.
#[derive(Debug, Clone)]
pub struct HttpClearinghouse {
    http_client: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl HttpClearinghouse {
    pub fn new(config: &ClearinghouseConfig) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(BillingError::Config(format!(
                "clearinghouse URL must use http or https, got '{}'",
                config.base_url
            )));
        }

        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BillingError::Config(format!("failed to build HTTP client: {}", e)))?;

        info!("Clearinghouse gateway at {}", base_url);

        Ok(Self {
            http_client,
            base_url,
            api_token: config.api_token.clone(),
        })
    }

    pub fn submit_url(&self) -> String {
        format!("{}/claims/submit", self.base_url)
    }
}

impl ClearinghouseGateway for HttpClearinghouse {
    async fn submit(&self, submission: &ClaimSubmission) -> Result<SubmissionReceipt> {
        debug!("Submitting claim {} to clearinghouse", submission.claim_number);

        let response = self
            .http_client
            .post(self.submit_url())
            .bearer_auth(&self.api_token)
            .json(submission)
            .send()
            .await
            .map_err(|e| BillingError::ClearinghouseSubmissionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BillingError::ClearinghouseSubmissionFailed(format!(
                "HTTP {}: {}",
                status,
                body.trim()
            )));
        }

        let receipt: SubmissionReceipt = response.json().await.map_err(|e| {
            BillingError::ClearinghouseSubmissionFailed(format!("invalid response: {}", e))
        })?;

        info!(
            "Clearinghouse accepted claim {} as {} ({})",
            submission.claim_number, receipt.claim_id, receipt.status
        );

        Ok(receipt)
    }
}
