use serde::{Deserialize, Serialize};
use tracing::info;

/// An already-authenticated, already-authorized caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
}

impl Actor {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }

    /// Identity used for unattended work such as remittance imports.
    pub fn system() -> Self {
        Self::new("system")
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.user_id)
    }
}

/// Audited billing actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    ClaimCreated,
    ClaimSubmitted,
    RemittancePosted,
    AppealCreated,
    DenialResolved,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::ClaimCreated => "claim_created",
            AuditAction::ClaimSubmitted => "claim_submitted",
            AuditAction::RemittancePosted => "remittance_posted",
            AuditAction::AppealCreated => "appeal_created",
            AuditAction::DenialResolved => "denial_resolved",
        }
    }
}

/// Sink for the PHI access trail. Storage of the trail lives outside this crate.
#[cfg_attr(test, mockall::automock)]
pub trait AuditLog {
    fn record(&self, user_id: &str, action: AuditAction, resource: &str, detail: &str);
}

/// Emits each audit record as a structured event on the `audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditLog;

impl AuditLog for TracingAuditLog {
    fn record(&self, user_id: &str, action: AuditAction, resource: &str, detail: &str) {
        info!(
            target: "audit",
            user_id,
            action = action.as_str(),
            resource,
            detail,
            "audit"
        );
    }
}

impl<T: AuditLog + ?Sized> AuditLog for &T {
    fn record(&self, user_id: &str, action: AuditAction, resource: &str, detail: &str) {
        (**self).record(user_id, action, resource, detail)
    }
}
