use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use crate::{
    audit::{Actor, AuditAction, AuditLog},
    billing::ensure_transition,
    error::{BillingError, Result},
    storage::{
        claims, denials,
        models::{ClaimStatus, Denial, DenialAppeal, DenialStatus},
        Database,
    },
};

/// Appeal and resolution workflow for recorded denials.
pub struct DenialManager<'a, A> {
    db: &'a Database,
    audit: A,
    allow_direct_resolution: bool,
}

impl<'a, A: AuditLog> DenialManager<'a, A> {
    pub fn new(db: &'a Database, audit: A) -> Self {
        Self {
            db,
            audit,
            allow_direct_resolution: false,
        }
    }

    /// Permit resolving a denial that was never appealed.
    pub fn allow_direct_resolution(mut self, allow: bool) -> Self {
        self.allow_direct_resolution = allow;
        self
    }

    /// File an appeal: the denial moves to appealing with the new deadline and
    /// the claim follows from denied to appealing.
    pub fn create_appeal(
        &self,
        denial_id: i64,
        reason: &str,
        supporting_documents: Vec<String>,
        deadline: NaiveDate,
        actor: &Actor,
    ) -> Result<DenialAppeal> {
        if reason.trim().is_empty() {
            return Err(BillingError::validation("appeal.reason"));
        }

        let tx = self.db.begin()?;

        let denial = denials::get_denial(&tx, denial_id)?
            .ok_or(BillingError::DenialNotFound(denial_id))?;
        if denial.status == DenialStatus::Resolved {
            return Err(BillingError::InvalidTransition {
                from: denial.status.to_string(),
                to: DenialStatus::Appealing.to_string(),
            });
        }

        let claim = claims::get_claim(&tx, denial.claim_id)?
            .ok_or_else(|| BillingError::ClaimNotFound(denial.claim_id.to_string()))?;

        // a second appeal on the same denial leaves the claim where it is
        if claim.status != ClaimStatus::Appealing {
            ensure_transition(claim.status, ClaimStatus::Appealing)?;
            claims::update_status(&tx, claim.id, ClaimStatus::Appealing)?;
        }

        let mut appeal = DenialAppeal {
            id: 0,
            denial_id,
            claim_id: claim.id,
            reason: reason.to_string(),
            supporting_documents,
            appellant: actor.user_id.clone(),
            deadline,
            created_at: Utc::now(),
        };
        appeal.id = denials::insert_appeal(&tx, &appeal)?;
        denials::mark_appealing(&tx, denial_id, deadline, &actor.user_id)?;

        tx.commit()?;

        info!(
            "Appeal {} filed on denial {} for claim {} (deadline {})",
            appeal.id, denial_id, claim.claim_number, deadline
        );
        self.audit.record(
            &actor.user_id,
            AuditAction::AppealCreated,
            &format!("denial:{}", denial_id),
            &format!("claim={} deadline={}", claim.claim_number, deadline),
        );

        Ok(appeal)
    }

    /// Close a denial with a free-text outcome and move the claim to resolved.
    pub fn resolve_denial(&self, denial_id: i64, resolution: &str, actor: &Actor) -> Result<Denial> {
        if resolution.trim().is_empty() {
            return Err(BillingError::validation("denial.resolution"));
        }

        let tx = self.db.begin()?;

        let denial = denials::get_denial(&tx, denial_id)?
            .ok_or(BillingError::DenialNotFound(denial_id))?;
        let allowed = match denial.status {
            DenialStatus::Appealing => true,
            DenialStatus::Pending => self.allow_direct_resolution,
            DenialStatus::Resolved => false,
        };
        if !allowed {
            return Err(BillingError::InvalidTransition {
                from: denial.status.to_string(),
                to: DenialStatus::Resolved.to_string(),
            });
        }

        let claim = claims::get_claim(&tx, denial.claim_id)?
            .ok_or_else(|| BillingError::ClaimNotFound(denial.claim_id.to_string()))?;
        if matches!(claim.status, ClaimStatus::Appealing | ClaimStatus::Denied) {
            ensure_transition(claim.status, ClaimStatus::Resolved)?;
            claims::update_status(&tx, claim.id, ClaimStatus::Resolved)?;
        } else {
            warn!(
                "Claim {} is {}; resolving denial {} without moving the claim",
                claim.claim_number, claim.status, denial_id
            );
        }

        denials::mark_resolved(&tx, denial_id, resolution, Utc::now())?;
        let resolved = denials::get_denial(&tx, denial_id)?
            .ok_or(BillingError::DenialNotFound(denial_id))?;

        tx.commit()?;

        info!("Denial {} on claim {} resolved", denial_id, claim.claim_number);
        self.audit.record(
            &actor.user_id,
            AuditAction::DenialResolved,
            &format!("denial:{}", denial_id),
            &format!("claim={} resolution={}", claim.claim_number, resolution),
        );

        Ok(resolved)
    }

    pub fn get_denial(&self, denial_id: i64) -> Result<Denial> {
        denials::get_denial(self.db.conn(), denial_id)?.ok_or(BillingError::DenialNotFound(denial_id))
    }

    pub fn list_denials(&self, status: Option<DenialStatus>) -> Result<Vec<Denial>> {
        denials::list_denials(self.db.conn(), status)
    }

    /// Unresolved denials whose appeal deadline has passed as of `as_of`.
    pub fn overdue_denials(&self, as_of: NaiveDate) -> Result<Vec<Denial>> {
        denials::overdue_denials(self.db.conn(), as_of)
    }

    pub fn appeals_for(&self, denial_id: i64) -> Result<Vec<DenialAppeal>> {
        denials::appeals_for_denial(self.db.conn(), denial_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audit::{MockAuditLog, TracingAuditLog},
        config::BillingConfig,
        error::ErrorKind,
        reconcile::Reconciler,
        storage::models::Claim,
        test_support::{fixture, submitted_claim, Fixture},
    };
    use mockall::predicate::{always, eq};

    fn deny(fx: &Fixture, claim: &Claim, trace: &str) -> i64 {
        let text = format!(
            "TRN*1*{}*1512345678~DTM*405*20240310~CLP*{}*4*{}*0~CAS*CO*197*1.00~",
            trace,
            claim.claim_number,
            crate::money::format_decimal(claim.total_charge_amount)
        );
        Reconciler::new(&fx.db, TracingAuditLog, BillingConfig::default())
            .import_remittance(&text, &Actor::system())
            .unwrap();
        denials::denials_for_claim(fx.db.conn(), claim.id).unwrap().last().unwrap().id
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn claim_status(fx: &Fixture, claim: &Claim) -> ClaimStatus {
        claims::get_claim(fx.db.conn(), claim.id).unwrap().unwrap().status
    }

    #[test]
    fn test_appeal_moves_denial_and_claim() {
        let fx = fixture(1);
        let claim = submitted_claim(&fx, &["99213"]);
        let denial_id = deny(&fx, &claim, "EFT1");

        let manager = DenialManager::new(&fx.db, TracingAuditLog);
        let appeal = manager
            .create_appeal(
                denial_id,
                "Authorization was on file",
                vec!["auth-letter.pdf".to_string()],
                date(2024, 5, 1),
                &Actor::new("biller-2"),
            )
            .unwrap();

        assert_eq!(appeal.claim_id, claim.id);
        assert_eq!(appeal.appellant, "biller-2");
        assert_eq!(claim_status(&fx, &claim), ClaimStatus::Appealing);

        let denial = manager.get_denial(denial_id).unwrap();
        assert_eq!(denial.status, DenialStatus::Appealing);
        assert_eq!(denial.appeal_deadline, Some(date(2024, 5, 1)));
        assert_eq!(denial.appealed_by.as_deref(), Some("biller-2"));

        let appeals = manager.appeals_for(denial_id).unwrap();
        assert_eq!(appeals.len(), 1);
        assert_eq!(appeals[0].supporting_documents, vec!["auth-letter.pdf"]);
    }

    #[test]
    fn test_second_appeal_keeps_claim_appealing() {
        let fx = fixture(1);
        let claim = submitted_claim(&fx, &["99213"]);
        let denial_id = deny(&fx, &claim, "EFT1");
        let manager = DenialManager::new(&fx.db, TracingAuditLog);
        let actor = Actor::new("biller-2");

        manager
            .create_appeal(denial_id, "first", vec![], date(2024, 5, 1), &actor)
            .unwrap();
        manager
            .create_appeal(denial_id, "second", vec![], date(2024, 6, 1), &actor)
            .unwrap();

        assert_eq!(claim_status(&fx, &claim), ClaimStatus::Appealing);
        assert_eq!(manager.appeals_for(denial_id).unwrap().len(), 2);
        assert_eq!(
            manager.get_denial(denial_id).unwrap().appeal_deadline,
            Some(date(2024, 6, 1))
        );
    }

    #[test]
    fn test_denial_after_appeal_opens_a_new_denial() {
        let fx = fixture(1);
        let claim = submitted_claim(&fx, &["99213"]);
        let first = deny(&fx, &claim, "EFT1");

        let manager = DenialManager::new(&fx.db, TracingAuditLog);
        manager
            .create_appeal(first, "Resubmitted records", Vec::new(), date(2024, 5, 1), &Actor::system())
            .unwrap();
        let second = deny(&fx, &claim, "EFT2");

        assert_ne!(second, first);
        let rows = denials::denials_for_claim(fx.db.conn(), claim.id).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(manager.get_denial(first).unwrap().status, DenialStatus::Appealing);
        assert_eq!(manager.get_denial(second).unwrap().status, DenialStatus::Pending);
        assert_eq!(claim_status(&fx, &claim), ClaimStatus::Denied);
    }

    #[test]
    fn test_resolve_after_appeal() {
        let fx = fixture(1);
        let claim = submitted_claim(&fx, &["99213"]);
        let denial_id = deny(&fx, &claim, "EFT1");
        let manager = DenialManager::new(&fx.db, TracingAuditLog);
        let actor = Actor::new("biller-2");

        manager
            .create_appeal(denial_id, "retro auth", vec![], date(2024, 5, 1), &actor)
            .unwrap();
        let resolved = manager
            .resolve_denial(denial_id, "Payer overturned on appeal", &actor)
            .unwrap();

        assert_eq!(resolved.status, DenialStatus::Resolved);
        assert_eq!(resolved.resolution.as_deref(), Some("Payer overturned on appeal"));
        assert!(resolved.resolved_at.is_some());
        assert_eq!(claim_status(&fx, &claim), ClaimStatus::Resolved);
    }

    #[test]
    fn test_pending_denial_needs_appeal_unless_allowed() {
        let fx = fixture(1);
        let claim = submitted_claim(&fx, &["99213"]);
        let denial_id = deny(&fx, &claim, "EFT1");
        let actor = Actor::new("biller-2");

        let strict = DenialManager::new(&fx.db, TracingAuditLog);
        let err = strict.resolve_denial(denial_id, "written off", &actor).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(claim_status(&fx, &claim), ClaimStatus::Denied);

        let lenient = DenialManager::new(&fx.db, TracingAuditLog).allow_direct_resolution(true);
        lenient.resolve_denial(denial_id, "written off", &actor).unwrap();
        assert_eq!(claim_status(&fx, &claim), ClaimStatus::Resolved);
    }

    #[test]
    fn test_resolved_denial_is_closed() {
        let fx = fixture(1);
        let claim = submitted_claim(&fx, &["99213"]);
        let denial_id = deny(&fx, &claim, "EFT1");
        let manager = DenialManager::new(&fx.db, TracingAuditLog).allow_direct_resolution(true);
        let actor = Actor::new("biller-2");

        manager.resolve_denial(denial_id, "written off", &actor).unwrap();

        let err = manager
            .create_appeal(denial_id, "too late", vec![], date(2024, 5, 1), &actor)
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid status transition: resolved -> appealing");
        let err = manager.resolve_denial(denial_id, "again", &actor).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_unknown_denial_and_blank_reason() {
        let fx = fixture(1);
        let manager = DenialManager::new(&fx.db, TracingAuditLog);
        let actor = Actor::new("biller-2");

        let err = manager
            .create_appeal(404, "reason", vec![], date(2024, 5, 1), &actor)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = manager
            .create_appeal(404, "  ", vec![], date(2024, 5, 1), &actor)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_overdue_and_filtered_listing() {
        let fx = fixture(1);
        let first = submitted_claim(&fx, &["99213"]);
        let second = submitted_claim(&fx, &["99214"]);
        let appealed = deny(&fx, &first, "EFT1");
        let pending = deny(&fx, &second, "EFT2");

        let manager = DenialManager::new(&fx.db, TracingAuditLog);
        manager
            .create_appeal(appealed, "retro auth", vec![], date(2024, 4, 1), &Actor::system())
            .unwrap();

        // pending deadline is 2024-06-08, the appeal moved the other to 2024-04-01
        let overdue: Vec<i64> = manager
            .overdue_denials(date(2024, 5, 1))
            .unwrap()
            .iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(overdue, vec![appealed]);
        assert!(manager.overdue_denials(date(2024, 4, 1)).unwrap().is_empty());
        assert_eq!(manager.overdue_denials(date(2024, 7, 1)).unwrap().len(), 2);

        let pending_only = manager.list_denials(Some(DenialStatus::Pending)).unwrap();
        assert_eq!(pending_only.len(), 1);
        assert_eq!(pending_only[0].id, pending);
        assert_eq!(manager.list_denials(None).unwrap().len(), 2);
    }

    #[test]
    fn test_appeal_and_resolution_are_audited() {
        let fx = fixture(1);
        let claim = submitted_claim(&fx, &["99213"]);
        let denial_id = deny(&fx, &claim, "EFT1");
        let resource = format!("denial:{}", denial_id);

        let mut audit = MockAuditLog::new();
        audit
            .expect_record()
            .with(eq("biller-2"), eq(AuditAction::AppealCreated), eq(resource.clone()), always())
            .times(1)
            .return_const(());
        audit
            .expect_record()
            .with(eq("biller-2"), eq(AuditAction::DenialResolved), eq(resource), always())
            .times(1)
            .return_const(());

        let manager = DenialManager::new(&fx.db, audit);
        let actor = Actor::new("biller-2");
        manager
            .create_appeal(denial_id, "retro auth", vec![], date(2024, 5, 1), &actor)
            .unwrap();
        manager.resolve_denial(denial_id, "paid on appeal", &actor).unwrap();
    }
}
