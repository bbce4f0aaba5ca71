use std::path::Path;

use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    audit::{Actor, AuditAction, AuditLog},
    billing::{claims::compute_balance, ensure_transition},
    config::{BillingConfig, DenialPolicy},
    edi::x835::{parse_remittance, RemittanceAdvice, RemittanceClaim},
    error::{BillingError, Result},
    money::format_decimal,
    reconcile::reasons,
    storage::{
        claims, denials,
        db::{is_unique_violation, to_json},
        models::{Adjustment, Claim, ClaimStatus, Denial, DenialStatus, Payment},
        remittance, Database,
    },
};

pub const ERA_PAYMENT_SOURCE: &str = "ERA";

/// One claim in a remittance batch that could not be posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimError {
    pub claim_number: String,
    pub error_message: String,
}

/// Result of posting a remittance. Per-claim failures are collected here,
/// never raised.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub processed_count: usize,
    pub errors: Vec<ClaimError>,
    /// Sum of payments posted, in cents
    pub posted_amount: i64,
    pub denials_created: usize,
}

impl BatchOutcome {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

struct Posted {
    paid: i64,
    status: ClaimStatus,
    denial: Option<i64>,
}

/// Posts decoded remittances against internal claims.
pub struct Reconciler<'a, A> {
    db: &'a Database,
    audit: A,
    policy: BillingConfig,
}

impl<'a, A: AuditLog> Reconciler<'a, A> {
    pub fn new(db: &'a Database, audit: A, policy: BillingConfig) -> Self {
        Self { db, audit, policy }
    }

    /// Parse raw 835 text and post it.
    pub fn import_remittance(&self, text: &str, actor: &Actor) -> Result<BatchOutcome> {
        let advice = parse_remittance(text)?;
        self.process_remittance(&advice, actor)
    }

    /// Read an 835 file from disk and post it.
    pub fn import_remittance_file(&self, path: &Path, actor: &Actor) -> Result<BatchOutcome> {
        debug!("Reading remittance file {}", path.display());
        let text = std::fs::read_to_string(path)?;
        self.import_remittance(&text, actor)
    }

    /// Post every claim record in its own transaction. A failure on one
    /// record rolls back that record only.
    pub fn process_remittance(&self, advice: &RemittanceAdvice, actor: &Actor) -> Result<BatchOutcome> {
        info!(
            "Processing remittance {} from {} ({} claims)",
            advice.trace_number.as_deref().unwrap_or("-"),
            advice.payer_name.as_deref().unwrap_or("unknown payer"),
            advice.claims.len()
        );

        let mut outcome = BatchOutcome::default();

        for record in &advice.claims {
            match self.post_claim(advice, record, actor) {
                Ok(posted) => {
                    outcome.processed_count += 1;
                    outcome.posted_amount += posted.paid;
                    if posted.denial.is_some() {
                        outcome.denials_created += 1;
                    }
                    debug!("Claim {} is now {}", record.claim_number, posted.status);
                }
                Err(e) => {
                    warn!("Failed to post claim {}: {}", record.claim_number, e);
                    outcome.errors.push(ClaimError {
                        claim_number: record.claim_number.clone(),
                        error_message: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Remittance complete: {} posted, {} failed, {} paid, {} denials",
            outcome.processed_count,
            outcome.errors.len(),
            format_decimal(outcome.posted_amount),
            outcome.denials_created
        );

        Ok(outcome)
    }

    fn post_claim(
        &self,
        advice: &RemittanceAdvice,
        record: &RemittanceClaim,
        actor: &Actor,
    ) -> Result<Posted> {
        let tx = self.db.begin()?;

        let claim = claims::find_by_number(&tx, &record.claim_number)?
            .ok_or_else(|| BillingError::ClaimNotFound(record.claim_number.clone()))?;

        let trace_number = advice
            .trace_number
            .clone()
            .or_else(|| record.payer_claim_id.clone())
            .ok_or_else(|| BillingError::validation("remittance.trace_number"))?;

        // Reversals are corrected by hand, never posted.
        if record.total_paid_amount < 0 {
            return Err(BillingError::validation("remittance.total_paid_amount"));
        }

        let now = Utc::now();
        if let Err(e) =
            remittance::insert_posting(&tx, claim.id, &trace_number, &record.status_code, now)
        {
            if is_unique_violation(&e) {
                return Err(BillingError::AlreadyPosted {
                    claim_number: claim.claim_number,
                    trace_number,
                });
            }
            return Err(e.into());
        }

        let denied = record.status_code == reasons::DENIED_STATUS_CODE || record.total_paid_amount == 0;
        let next_status = if denied {
            ClaimStatus::Denied
        } else if claim.status == ClaimStatus::Paid || reasons::is_full_payment(&record.status_code) {
            ClaimStatus::Paid
        } else {
            ClaimStatus::PartiallyPaid
        };
        ensure_transition(claim.status, next_status)?;

        let adjudication_date = advice
            .production_date
            .or(advice.payment_date)
            .unwrap_or_else(|| now.date_naive());

        if record.total_paid_amount > 0 {
            remittance::insert_payment(
                &tx,
                &Payment {
                    id: 0,
                    claim_id: claim.id,
                    patient_id: claim.patient_id,
                    amount: record.total_paid_amount,
                    payment_date: advice.payment_date.unwrap_or(adjudication_date),
                    source: ERA_PAYMENT_SOURCE.to_string(),
                    trace_number: Some(trace_number.clone()),
                    raw_remittance: to_json(record)?,
                },
            )?;
        }

        self.post_adjustments(&tx, &claim, record)?;

        claims::record_adjudication(
            &tx,
            claim.id,
            claim.total_paid_amount + record.total_paid_amount,
            record.patient_responsibility,
            adjudication_date,
            next_status,
        )?;

        let denial = if denied {
            self.record_denial(&tx, &claim, record, adjudication_date)?
        } else {
            None
        };

        tx.commit()?;

        info!(
            "Posted {} to claim {} ({} -> {})",
            format_decimal(record.total_paid_amount),
            claim.claim_number,
            claim.status,
            next_status
        );

        match compute_balance(self.db.conn(), &claim, self.policy.balance_tolerance_cents) {
            Ok(balance) if !balance.balanced && !denied => warn!(
                "Claim {} does not balance: charged {}, paid {}, adjusted {}, outstanding {}",
                claim.claim_number,
                format_decimal(balance.charged),
                format_decimal(balance.paid),
                format_decimal(balance.adjusted),
                format_decimal(balance.outstanding)
            ),
            Ok(_) => {}
            Err(e) => warn!("Could not check balance of claim {}: {}", claim.claim_number, e),
        }

        self.audit.record(
            &actor.user_id,
            AuditAction::RemittancePosted,
            &format!("claim:{}", claim.claim_number),
            &format!(
                "trace={} status_code={} paid={}",
                trace_number,
                record.status_code,
                format_decimal(record.total_paid_amount)
            ),
        );

        Ok(Posted {
            paid: record.total_paid_amount,
            status: next_status,
            denial,
        })
    }

    /// Claim-level adjustments carry no charge. Line-level ones attach to the
    /// first not-yet-matched claim line with the same procedure code.
    fn post_adjustments(
        &self,
        conn: &rusqlite::Connection,
        claim: &Claim,
        record: &RemittanceClaim,
    ) -> Result<()> {
        for adjustment in &record.adjustments {
            remittance::insert_adjustment(
                conn,
                &Adjustment {
                    id: 0,
                    claim_id: claim.id,
                    charge_id: None,
                    group_code: adjustment.group_code.clone(),
                    reason_code: adjustment.reason_code.clone(),
                    amount: adjustment.amount,
                },
            )?;
        }

        let lines = claims::claim_lines(conn, claim.id)?;
        let mut matched = vec![false; lines.len()];

        for service_line in &record.service_lines {
            let charge_id = lines
                .iter()
                .enumerate()
                .find(|(idx, (_, charge))| !matched[*idx] && charge.code == service_line.procedure_code)
                .map(|(idx, (_, charge))| {
                    matched[idx] = true;
                    charge.id
                });

            if charge_id.is_none() {
                debug!(
                    "No claim line for remitted procedure {} on claim {}",
                    service_line.procedure_code, claim.claim_number
                );
            }

            for adjustment in &service_line.adjustments {
                remittance::insert_adjustment(
                    conn,
                    &Adjustment {
                        id: 0,
                        claim_id: claim.id,
                        charge_id,
                        group_code: adjustment.group_code.clone(),
                        reason_code: adjustment.reason_code.clone(),
                        amount: adjustment.amount,
                    },
                )?;
            }
        }

        Ok(())
    }

    fn record_denial(
        &self,
        conn: &rusqlite::Connection,
        claim: &Claim,
        record: &RemittanceClaim,
        adjudication_date: NaiveDate,
    ) -> Result<Option<i64>> {
        if self.policy.denial_policy == DenialPolicy::OnePerOpenDenial
            && denials::has_pending_denial(conn, claim.id)?
        {
            debug!(
                "Claim {} already has a pending denial; not recording another",
                claim.claim_number
            );
            return Ok(None);
        }

        let code = record
            .all_adjustments()
            .next()
            .map(|a| a.reason_code.clone())
            .unwrap_or_else(|| format!("CLP{}", record.status_code));

        let denial = Denial {
            id: 0,
            claim_id: claim.id,
            reason_description: reasons::describe(&code),
            code,
            denied_amount: record.total_charge_amount - record.total_paid_amount,
            status: DenialStatus::Pending,
            appeal_deadline: Some(adjudication_date + Duration::days(self.policy.appeal_window_days)),
            appealed_by: None,
            resolution: None,
            created_at: Utc::now(),
            resolved_at: None,
        };
        let id = denials::insert_denial(conn, &denial)?;

        info!(
            "Recorded denial {} on claim {}: {} ({})",
            id, claim.claim_number, denial.code, denial.reason_description
        );

        Ok(Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audit::{MockAuditLog, TracingAuditLog},
        error::ErrorKind,
        test_support::{fixture, submitted_claim, Fixture},
    };
    use mockall::predicate::{always, eq};

    fn reconciler(fx: &Fixture, policy: DenialPolicy) -> Reconciler<'_, TracingAuditLog> {
        Reconciler::new(
            &fx.db,
            TracingAuditLog,
            BillingConfig {
                denial_policy: policy,
                ..Default::default()
            },
        )
    }

    fn era(trace: &str, body: &str) -> String {
        format!(
            "ST*835*0001~BPR*I*0*C*ACH************20240312~TRN*1*{}*1512345678~\
             DTM*405*20240310~N1*PR*ACME HEALTH~{}SE*20*0001~",
            trace, body
        )
    }

    fn actor() -> Actor {
        Actor::system()
    }

    #[test]
    fn test_batch_continues_past_unknown_claim() {
        let fx = fixture(1);
        let first = submitted_claim(&fx, &["99214"]);
        let third = submitted_claim(&fx, &["99213"]);

        let text = era(
            "EFT1",
            &format!(
                "CLP*{}*1*165.00*165.00*0~\
                 CLP*CLM99999999*1*50.00*50.00*0~\
                 CLP*{}*1*110.00*110.00*0~",
                first.claim_number, third.claim_number
            ),
        );

        let outcome = reconciler(&fx, DenialPolicy::default())
            .import_remittance(&text, &actor())
            .unwrap();

        assert_eq!(outcome.processed_count, 2);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].claim_number, "CLM99999999");
        assert!(outcome.errors[0].error_message.contains("not found"));
        assert_eq!(outcome.posted_amount, 27500);

        for (claim, amount) in [(&first, 16500), (&third, 11000)] {
            let posted = claims::get_claim(fx.db.conn(), claim.id).unwrap().unwrap();
            assert_eq!(posted.status, ClaimStatus::Paid);
            assert_eq!(posted.total_paid_amount, amount);
            assert_eq!(posted.adjudication_date, NaiveDate::from_ymd_opt(2024, 3, 10));

            let payments = remittance::payments_for_claim(fx.db.conn(), claim.id).unwrap();
            assert_eq!(payments.len(), 1);
            assert_eq!(payments[0].source, "ERA");
            assert_eq!(payments[0].trace_number.as_deref(), Some("EFT1"));
            assert_eq!(payments[0].payment_date, NaiveDate::from_ymd_opt(2024, 3, 12).unwrap());
            let raw: RemittanceClaim = serde_json::from_str(&payments[0].raw_remittance).unwrap();
            assert_eq!(raw.claim_number, claim.claim_number);
        }
    }

    #[test]
    fn test_zero_paid_creates_one_denial() {
        let fx = fixture(1);
        let claim = submitted_claim(&fx, &["99214"]);

        let text = era(
            "EFT1",
            &format!("CLP*{}*4*165.00*0*0~CAS*CO*50*165.00~", claim.claim_number),
        );
        let outcome = reconciler(&fx, DenialPolicy::default())
            .import_remittance(&text, &actor())
            .unwrap();
        assert_eq!(outcome.denials_created, 1);
        assert_eq!(outcome.posted_amount, 0);

        let after = claims::get_claim(fx.db.conn(), claim.id).unwrap().unwrap();
        assert_eq!(after.status, ClaimStatus::Denied);
        assert!(remittance::payments_for_claim(fx.db.conn(), claim.id).unwrap().is_empty());

        let recorded = denials::denials_for_claim(fx.db.conn(), claim.id).unwrap();
        assert_eq!(recorded.len(), 1);
        let denial = &recorded[0];
        assert_eq!(denial.code, "50");
        assert_eq!(denial.reason_description, "Not deemed a medical necessity by the payer");
        assert_eq!(denial.denied_amount, 16500);
        assert_eq!(denial.status, DenialStatus::Pending);
        assert_eq!(denial.appeal_deadline, NaiveDate::from_ymd_opt(2024, 6, 8));
    }

    #[test]
    fn test_denial_code_falls_back_to_line_then_status() {
        let fx = fixture(1);
        let by_line = submitted_claim(&fx, &["99213"]);
        let bare = submitted_claim(&fx, &["99212"]);

        let text = era(
            "EFT1",
            &format!(
                "CLP*{}*4*110.00*0~SVC*HC:99213*110.00*0~CAS*CO*96*110.00~\
                 CLP*{}*4*75.00*0~",
                by_line.claim_number, bare.claim_number
            ),
        );
        reconciler(&fx, DenialPolicy::default())
            .import_remittance(&text, &actor())
            .unwrap();

        let line_denial = &denials::denials_for_claim(fx.db.conn(), by_line.id).unwrap()[0];
        assert_eq!(line_denial.code, "96");
        let bare_denial = &denials::denials_for_claim(fx.db.conn(), bare.id).unwrap()[0];
        assert_eq!(bare_denial.code, "CLP4");
        assert_eq!(bare_denial.reason_description, "Code CLP4");
    }

    #[test]
    fn test_second_denial_reuses_open_denial() {
        let fx = fixture(1);
        let claim = submitted_claim(&fx, &["99213"]);
        let reconciler = reconciler(&fx, DenialPolicy::OnePerOpenDenial);
        let body = format!("CLP*{}*4*110.00*0~CAS*CO*16*110.00~", claim.claim_number);

        reconciler.import_remittance(&era("EFT1", &body), &actor()).unwrap();
        let second = reconciler.import_remittance(&era("EFT2", &body), &actor()).unwrap();

        assert_eq!(second.processed_count, 1);
        assert_eq!(second.denials_created, 0);
        assert_eq!(denials::denials_for_claim(fx.db.conn(), claim.id).unwrap().len(), 1);
        assert_eq!(remittance::posting_count(fx.db.conn(), claim.id).unwrap(), 2);
    }

    #[test]
    fn test_one_denial_per_remittance_policy() {
        let fx = fixture(1);
        let claim = submitted_claim(&fx, &["99213"]);
        let reconciler = reconciler(&fx, DenialPolicy::OnePerRemittance);
        let body = format!("CLP*{}*4*110.00*0~CAS*CO*16*110.00~", claim.claim_number);

        reconciler.import_remittance(&era("EFT1", &body), &actor()).unwrap();
        let second = reconciler.import_remittance(&era("EFT2", &body), &actor()).unwrap();

        assert_eq!(second.denials_created, 1);
        assert_eq!(denials::denials_for_claim(fx.db.conn(), claim.id).unwrap().len(), 2);
    }

    #[test]
    fn test_reposting_same_trace_is_rejected() {
        let fx = fixture(1);
        let claim = submitted_claim(&fx, &["99213"]);
        let reconciler = reconciler(&fx, DenialPolicy::default());
        let text = era(
            "EFT1",
            &format!("CLP*{}*23*110.00*80.00*30.00~CAS*PR*1*30.00~", claim.claim_number),
        );

        let first = reconciler.import_remittance(&text, &actor()).unwrap();
        assert!(first.is_clean());
        let after_first = claims::get_claim(fx.db.conn(), claim.id).unwrap().unwrap();
        assert_eq!(after_first.status, ClaimStatus::PartiallyPaid);

        let again = reconciler.import_remittance(&text, &actor()).unwrap();
        assert_eq!(again.processed_count, 0);
        assert!(again.errors[0].error_message.contains("already posted"));

        assert_eq!(remittance::payments_for_claim(fx.db.conn(), claim.id).unwrap().len(), 1);
        assert_eq!(remittance::adjustments_for_claim(fx.db.conn(), claim.id).unwrap().len(), 1);
        let after_second = claims::get_claim(fx.db.conn(), claim.id).unwrap().unwrap();
        assert_eq!(after_second, after_first);
    }

    #[test]
    fn test_partial_payments_accumulate_until_paid() {
        let fx = fixture(1);
        let claim = submitted_claim(&fx, &["99214"]);
        let reconciler = reconciler(&fx, DenialPolicy::default());

        reconciler
            .import_remittance(
                &era("EFT1", &format!("CLP*{}*23*165.00*100.00*0~", claim.claim_number)),
                &actor(),
            )
            .unwrap();
        reconciler
            .import_remittance(
                &era("EFT2", &format!("CLP*{}*1*165.00*65.00*0~", claim.claim_number)),
                &actor(),
            )
            .unwrap();

        let after = claims::get_claim(fx.db.conn(), claim.id).unwrap().unwrap();
        assert_eq!(after.status, ClaimStatus::Paid);
        assert_eq!(after.total_paid_amount, 16500);
        assert_eq!(remittance::total_paid(fx.db.conn(), claim.id).unwrap(), 16500);
    }

    #[test]
    fn test_secondary_payer_posts_to_paid_claim() {
        let fx = fixture(1);
        let claim = submitted_claim(&fx, &["99214"]);
        let reconciler = reconciler(&fx, DenialPolicy::default());

        let primary = reconciler
            .import_remittance(
                &era(
                    "EFT1",
                    &format!("CLP*{}*1*165.00*100.00*65.00~CAS*PR*1*65.00~", claim.claim_number),
                ),
                &actor(),
            )
            .unwrap();
        assert!(primary.is_clean());
        let secondary = reconciler
            .import_remittance(
                &era("EFT2", &format!("CLP*{}*2*165.00*65.00*0~", claim.claim_number)),
                &actor(),
            )
            .unwrap();
        assert!(secondary.is_clean());

        let after = claims::get_claim(fx.db.conn(), claim.id).unwrap().unwrap();
        assert_eq!(after.status, ClaimStatus::Paid);
        assert_eq!(after.total_paid_amount, 16500);
        assert_eq!(remittance::payments_for_claim(fx.db.conn(), claim.id).unwrap().len(), 2);
        assert_eq!(remittance::posting_count(fx.db.conn(), claim.id).unwrap(), 2);
    }

    #[test]
    fn test_paid_claim_cannot_be_denied() {
        let fx = fixture(1);
        let claim = submitted_claim(&fx, &["99213"]);
        let reconciler = reconciler(&fx, DenialPolicy::default());

        reconciler
            .import_remittance(
                &era("EFT1", &format!("CLP*{}*1*110.00*110.00*0~", claim.claim_number)),
                &actor(),
            )
            .unwrap();
        let outcome = reconciler
            .import_remittance(
                &era("EFT2", &format!("CLP*{}*4*110.00*0*0~CAS*CO*50*110.00~", claim.claim_number)),
                &actor(),
            )
            .unwrap();

        assert_eq!(outcome.processed_count, 0);
        assert!(outcome.errors[0].error_message.contains("paid -> denied"));
        assert_eq!(remittance::posting_count(fx.db.conn(), claim.id).unwrap(), 1);
        assert!(denials::denials_for_claim(fx.db.conn(), claim.id).unwrap().is_empty());
    }

    #[test]
    fn test_negative_paid_amount_is_rejected() {
        let fx = fixture(1);
        let claim = submitted_claim(&fx, &["99214"]);
        let reconciler = reconciler(&fx, DenialPolicy::default());

        reconciler
            .import_remittance(
                &era("EFT1", &format!("CLP*{}*23*165.00*100.00*0~", claim.claim_number)),
                &actor(),
            )
            .unwrap();
        let reversal = reconciler
            .import_remittance(
                &era("EFT2", &format!("CLP*{}*22*-165.00*-100.00*0~", claim.claim_number)),
                &actor(),
            )
            .unwrap();

        assert_eq!(reversal.processed_count, 0);
        assert_eq!(reversal.errors.len(), 1);
        assert!(reversal.errors[0].error_message.contains("total_paid_amount"));

        let after = claims::get_claim(fx.db.conn(), claim.id).unwrap().unwrap();
        assert_eq!(after.status, ClaimStatus::PartiallyPaid);
        assert_eq!(after.total_paid_amount, 10000);
        assert_eq!(
            after.total_paid_amount,
            remittance::total_paid(fx.db.conn(), claim.id).unwrap()
        );
        assert_eq!(remittance::posting_count(fx.db.conn(), claim.id).unwrap(), 1);
    }

    #[test]
    fn test_balance_check_failure_does_not_fail_committed_posting() {
        let fx = fixture(1);
        let claim = submitted_claim(&fx, &["99213"]);
        // A zero-paid denial writes no payment, so only the balance read hits this table.
        fx.db.conn().execute_batch("DROP TABLE payments").unwrap();

        let outcome = reconciler(&fx, DenialPolicy::default())
            .import_remittance(
                &era("EFT1", &format!("CLP*{}*4*110.00*0*0~", claim.claim_number)),
                &actor(),
            )
            .unwrap();

        assert!(outcome.is_clean());
        assert_eq!(outcome.processed_count, 1);
        assert_eq!(outcome.denials_created, 1);
        let after = claims::get_claim(fx.db.conn(), claim.id).unwrap().unwrap();
        assert_eq!(after.status, ClaimStatus::Denied);
        assert_eq!(remittance::posting_count(fx.db.conn(), claim.id).unwrap(), 1);
    }

    #[test]
    fn test_line_adjustments_link_to_matching_charges() {
        let fx = fixture(1);
        let claim = submitted_claim(&fx, &["99214", "36415"]);
        let lines = claims::claim_lines(fx.db.conn(), claim.id).unwrap();
        let visit_charge = lines[0].1.id;
        let draw_charge = lines[1].1.id;

        let text = era(
            "EFT1",
            &format!(
                "CLP*{}*1*185.00*150.00*20.00~CAS*OA*23*5.00~\
                 SVC*HC:36415*20.00*10.00~CAS*CO*45*10.00~\
                 SVC*HC:99214*165.00*140.00~CAS*PR*2*20.00~CAS*CO*45*5.00~\
                 SVC*HC:99999*0*0~CAS*CO*97*0~",
                claim.claim_number
            ),
        );
        reconciler(&fx, DenialPolicy::default())
            .import_remittance(&text, &actor())
            .unwrap();

        let adjustments = remittance::adjustments_for_claim(fx.db.conn(), claim.id).unwrap();
        let linked: Vec<(Option<i64>, &str)> = adjustments
            .iter()
            .map(|a| (a.charge_id, a.reason_code.as_str()))
            .collect();
        assert_eq!(
            linked,
            vec![
                (None, "23"),
                (Some(draw_charge), "45"),
                (Some(visit_charge), "2"),
                (Some(visit_charge), "45"),
                (None, "97"),
            ]
        );
    }

    #[test]
    fn test_parse_failure_is_an_error_not_an_outcome() {
        let fx = fixture(1);
        let err = reconciler(&fx, DenialPolicy::default())
            .import_remittance("ST*835*0001~SE*2*0001~", &actor())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_missing_trace_number_fails_the_claim() {
        let fx = fixture(1);
        let claim = submitted_claim(&fx, &["99213"]);
        let text = format!("CLP*{}*1*110.00*110.00~", claim.claim_number);
        let outcome = reconciler(&fx, DenialPolicy::default())
            .import_remittance(&text, &actor())
            .unwrap();
        assert_eq!(outcome.processed_count, 0);
        assert!(outcome.errors[0].error_message.contains("remittance.trace_number"));
    }

    #[test]
    fn test_import_from_file() {
        use std::io::Write;

        let fx = fixture(1);
        let claim = submitted_claim(&fx, &["99213"]);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "{}",
            era("EFT9", &format!("CLP*{}*1*110.00*110.00*0~", claim.claim_number))
        )
        .unwrap();

        let reconciler = reconciler(&fx, DenialPolicy::default());
        let outcome = reconciler.import_remittance_file(file.path(), &actor()).unwrap();
        assert_eq!(outcome.processed_count, 1);

        let err = reconciler
            .import_remittance_file(Path::new("/does/not/exist.835"), &actor())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[test]
    fn test_each_posted_claim_is_audited() {
        let fx = fixture(1);
        let claim = submitted_claim(&fx, &["99213"]);

        let mut audit = MockAuditLog::new();
        audit
            .expect_record()
            .with(
                eq("system"),
                eq(AuditAction::RemittancePosted),
                eq(format!("claim:{}", claim.claim_number)),
                always(),
            )
            .times(1)
            .return_const(());

        let text = era(
            "EFT1",
            &format!(
                "CLP*{}*1*110.00*110.00~CLP*CLM00000404*1*1.00*1.00~",
                claim.claim_number
            ),
        );
        Reconciler::new(&fx.db, audit, BillingConfig::default())
            .import_remittance(&text, &actor())
            .unwrap();
    }
}
