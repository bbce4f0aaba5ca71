use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    audit::{Actor, AuditAction, AuditLog},
    billing::ensure_transition,
    clearinghouse::{ClaimSubmission, ClearinghouseGateway},
    config::EdiConfig,
    edi::x837::{
        encode_claim, ClaimGraph, ClaimLine, ControlNumbers, MAX_CLAIM_DIAGNOSES, MAX_LINE_POINTERS,
    },
    error::{BillingError, Result},
    money::format_decimal,
    storage::{
        charges, claims,
        db::{next_sequence, CLAIM_NUMBER_SEQUENCE, INTERCHANGE_SEQUENCE},
        models::{Claim, ClaimStatus},
        reference, remittance, Database,
    },
};

const CLAIM_NUMBER_PREFIX: &str = "CLM";

pub fn format_claim_number(sequence: i64) -> String {
    format!("{}{:08}", CLAIM_NUMBER_PREFIX, sequence)
}

/// Money position of one claim, in cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimBalance {
    pub claim_number: String,
    pub charged: i64,
    pub paid: i64,
    pub adjusted: i64,
    /// charged - paid - adjusted
    pub outstanding: i64,
    /// outstanding is within tolerance of zero
    pub balanced: bool,
}

pub fn compute_balance(conn: &Connection, claim: &Claim, tolerance_cents: i64) -> Result<ClaimBalance> {
    let paid = remittance::total_paid(conn, claim.id)?;
    let adjusted = remittance::total_adjusted(conn, claim.id)?;
    let outstanding = claim.total_charge_amount - paid - adjusted;
    Ok(ClaimBalance {
        claim_number: claim.claim_number.clone(),
        charged: claim.total_charge_amount,
        paid,
        adjusted,
        outstanding,
        balanced: outstanding.abs() <= tolerance_cents,
    })
}

/// Builds claims from pending charges and moves them through submission.
pub struct ClaimAssembler<'a, G, A> {
    db: &'a Database,
    gateway: G,
    audit: A,
    envelope: EdiConfig,
    tolerance_cents: i64,
}

impl<'a, G, A> ClaimAssembler<'a, G, A>
where
    G: ClearinghouseGateway,
    A: AuditLog,
{
    pub fn new(db: &'a Database, gateway: G, audit: A, envelope: EdiConfig) -> Self {
        Self {
            db,
            gateway,
            audit,
            envelope,
            tolerance_cents: 0,
        }
    }

    pub fn with_balance_tolerance(mut self, tolerance_cents: i64) -> Self {
        self.tolerance_cents = tolerance_cents;
        self
    }

    /// Bundle every pending charge on the encounter into a new draft claim.
    pub fn create_claim(&self, encounter_id: i64, insurance_id: i64, actor: &Actor) -> Result<Claim> {
        let tx = self.db.begin()?;

        let encounter = reference::get_encounter(&tx, encounter_id)?
            .ok_or(BillingError::EncounterNotFound(encounter_id))?;
        let insurance = reference::get_insurance(&tx, insurance_id)?
            .ok_or(BillingError::InsuranceNotFound(insurance_id))?;
        if insurance.patient_id != encounter.patient_id {
            return Err(BillingError::validation("insurance.patient_id"));
        }

        let pending = charges::pending_for_encounter(&tx, encounter_id)?;
        if pending.is_empty() {
            return Err(BillingError::NoChargesToBill(encounter_id));
        }

        let claim_number = format_claim_number(next_sequence(&tx, CLAIM_NUMBER_SEQUENCE)?);
        let mut claim = Claim {
            id: 0,
            encounter_id,
            patient_id: encounter.patient_id,
            insurance_id,
            claim_number,
            total_charge_amount: pending.iter().map(|c| c.amount).sum(),
            total_paid_amount: 0,
            patient_responsibility: 0,
            status: ClaimStatus::Draft,
            submission_date: None,
            adjudication_date: None,
            clearinghouse_claim_id: None,
            edi_content: None,
            created_at: Utc::now(),
        };
        claim.id = claims::insert_claim(&tx, &claim)?;

        for (idx, charge) in pending.iter().enumerate() {
            claims::insert_claim_charge(&tx, claim.id, charge.id, idx as u32 + 1)?;
            if !charges::mark_submitted(&tx, charge.id)? {
                return Err(BillingError::ChargeLocked(charge.id));
            }
        }

        tx.commit()?;

        info!(
            "Created claim {} for encounter {} ({} lines, total {})",
            claim.claim_number,
            encounter_id,
            pending.len(),
            format_decimal(claim.total_charge_amount)
        );
        self.audit.record(
            &actor.user_id,
            AuditAction::ClaimCreated,
            &format!("claim:{}", claim.claim_number),
            &format!("encounter={} total={}", encounter_id, format_decimal(claim.total_charge_amount)),
        );

        Ok(claim)
    }

    /// Encode, persist, and send a claim. The write transaction stays open
    /// across the clearinghouse call so a failed send leaves no trace.
    pub async fn submit_claim(&self, claim_id: i64, actor: &Actor) -> Result<Claim> {
        let tx = self.db.begin()?;

        let claim = claims::get_claim(&tx, claim_id)?
            .ok_or_else(|| BillingError::ClaimNotFound(claim_id.to_string()))?;
        ensure_transition(claim.status, ClaimStatus::Submitted)?;

        let graph = load_claim_graph(&tx, claim)?;
        validate_claim_graph(&graph)?;

        let interchange = next_sequence(&tx, INTERCHANGE_SEQUENCE)?;
        let now = Utc::now();
        let document = encode_claim(&graph, &self.envelope, ControlNumbers::single(interchange), now);
        let edi_content = document.render();
        debug!(
            "Encoded claim {} into {} segments",
            graph.claim.claim_number,
            document.segment_count()
        );

        claims::mark_submitted(&tx, claim_id, &edi_content, now)?;

        let submission = ClaimSubmission {
            edi_content,
            claim_number: graph.claim.claim_number.clone(),
            payer_id: graph.insurance.payer_id.clone(),
        };
        let receipt = match self.gateway.submit(&submission).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!("Submission of claim {} failed: {}", submission.claim_number, e);
                return Err(e);
            }
        };

        claims::set_clearinghouse_id(&tx, claim_id, &receipt.claim_id)?;
        tx.commit()?;

        info!(
            "Submitted claim {} (clearinghouse id {})",
            submission.claim_number, receipt.claim_id
        );
        self.audit.record(
            &actor.user_id,
            AuditAction::ClaimSubmitted,
            &format!("claim:{}", submission.claim_number),
            &format!("clearinghouse_id={} status={}", receipt.claim_id, receipt.status),
        );

        self.get_claim(claim_id)
    }

    pub fn get_claim(&self, claim_id: i64) -> Result<Claim> {
        claims::get_claim(self.db.conn(), claim_id)?
            .ok_or_else(|| BillingError::ClaimNotFound(claim_id.to_string()))
    }

    pub fn find_by_number(&self, claim_number: &str) -> Result<Claim> {
        claims::find_by_number(self.db.conn(), claim_number)?
            .ok_or_else(|| BillingError::ClaimNotFound(claim_number.to_string()))
    }

    pub fn list_claims(&self, status: Option<ClaimStatus>) -> Result<Vec<Claim>> {
        claims::list_claims(self.db.conn(), status)
    }

    pub fn claim_lines(&self, claim_id: i64) -> Result<Vec<ClaimLine>> {
        Ok(claims::claim_lines(self.db.conn(), claim_id)?
            .into_iter()
            .map(|(line_number, charge)| ClaimLine { line_number, charge })
            .collect())
    }

    pub fn claim_balance(&self, claim_id: i64) -> Result<ClaimBalance> {
        let claim = self.get_claim(claim_id)?;
        compute_balance(self.db.conn(), &claim, self.tolerance_cents)
    }
}

/// Load everything the encoder reads about a claim.
pub fn load_claim_graph(conn: &Connection, claim: Claim) -> Result<ClaimGraph> {
    let encounter = reference::get_encounter(conn, claim.encounter_id)?
        .ok_or(BillingError::EncounterNotFound(claim.encounter_id))?;
    let insurance = reference::get_insurance(conn, claim.insurance_id)?
        .ok_or(BillingError::InsuranceNotFound(claim.insurance_id))?;
    let patient = reference::get_patient(conn, claim.patient_id)?
        .ok_or_else(|| BillingError::validation("patient"))?;
    let clinic = reference::get_clinic(conn, encounter.clinic_id)?
        .ok_or_else(|| BillingError::validation("billing_provider"))?;
    let provider = reference::get_provider(conn, encounter.provider_id)?
        .ok_or_else(|| BillingError::validation("rendering_provider"))?;
    let diagnoses = reference::get_diagnoses(conn, encounter.id)?;
    let lines = claims::claim_lines(conn, claim.id)?
        .into_iter()
        .map(|(line_number, charge)| ClaimLine { line_number, charge })
        .collect();

    Ok(ClaimGraph {
        claim,
        encounter,
        patient,
        insurance,
        clinic,
        provider,
        diagnoses,
        lines,
    })
}

/// Fail on the first field a payer would reject.
pub fn validate_claim_graph(graph: &ClaimGraph) -> Result<()> {
    fn blank(s: &str) -> bool {
        s.trim().is_empty()
    }

    if blank(&graph.patient.first_name) || blank(&graph.patient.last_name) {
        return Err(BillingError::validation("patient.name"));
    }
    if graph.patient.date_of_birth.is_none() {
        return Err(BillingError::validation("patient.date_of_birth"));
    }
    if blank(&graph.insurance.member_id) {
        return Err(BillingError::validation("subscriber.member_id"));
    }
    if blank(&graph.insurance.payer_id) {
        return Err(BillingError::validation("payer.id"));
    }
    if !graph.patient_is_subscriber() {
        let first = graph.insurance.subscriber_first_name.as_deref().unwrap_or("");
        let last = graph.insurance.subscriber_last_name.as_deref().unwrap_or("");
        if blank(first) || blank(last) {
            return Err(BillingError::validation("subscriber.name"));
        }
    }
    if !is_valid_npi(&graph.clinic.npi) {
        return Err(BillingError::validation("billing_provider.npi"));
    }
    if blank(&graph.clinic.tax_id) {
        return Err(BillingError::validation("billing_provider.tax_id"));
    }
    if !is_valid_npi(&graph.provider.npi) {
        return Err(BillingError::validation("rendering_provider.npi"));
    }
    if graph.diagnoses.is_empty() || graph.diagnoses.len() > MAX_CLAIM_DIAGNOSES {
        return Err(BillingError::validation("diagnoses"));
    }
    if graph.lines.is_empty() {
        return Err(BillingError::validation("service_lines"));
    }
    for line in &graph.lines {
        let pointers = line.charge.diagnosis_pointers.len();
        if pointers == 0 || pointers > MAX_LINE_POINTERS {
            return Err(BillingError::validation(format!(
                "service_lines[{}].diagnosis_pointers",
                line.line_number
            )));
        }
    }
    Ok(())
}

fn is_valid_npi(npi: &str) -> bool {
    npi.len() == 10 && npi.chars().all(|c| c.is_ascii_digit())
}
