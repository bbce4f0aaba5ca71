pub mod codes;
pub mod mdm;

use rusqlite::Connection;
use serde::Serialize;
use tracing::info;

use crate::{
    billing::ledger::{ChargeLedger, NewCharge},
    edi::x837::MAX_LINE_POINTERS,
    error::{BillingError, Result},
    storage::{models::Charge, reference, Database},
};

pub use codes::{determine_code, determine_code_for, CodeSelection, EncounterType};
pub use mdm::{assess, ElementScore, EncounterFacts, MdmAssessment, MdmElement, MdmLevel};

/// Result of coding one encounter.
#[derive(Debug, Clone, Serialize)]
pub struct CodingResult {
    pub assessment: MdmAssessment,
    pub selection: CodeSelection,
    /// Present when the charge was recorded.
    pub charge: Option<Charge>,
}

/// Preview without touching the ledger.
pub fn preview(facts: &EncounterFacts) -> CodingResult {
    let assessment = assess(facts);
    let selection = determine_code(assessment.level, &facts.encounter_type);
    CodingResult {
        assessment,
        selection,
        charge: None,
    }
}

/// Register every E&M code the engine can select in the fee table.
pub fn seed_fee_schedule(conn: &Connection) -> Result<usize> {
    let mut seeded = 0;
    for selection in codes::evaluation_codes() {
        reference::upsert_billing_code(conn, &selection.into())?;
        seeded += 1;
    }
    Ok(seeded)
}

pub struct CodingEngine<'a> {
    db: &'a Database,
}

impl<'a> CodingEngine<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Score the encounter, pick its E&M code, and record the pending charge.
    ///
    /// The charge points at the encounter's leading diagnoses by rank, as
    /// many as one service line carries.
    pub fn code_encounter(&self, encounter_id: i64, facts: &EncounterFacts) -> Result<CodingResult> {
        let mut result = preview(facts);

        if reference::get_encounter(self.db.conn(), encounter_id)?.is_none() {
            return Err(BillingError::EncounterNotFound(encounter_id));
        }
        let diagnoses = reference::get_diagnoses(self.db.conn(), encounter_id)?;

        let pointers: Vec<u32> = diagnoses
            .iter()
            .take(MAX_LINE_POINTERS)
            .map(|d| d.rank)
            .collect();

        let charge = ChargeLedger::new(self.db).add_charge(NewCharge::new(
            encounter_id,
            result.selection.code,
            pointers,
        ))?;

        info!(
            "Coded encounter {} as {} ({})",
            encounter_id, result.selection.code, result.assessment.level
        );

        result.charge = Some(charge);
        Ok(result)
    }
}
