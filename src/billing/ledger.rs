use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    edi::x837::MAX_LINE_POINTERS,
    error::{BillingError, Result},
    money::format_decimal,
    storage::{
        charges,
        db::is_unique_violation,
        models::{Charge, ChargeStatus},
        reference, Database,
    },
};

/// A billable line item as requested by the caller, before pricing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCharge {
    pub encounter_id: i64,
    pub code: String,
    #[serde(default)]
    pub modifiers: Vec<String>,
    #[serde(default = "default_units")]
    pub units: u32,
    pub diagnosis_pointers: Vec<u32>,
    /// Defaults to the encounter's service date.
    #[serde(default)]
    pub service_date: Option<NaiveDate>,
}

fn default_units() -> u32 {
    1
}

impl NewCharge {
    pub fn new(encounter_id: i64, code: impl Into<String>, diagnosis_pointers: Vec<u32>) -> Self {
        Self {
            encounter_id,
            code: code.into(),
            modifiers: Vec::new(),
            units: 1,
            diagnosis_pointers,
            service_date: None,
        }
    }
}

/// Changes allowed on a charge that has not been claimed yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChargeUpdate {
    pub modifiers: Option<Vec<String>>,
    pub units: Option<u32>,
    pub diagnosis_pointers: Option<Vec<u32>>,
}

pub struct ChargeLedger<'a> {
    db: &'a Database,
}

impl<'a> ChargeLedger<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Price and record a pending charge.
    pub fn add_charge(&self, request: NewCharge) -> Result<Charge> {
        let tx = self.db.begin()?;

        let billing_code = reference::find_billing_code(&tx, &request.code)?
            .ok_or_else(|| BillingError::CodeNotFound(request.code.clone()))?;

        if request.diagnosis_pointers.is_empty() {
            return Err(BillingError::MissingDiagnosisLink);
        }
        check_units(request.units)?;

        let encounter = reference::get_encounter(&tx, request.encounter_id)?
            .ok_or(BillingError::EncounterNotFound(request.encounter_id))?;
        let available = reference::count_diagnoses(&tx, encounter.id)?;
        let diagnosis_pointers =
            normalize_pointers(encounter.id, &request.diagnosis_pointers, available)?;

        let mut charge = Charge {
            id: 0,
            encounter_id: encounter.id,
            patient_id: encounter.patient_id,
            provider_id: encounter.provider_id,
            code: billing_code.code,
            description: billing_code.description,
            modifiers: request.modifiers,
            units: request.units,
            amount: billing_code.fee * i64::from(request.units),
            diagnosis_pointers,
            service_date: request.service_date.unwrap_or(encounter.service_date),
            status: ChargeStatus::Pending,
        };

        charge.id = match charges::insert_charge(&tx, &charge) {
            Ok(id) => id,
            Err(e) if is_unique_violation(&e) => {
                return Err(BillingError::DuplicateCharge {
                    encounter_id: charge.encounter_id,
                    code: charge.code,
                    service_date: charge.service_date,
                })
            }
            Err(e) => return Err(e.into()),
        };

        tx.commit()?;

        info!(
            "Recorded charge {} for encounter {}: {} x{} = {}",
            charge.id,
            charge.encounter_id,
            charge.code,
            charge.units,
            format_decimal(charge.amount)
        );

        Ok(charge)
    }

    /// Change modifiers, units or diagnosis links on a pending charge.
    /// The amount is repriced from the current fee table.
    pub fn update_charge(&self, charge_id: i64, update: ChargeUpdate) -> Result<Charge> {
        let tx = self.db.begin()?;

        let mut charge =
            charges::get_charge(&tx, charge_id)?.ok_or(BillingError::ChargeNotFound(charge_id))?;
        if charge.status != ChargeStatus::Pending {
            return Err(BillingError::ChargeLocked(charge_id));
        }

        if let Some(modifiers) = update.modifiers {
            charge.modifiers = modifiers;
        }
        if let Some(units) = update.units {
            check_units(units)?;
            charge.units = units;
        }
        if let Some(pointers) = update.diagnosis_pointers {
            if pointers.is_empty() {
                return Err(BillingError::MissingDiagnosisLink);
            }
            let available = reference::count_diagnoses(&tx, charge.encounter_id)?;
            charge.diagnosis_pointers = normalize_pointers(charge.encounter_id, &pointers, available)?;
        }

        let fee = reference::find_billing_code(&tx, &charge.code)?
            .ok_or_else(|| BillingError::CodeNotFound(charge.code.clone()))?
            .fee;
        charge.amount = fee * i64::from(charge.units);

        if !charges::update_pending(&tx, &charge)? {
            return Err(BillingError::ChargeLocked(charge_id));
        }
        tx.commit()?;

        debug!("Updated pending charge {}", charge_id);
        Ok(charge)
    }

    pub fn list_pending(&self, encounter_id: i64) -> Result<Vec<Charge>> {
        charges::pending_for_encounter(self.db.conn(), encounter_id)
    }

    pub fn get_charge(&self, charge_id: i64) -> Result<Charge> {
        charges::get_charge(self.db.conn(), charge_id)?.ok_or(BillingError::ChargeNotFound(charge_id))
    }
}

fn check_units(units: u32) -> Result<()> {
    if units == 0 {
        return Err(BillingError::InvalidUnits(units));
    }
    Ok(())
}

/// Range-check pointers against the encounter's diagnosis count and drop
/// repeats, keeping first-seen order. At most four may remain.
fn normalize_pointers(encounter_id: i64, pointers: &[u32], available: u32) -> Result<Vec<u32>> {
    let mut normalized: Vec<u32> = Vec::with_capacity(pointers.len());
    for &pointer in pointers {
        if pointer == 0 || pointer > available {
            return Err(BillingError::InvalidDiagnosisPointer {
                encounter_id,
                pointer,
                available,
            });
        }
        if !normalized.contains(&pointer) {
            normalized.push(pointer);
        }
    }
    if normalized.len() > MAX_LINE_POINTERS {
        return Err(BillingError::TooManyDiagnosisPointers {
            count: normalized.len(),
            max: MAX_LINE_POINTERS,
        });
    }
    Ok(normalized)
}
