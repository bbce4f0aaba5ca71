use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::{
    error::Result,
    storage::{
        db::{json_column, to_json},
        models::{Charge, ChargeStatus},
    },
};

const CHARGE_COLUMNS: &str = "id, encounter_id, patient_id, provider_id, code, description,
     modifiers, units, amount, diagnosis_pointers, service_date, status";

pub fn insert_charge(conn: &Connection, charge: &Charge) -> rusqlite::Result<i64> {
    let modifiers = serde_json::to_string(&charge.modifiers)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    let pointers = serde_json::to_string(&charge.diagnosis_pointers)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

    conn.execute(
        "INSERT INTO charges
         (encounter_id, patient_id, provider_id, code, description, modifiers,
          units, amount, diagnosis_pointers, service_date, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            charge.encounter_id,
            charge.patient_id,
            charge.provider_id,
            charge.code,
            charge.description,
            modifiers,
            charge.units,
            charge.amount,
            pointers,
            charge.service_date,
            charge.status,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_charge(conn: &Connection, id: i64) -> Result<Option<Charge>> {
    let sql = format!("SELECT {} FROM charges WHERE id = ?1", CHARGE_COLUMNS);
    Ok(conn.query_row(&sql, [id], charge_from_row).optional()?)
}

/// Pending charges for an encounter in insertion order.
pub fn pending_for_encounter(conn: &Connection, encounter_id: i64) -> Result<Vec<Charge>> {
    let sql = format!(
        "SELECT {} FROM charges WHERE encounter_id = ?1 AND status = ?2 ORDER BY id",
        CHARGE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let charges = stmt
        .query_map(params![encounter_id, ChargeStatus::Pending], charge_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(charges)
}

/// Flip a pending charge to submitted. Returns false when the charge was not
/// pending (already claimed elsewhere).
pub fn mark_submitted(conn: &Connection, charge_id: i64) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE charges SET status = ?1 WHERE id = ?2 AND status = ?3",
        params![ChargeStatus::Submitted, charge_id, ChargeStatus::Pending],
    )?;
    Ok(updated == 1)
}

/// Modifiers and units may only change while the charge is pending.
pub fn update_pending(conn: &Connection, charge: &Charge) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE charges
         SET modifiers = ?1, units = ?2, amount = ?3, diagnosis_pointers = ?4
         WHERE id = ?5 AND status = ?6",
        params![
            to_json(&charge.modifiers)?,
            charge.units,
            charge.amount,
            to_json(&charge.diagnosis_pointers)?,
            charge.id,
            ChargeStatus::Pending,
        ],
    )?;
    Ok(updated == 1)
}

pub(crate) fn charge_from_row(row: &Row<'_>) -> rusqlite::Result<Charge> {
    Ok(Charge {
        id: row.get(0)?,
        encounter_id: row.get(1)?,
        patient_id: row.get(2)?,
        provider_id: row.get(3)?,
        code: row.get(4)?,
        description: row.get(5)?,
        modifiers: json_column(row, 6)?,
        units: row.get(7)?,
        amount: row.get(8)?,
        diagnosis_pointers: json_column(row, 9)?,
        service_date: row.get(10)?,
        status: row.get(11)?,
    })
}
