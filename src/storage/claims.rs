use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::{
    error::Result,
    storage::{
        db::json_column,
        models::{Charge, Claim, ClaimStatus},
    },
};

const CLAIM_COLUMNS: &str = "id, encounter_id, patient_id, insurance_id, claim_number,
     total_charge_amount, total_paid_amount, patient_responsibility, status,
     submission_date, adjudication_date, clearinghouse_claim_id, edi_content, created_at";

pub fn insert_claim(conn: &Connection, claim: &Claim) -> Result<i64> {
    conn.execute(
        "INSERT INTO claims
         (encounter_id, patient_id, insurance_id, claim_number, total_charge_amount,
          total_paid_amount, patient_responsibility, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            claim.encounter_id,
            claim.patient_id,
            claim.insurance_id,
            claim.claim_number,
            claim.total_charge_amount,
            claim.total_paid_amount,
            claim.patient_responsibility,
            claim.status,
            claim.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_claim_charge(
    conn: &Connection,
    claim_id: i64,
    charge_id: i64,
    line_number: u32,
) -> Result<()> {
    conn.execute(
        "INSERT INTO claim_charges (claim_id, charge_id, line_number) VALUES (?1, ?2, ?3)",
        params![claim_id, charge_id, line_number],
    )?;
    Ok(())
}

pub fn get_claim(conn: &Connection, id: i64) -> Result<Option<Claim>> {
    let sql = format!("SELECT {} FROM claims WHERE id = ?1", CLAIM_COLUMNS);
    Ok(conn.query_row(&sql, [id], claim_from_row).optional()?)
}

pub fn find_by_number(conn: &Connection, claim_number: &str) -> Result<Option<Claim>> {
    let sql = format!("SELECT {} FROM claims WHERE claim_number = ?1", CLAIM_COLUMNS);
    Ok(conn.query_row(&sql, [claim_number], claim_from_row).optional()?)
}

pub fn list_claims(conn: &Connection, status: Option<ClaimStatus>) -> Result<Vec<Claim>> {
    let claims = match status {
        Some(status) => {
            let sql = format!(
                "SELECT {} FROM claims WHERE status = ?1 ORDER BY id DESC",
                CLAIM_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([status], claim_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let sql = format!("SELECT {} FROM claims ORDER BY id DESC", CLAIM_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], claim_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        }
    };
    Ok(claims)
}

/// Service lines of a claim: (line_number, charge) ordered by line number.
pub fn claim_lines(conn: &Connection, claim_id: i64) -> Result<Vec<(u32, Charge)>> {
    let mut stmt = conn.prepare(
        "SELECT cc.line_number, c.id, c.encounter_id, c.patient_id, c.provider_id, c.code,
                c.description, c.modifiers, c.units, c.amount, c.diagnosis_pointers,
                c.service_date, c.status
         FROM claim_charges cc
         JOIN charges c ON c.id = cc.charge_id
         WHERE cc.claim_id = ?1
         ORDER BY cc.line_number",
    )?;

    let lines = stmt
        .query_map([claim_id], |row| {
            let line_number: u32 = row.get(0)?;
            let charge = charge_from_offset(row)?;
            Ok((line_number, charge))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(lines)
}

/// Claim id already linked to a charge, if any.
pub fn claim_for_charge(conn: &Connection, charge_id: i64) -> Result<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT claim_id FROM claim_charges WHERE charge_id = ?1",
            [charge_id],
            |row| row.get(0),
        )
        .optional()?)
}

pub fn mark_submitted(
    conn: &Connection,
    claim_id: i64,
    edi_content: &str,
    submitted_at: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE claims SET status = ?1, edi_content = ?2, submission_date = ?3 WHERE id = ?4",
        params![ClaimStatus::Submitted, edi_content, submitted_at, claim_id],
    )?;
    Ok(())
}

pub fn set_clearinghouse_id(conn: &Connection, claim_id: i64, tracking_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE claims SET clearinghouse_claim_id = ?1 WHERE id = ?2",
        params![tracking_id, claim_id],
    )?;
    Ok(())
}

pub fn update_status(conn: &Connection, claim_id: i64, status: ClaimStatus) -> Result<()> {
    conn.execute(
        "UPDATE claims SET status = ?1 WHERE id = ?2",
        params![status, claim_id],
    )?;
    Ok(())
}

pub fn record_adjudication(
    conn: &Connection,
    claim_id: i64,
    total_paid_amount: i64,
    patient_responsibility: i64,
    adjudication_date: NaiveDate,
    status: ClaimStatus,
) -> Result<()> {
    conn.execute(
        "UPDATE claims
         SET total_paid_amount = ?1, patient_responsibility = ?2,
             adjudication_date = ?3, status = ?4
         WHERE id = ?5",
        params![
            total_paid_amount,
            patient_responsibility,
            adjudication_date,
            status,
            claim_id,
        ],
    )?;
    Ok(())
}

fn claim_from_row(row: &Row<'_>) -> rusqlite::Result<Claim> {
    Ok(Claim {
        id: row.get(0)?,
        encounter_id: row.get(1)?,
        patient_id: row.get(2)?,
        insurance_id: row.get(3)?,
        claim_number: row.get(4)?,
        total_charge_amount: row.get(5)?,
        total_paid_amount: row.get(6)?,
        patient_responsibility: row.get(7)?,
        status: row.get(8)?,
        submission_date: row.get(9)?,
        adjudication_date: row.get(10)?,
        clearinghouse_claim_id: row.get(11)?,
        edi_content: row.get(12)?,
        created_at: row.get(13)?,
    })
}

// Charge columns shifted by one for the line_number prefix.
fn charge_from_offset(row: &Row<'_>) -> rusqlite::Result<Charge> {
    Ok(Charge {
        id: row.get(1)?,
        encounter_id: row.get(2)?,
        patient_id: row.get(3)?,
        provider_id: row.get(4)?,
        code: row.get(5)?,
        description: row.get(6)?,
        modifiers: json_column(row, 7)?,
        units: row.get(8)?,
        amount: row.get(9)?,
        diagnosis_pointers: json_column(row, 10)?,
        service_date: row.get(11)?,
        status: row.get(12)?,
    })
}
