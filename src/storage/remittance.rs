use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::{
    error::Result,
    storage::models::{Adjustment, Payment},
};

/// Record that a remittance trace was applied to a claim. Fails with a
/// UNIQUE violation when the same trace was already posted.
pub fn insert_posting(
    conn: &Connection,
    claim_id: i64,
    trace_number: &str,
    status_code: &str,
    posted_at: DateTime<Utc>,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO remittance_postings (claim_id, trace_number, status_code, posted_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![claim_id, trace_number, status_code, posted_at],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_payment(conn: &Connection, payment: &Payment) -> Result<i64> {
    conn.execute(
        "INSERT INTO payments
         (claim_id, patient_id, amount, payment_date, source, trace_number, raw_remittance)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            payment.claim_id,
            payment.patient_id,
            payment.amount,
            payment.payment_date,
            payment.source,
            payment.trace_number,
            payment.raw_remittance,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_adjustment(conn: &Connection, adjustment: &Adjustment) -> Result<i64> {
    conn.execute(
        "INSERT INTO adjustments (claim_id, charge_id, group_code, reason_code, amount)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            adjustment.claim_id,
            adjustment.charge_id,
            adjustment.group_code,
            adjustment.reason_code,
            adjustment.amount,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn payments_for_claim(conn: &Connection, claim_id: i64) -> Result<Vec<Payment>> {
    let mut stmt = conn.prepare(
        "SELECT id, claim_id, patient_id, amount, payment_date, source, trace_number, raw_remittance
         FROM payments
         WHERE claim_id = ?1
         ORDER BY id",
    )?;

    let payments = stmt
        .query_map([claim_id], |row| {
            Ok(Payment {
                id: row.get(0)?,
                claim_id: row.get(1)?,
                patient_id: row.get(2)?,
                amount: row.get(3)?,
                payment_date: row.get(4)?,
                source: row.get(5)?,
                trace_number: row.get(6)?,
                raw_remittance: row.get(7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(payments)
}

pub fn adjustments_for_claim(conn: &Connection, claim_id: i64) -> Result<Vec<Adjustment>> {
    let mut stmt = conn.prepare(
        "SELECT id, claim_id, charge_id, group_code, reason_code, amount
         FROM adjustments
         WHERE claim_id = ?1
         ORDER BY id",
    )?;

    let adjustments = stmt
        .query_map([claim_id], |row| {
            Ok(Adjustment {
                id: row.get(0)?,
                claim_id: row.get(1)?,
                charge_id: row.get(2)?,
                group_code: row.get(3)?,
                reason_code: row.get(4)?,
                amount: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(adjustments)
}

pub fn total_paid(conn: &Connection, claim_id: i64) -> Result<i64> {
    let total: i64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM payments WHERE claim_id = ?1",
        [claim_id],
        |row| row.get(0),
    )?;
    Ok(total)
}

pub fn total_adjusted(conn: &Connection, claim_id: i64) -> Result<i64> {
    let total: i64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM adjustments WHERE claim_id = ?1",
        [claim_id],
        |row| row.get(0),
    )?;
    Ok(total)
}

pub fn posting_count(conn: &Connection, claim_id: i64) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM remittance_postings WHERE claim_id = ?1",
        [claim_id],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}
