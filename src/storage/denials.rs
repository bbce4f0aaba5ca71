use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::{
    error::Result,
    storage::{
        db::{json_column, to_json},
        models::{Denial, DenialAppeal, DenialStatus},
    },
};

const DENIAL_COLUMNS: &str = "id, claim_id, code, reason_description, denied_amount, status,
     appeal_deadline, appealed_by, resolution, created_at, resolved_at";

pub fn insert_denial(conn: &Connection, denial: &Denial) -> Result<i64> {
    conn.execute(
        "INSERT INTO denials
         (claim_id, code, reason_description, denied_amount, status, appeal_deadline, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            denial.claim_id,
            denial.code,
            denial.reason_description,
            denial.denied_amount,
            denial.status,
            denial.appeal_deadline,
            denial.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_denial(conn: &Connection, id: i64) -> Result<Option<Denial>> {
    let sql = format!("SELECT {} FROM denials WHERE id = ?1", DENIAL_COLUMNS);
    Ok(conn.query_row(&sql, [id], denial_from_row).optional()?)
}

pub fn denials_for_claim(conn: &Connection, claim_id: i64) -> Result<Vec<Denial>> {
    let sql = format!(
        "SELECT {} FROM denials WHERE claim_id = ?1 ORDER BY id",
        DENIAL_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let denials = stmt
        .query_map([claim_id], denial_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(denials)
}

pub fn has_pending_denial(conn: &Connection, claim_id: i64) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM denials WHERE claim_id = ?1 AND status = ?2",
        params![claim_id, DenialStatus::Pending],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn list_denials(conn: &Connection, status: Option<DenialStatus>) -> Result<Vec<Denial>> {
    let denials = match status {
        Some(status) => {
            let sql = format!(
                "SELECT {} FROM denials WHERE status = ?1 ORDER BY id",
                DENIAL_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([status], denial_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let sql = format!("SELECT {} FROM denials ORDER BY id", DENIAL_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], denial_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        }
    };
    Ok(denials)
}

/// Open denials whose appeal deadline is strictly before `as_of`.
pub fn overdue_denials(conn: &Connection, as_of: NaiveDate) -> Result<Vec<Denial>> {
    let sql = format!(
        "SELECT {} FROM denials
         WHERE status != ?1 AND appeal_deadline IS NOT NULL AND appeal_deadline < ?2
         ORDER BY appeal_deadline",
        DENIAL_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let denials = stmt
        .query_map(params![DenialStatus::Resolved, as_of], denial_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(denials)
}

pub fn mark_appealing(
    conn: &Connection,
    denial_id: i64,
    deadline: NaiveDate,
    appellant: &str,
) -> Result<()> {
    conn.execute(
        "UPDATE denials SET status = ?1, appeal_deadline = ?2, appealed_by = ?3 WHERE id = ?4",
        params![DenialStatus::Appealing, deadline, appellant, denial_id],
    )?;
    Ok(())
}

pub fn mark_resolved(
    conn: &Connection,
    denial_id: i64,
    resolution: &str,
    resolved_at: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE denials SET status = ?1, resolution = ?2, resolved_at = ?3 WHERE id = ?4",
        params![DenialStatus::Resolved, resolution, resolved_at, denial_id],
    )?;
    Ok(())
}

pub fn insert_appeal(conn: &Connection, appeal: &DenialAppeal) -> Result<i64> {
    conn.execute(
        "INSERT INTO denial_appeals
         (denial_id, claim_id, reason, supporting_documents, appellant, deadline, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            appeal.denial_id,
            appeal.claim_id,
            appeal.reason,
            to_json(&appeal.supporting_documents)?,
            appeal.appellant,
            appeal.deadline,
            appeal.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn appeals_for_denial(conn: &Connection, denial_id: i64) -> Result<Vec<DenialAppeal>> {
    let mut stmt = conn.prepare(
        "SELECT id, denial_id, claim_id, reason, supporting_documents, appellant, deadline, created_at
         FROM denial_appeals
         WHERE denial_id = ?1
         ORDER BY created_at, id",
    )?;

    let appeals = stmt
        .query_map([denial_id], |row| {
            Ok(DenialAppeal {
                id: row.get(0)?,
                denial_id: row.get(1)?,
                claim_id: row.get(2)?,
                reason: row.get(3)?,
                supporting_documents: json_column(row, 4)?,
                appellant: row.get(5)?,
                deadline: row.get(6)?,
                created_at: row.get(7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(appeals)
}

fn denial_from_row(row: &Row<'_>) -> rusqlite::Result<Denial> {
    Ok(Denial {
        id: row.get(0)?,
        claim_id: row.get(1)?,
        code: row.get(2)?,
        reason_description: row.get(3)?,
        denied_amount: row.get(4)?,
        status: row.get(5)?,
        appeal_deadline: row.get(6)?,
        appealed_by: row.get(7)?,
        resolution: row.get(8)?,
        created_at: row.get(9)?,
        resolved_at: row.get(10)?,
    })
}
