use rusqlite::{
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Type, ValueRef},
    Connection, OptionalExtension, Row, ToSql, Transaction, TransactionBehavior,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::{
    error::Result,
    storage::models::{ChargeStatus, ClaimStatus, DenialStatus, SubscriberRelationship},
};

pub const CLAIM_NUMBER_SEQUENCE: &str = "claim_number";
pub const INTERCHANGE_SEQUENCE: &str = "interchange_control";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sequences (
    name TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS clinics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    npi TEXT NOT NULL,
    tax_id TEXT NOT NULL,
    address_line1 TEXT NOT NULL DEFAULT '',
    city TEXT NOT NULL DEFAULT '',
    state TEXT NOT NULL DEFAULT '',
    zip TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS providers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    npi TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS patients (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    date_of_birth TEXT,
    gender TEXT NOT NULL DEFAULT 'U',
    address_line1 TEXT NOT NULL DEFAULT '',
    city TEXT NOT NULL DEFAULT '',
    state TEXT NOT NULL DEFAULT '',
    zip TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS insurance_policies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id INTEGER NOT NULL REFERENCES patients(id),
    payer_name TEXT NOT NULL,
    payer_id TEXT NOT NULL,
    member_id TEXT NOT NULL,
    group_number TEXT,
    relationship TEXT NOT NULL DEFAULT 'self',
    subscriber_first_name TEXT,
    subscriber_last_name TEXT,
    subscriber_dob TEXT
);

CREATE TABLE IF NOT EXISTS encounters (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id INTEGER NOT NULL REFERENCES patients(id),
    provider_id INTEGER NOT NULL REFERENCES providers(id),
    clinic_id INTEGER NOT NULL REFERENCES clinics(id),
    encounter_type TEXT NOT NULL,
    service_date TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS encounter_diagnoses (
    encounter_id INTEGER NOT NULL REFERENCES encounters(id),
    rank INTEGER NOT NULL,
    code TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (encounter_id, rank)
);

CREATE TABLE IF NOT EXISTS billing_codes (
    code TEXT PRIMARY KEY,
    description TEXT NOT NULL,
    fee INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS charges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    encounter_id INTEGER NOT NULL REFERENCES encounters(id),
    patient_id INTEGER NOT NULL,
    provider_id INTEGER NOT NULL,
    code TEXT NOT NULL,
    description TEXT NOT NULL,
    modifiers TEXT NOT NULL DEFAULT '[]',
    units INTEGER NOT NULL,
    amount INTEGER NOT NULL,
    diagnosis_pointers TEXT NOT NULL,
    service_date TEXT NOT NULL,
    status TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_charges_unique_service
    ON charges(encounter_id, code, service_date);

CREATE TABLE IF NOT EXISTS claims (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    encounter_id INTEGER NOT NULL REFERENCES encounters(id),
    patient_id INTEGER NOT NULL,
    insurance_id INTEGER NOT NULL REFERENCES insurance_policies(id),
    claim_number TEXT NOT NULL UNIQUE,
    total_charge_amount INTEGER NOT NULL,
    total_paid_amount INTEGER NOT NULL DEFAULT 0,
    patient_responsibility INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    submission_date TEXT,
    adjudication_date TEXT,
    clearinghouse_claim_id TEXT,
    edi_content TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_claims_status ON claims(status);

CREATE TABLE IF NOT EXISTS claim_charges (
    claim_id INTEGER NOT NULL REFERENCES claims(id),
    charge_id INTEGER NOT NULL UNIQUE REFERENCES charges(id),
    line_number INTEGER NOT NULL,
    PRIMARY KEY (claim_id, line_number)
);

CREATE TABLE IF NOT EXISTS remittance_postings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    claim_id INTEGER NOT NULL REFERENCES claims(id),
    trace_number TEXT NOT NULL,
    status_code TEXT NOT NULL,
    posted_at TEXT NOT NULL,
    UNIQUE (claim_id, trace_number)
);

CREATE TABLE IF NOT EXISTS payments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    claim_id INTEGER NOT NULL REFERENCES claims(id),
    patient_id INTEGER NOT NULL,
    amount INTEGER NOT NULL,
    payment_date TEXT NOT NULL,
    source TEXT NOT NULL,
    trace_number TEXT,
    raw_remittance TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS adjustments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    claim_id INTEGER NOT NULL REFERENCES claims(id),
    charge_id INTEGER REFERENCES charges(id),
    group_code TEXT NOT NULL,
    reason_code TEXT NOT NULL,
    amount INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS denials (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    claim_id INTEGER NOT NULL REFERENCES claims(id),
    code TEXT NOT NULL,
    reason_description TEXT NOT NULL,
    denied_amount INTEGER NOT NULL,
    status TEXT NOT NULL,
    appeal_deadline TEXT,
    appealed_by TEXT,
    resolution TEXT,
    created_at TEXT NOT NULL,
    resolved_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_denials_status ON denials(status);

CREATE TABLE IF NOT EXISTS denial_appeals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    denial_id INTEGER NOT NULL REFERENCES denials(id),
    claim_id INTEGER NOT NULL REFERENCES claims(id),
    reason TEXT NOT NULL,
    supporting_documents TEXT NOT NULL,
    appellant TEXT NOT NULL,
    deadline TEXT NOT NULL,
    created_at TEXT NOT NULL
);
";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        debug!("Billing schema ready");
        Ok(())
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Start a write transaction. `IMMEDIATE` takes the write lock up front so
    /// concurrent writers serialize instead of failing at commit.
    pub fn begin(&self) -> Result<Transaction<'_>> {
        Ok(Transaction::new_unchecked(
            &self.conn,
            TransactionBehavior::Immediate,
        )?)
    }

    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let mut claims_by_status = Vec::new();
        for status in ClaimStatus::ALL {
            let count: i64 = self.conn.query_row(
                "SELECT COUNT(*) FROM claims WHERE status = ?1",
                [status],
                |row| row.get(0),
            )?;
            claims_by_status.push((status, count as usize));
        }

        let total_charged: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(total_charge_amount), 0) FROM claims",
            [],
            |row| row.get(0),
        )?;

        let total_paid: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM payments",
            [],
            |row| row.get(0),
        )?;

        let total_adjusted: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM adjustments",
            [],
            |row| row.get(0),
        )?;

        let pending_charges: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM charges WHERE status = ?1",
            [ChargeStatus::Pending],
            |row| row.get(0),
        )?;

        let open_denials: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM denials WHERE status != ?1",
            [DenialStatus::Resolved],
            |row| row.get(0),
        )?;

        Ok(DatabaseStats {
            claims_by_status,
            total_charged,
            total_paid,
            total_adjusted,
            pending_charges: pending_charges as usize,
            open_denials: open_denials as usize,
        })
    }
}

/// Advance a named counter inside the caller's transaction and return the new
/// value. The increment happens in SQLite, never as read-then-write here.
pub fn next_sequence(conn: &Connection, name: &str) -> Result<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO sequences (name, value) VALUES (?1, 0)",
        [name],
    )?;
    let value = conn.query_row(
        "UPDATE sequences SET value = value + 1 WHERE name = ?1 RETURNING value",
        [name],
        |row| row.get(0),
    )?;
    Ok(value)
}

pub fn current_sequence(conn: &Connection, name: &str) -> Result<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT value FROM sequences WHERE name = ?1",
            [name],
            |row| row.get(0),
        )
        .optional()?)
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

pub(crate) fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// True when `err` is a UNIQUE/PRIMARY KEY violation.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}

macro_rules! text_enum_sql {
    ($($ty:ty),*) => {
        $(
            impl ToSql for $ty {
                fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                    Ok(ToSqlOutput::from(self.as_str()))
                }
            }

            impl FromSql for $ty {
                fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    value
                        .as_str()?
                        .parse()
                        .map_err(|e: String| FromSqlError::Other(e.into()))
                }
            }
        )*
    };
}

text_enum_sql!(ChargeStatus, ClaimStatus, DenialStatus, SubscriberRelationship);

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStats {
    pub claims_by_status: Vec<(ClaimStatus, usize)>,
    pub total_charged: i64,
    pub total_paid: i64,
    pub total_adjusted: i64,
    pub pending_charges: usize,
    pub open_denials: usize,
}
