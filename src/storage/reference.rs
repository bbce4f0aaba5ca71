// Reads (and fixture writes) for rows the surrounding EMR owns.
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::{
    error::Result,
    storage::models::{
        Address, BillingCode, Clinic, Diagnosis, Encounter, InsurancePolicy, Patient, Provider,
    },
};

pub fn insert_clinic(conn: &Connection, clinic: &Clinic) -> Result<i64> {
    conn.execute(
        "INSERT INTO clinics (name, npi, tax_id, address_line1, city, state, zip)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            clinic.name,
            clinic.npi,
            clinic.tax_id,
            clinic.address.line1,
            clinic.address.city,
            clinic.address.state,
            clinic.address.zip,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_clinic(conn: &Connection, id: i64) -> Result<Option<Clinic>> {
    Ok(conn
        .query_row(
            "SELECT id, name, npi, tax_id, address_line1, city, state, zip
             FROM clinics WHERE id = ?1",
            [id],
            |row| {
                Ok(Clinic {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    npi: row.get(2)?,
                    tax_id: row.get(3)?,
                    address: address_from_row(row, 4)?,
                })
            },
        )
        .optional()?)
}

pub fn insert_provider(conn: &Connection, provider: &Provider) -> Result<i64> {
    conn.execute(
        "INSERT INTO providers (first_name, last_name, npi) VALUES (?1, ?2, ?3)",
        params![provider.first_name, provider.last_name, provider.npi],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_provider(conn: &Connection, id: i64) -> Result<Option<Provider>> {
    Ok(conn
        .query_row(
            "SELECT id, first_name, last_name, npi FROM providers WHERE id = ?1",
            [id],
            |row| {
                Ok(Provider {
                    id: row.get(0)?,
                    first_name: row.get(1)?,
                    last_name: row.get(2)?,
                    npi: row.get(3)?,
                })
            },
        )
        .optional()?)
}

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<i64> {
    conn.execute(
        "INSERT INTO patients
         (first_name, last_name, date_of_birth, gender, address_line1, city, state, zip)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            patient.first_name,
            patient.last_name,
            patient.date_of_birth,
            patient.gender,
            patient.address.line1,
            patient.address.city,
            patient.address.state,
            patient.address.zip,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_patient(conn: &Connection, id: i64) -> Result<Option<Patient>> {
    Ok(conn
        .query_row(
            "SELECT id, first_name, last_name, date_of_birth, gender,
                    address_line1, city, state, zip
             FROM patients WHERE id = ?1",
            [id],
            |row| {
                Ok(Patient {
                    id: row.get(0)?,
                    first_name: row.get(1)?,
                    last_name: row.get(2)?,
                    date_of_birth: row.get(3)?,
                    gender: row.get(4)?,
                    address: address_from_row(row, 5)?,
                })
            },
        )
        .optional()?)
}

pub fn insert_insurance(conn: &Connection, policy: &InsurancePolicy) -> Result<i64> {
    conn.execute(
        "INSERT INTO insurance_policies
         (patient_id, payer_name, payer_id, member_id, group_number, relationship,
          subscriber_first_name, subscriber_last_name, subscriber_dob)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            policy.patient_id,
            policy.payer_name,
            policy.payer_id,
            policy.member_id,
            policy.group_number,
            policy.relationship,
            policy.subscriber_first_name,
            policy.subscriber_last_name,
            policy.subscriber_dob,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_insurance(conn: &Connection, id: i64) -> Result<Option<InsurancePolicy>> {
    Ok(conn
        .query_row(
            "SELECT id, patient_id, payer_name, payer_id, member_id, group_number, relationship,
                    subscriber_first_name, subscriber_last_name, subscriber_dob
             FROM insurance_policies WHERE id = ?1",
            [id],
            |row| {
                Ok(InsurancePolicy {
                    id: row.get(0)?,
                    patient_id: row.get(1)?,
                    payer_name: row.get(2)?,
                    payer_id: row.get(3)?,
                    member_id: row.get(4)?,
                    group_number: row.get(5)?,
                    relationship: row.get(6)?,
                    subscriber_first_name: row.get(7)?,
                    subscriber_last_name: row.get(8)?,
                    subscriber_dob: row.get(9)?,
                })
            },
        )
        .optional()?)
}

pub fn insert_encounter(conn: &Connection, encounter: &Encounter) -> Result<i64> {
    conn.execute(
        "INSERT INTO encounters (patient_id, provider_id, clinic_id, encounter_type, service_date)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            encounter.patient_id,
            encounter.provider_id,
            encounter.clinic_id,
            encounter.encounter_type,
            encounter.service_date,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_encounter(conn: &Connection, id: i64) -> Result<Option<Encounter>> {
    Ok(conn
        .query_row(
            "SELECT id, patient_id, provider_id, clinic_id, encounter_type, service_date
             FROM encounters WHERE id = ?1",
            [id],
            |row| {
                Ok(Encounter {
                    id: row.get(0)?,
                    patient_id: row.get(1)?,
                    provider_id: row.get(2)?,
                    clinic_id: row.get(3)?,
                    encounter_type: row.get(4)?,
                    service_date: row.get(5)?,
                })
            },
        )
        .optional()?)
}

pub fn insert_diagnosis(conn: &Connection, diagnosis: &Diagnosis) -> Result<()> {
    conn.execute(
        "INSERT INTO encounter_diagnoses (encounter_id, rank, code, description)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            diagnosis.encounter_id,
            diagnosis.rank,
            diagnosis.code,
            diagnosis.description,
        ],
    )?;
    Ok(())
}

/// Diagnoses for an encounter, ordered by rank
pub fn get_diagnoses(conn: &Connection, encounter_id: i64) -> Result<Vec<Diagnosis>> {
    let mut stmt = conn.prepare(
        "SELECT encounter_id, rank, code, description
         FROM encounter_diagnoses
         WHERE encounter_id = ?1
         ORDER BY rank",
    )?;

    let diagnoses = stmt
        .query_map([encounter_id], |row| {
            Ok(Diagnosis {
                encounter_id: row.get(0)?,
                rank: row.get(1)?,
                code: row.get(2)?,
                description: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(diagnoses)
}

pub fn count_diagnoses(conn: &Connection, encounter_id: i64) -> Result<u32> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM encounter_diagnoses WHERE encounter_id = ?1",
        [encounter_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Insert or update a fee-table entry.
pub fn upsert_billing_code(conn: &Connection, code: &BillingCode) -> Result<()> {
    conn.execute(
        "INSERT INTO billing_codes (code, description, fee) VALUES (?1, ?2, ?3)
         ON CONFLICT(code) DO UPDATE SET description = excluded.description, fee = excluded.fee",
        params![code.code, code.description, code.fee],
    )?;
    Ok(())
}

pub fn find_billing_code(conn: &Connection, code: &str) -> Result<Option<BillingCode>> {
    Ok(conn
        .query_row(
            "SELECT code, description, fee FROM billing_codes WHERE code = ?1",
            [code],
            |row| {
                Ok(BillingCode {
                    code: row.get(0)?,
                    description: row.get(1)?,
                    fee: row.get(2)?,
                })
            },
        )
        .optional()?)
}

fn address_from_row(row: &Row<'_>, start: usize) -> rusqlite::Result<Address> {
    Ok(Address {
        line1: row.get(start)?,
        city: row.get(start + 1)?,
        state: row.get(start + 2)?,
        zip: row.get(start + 3)?,
    })
}
