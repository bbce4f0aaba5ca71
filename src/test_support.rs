//! Reference-table fixtures shared by the in-module tests.

use chrono::{NaiveDate, Utc};

use crate::{
    audit::{Actor, TracingAuditLog},
    billing::{ChargeLedger, ClaimAssembler, NewCharge},
    clearinghouse::fake::FakeGateway,
    coding::seed_fee_schedule,
    config::EdiConfig,
    storage::{
        claims,
        models::{
            Address, BillingCode, Claim, Clinic, Diagnosis, Encounter, InsurancePolicy, Patient,
            Provider, SubscriberRelationship,
        },
        reference, Database,
    },
};

pub struct Fixture {
    pub db: Database,
    pub clinic_id: i64,
    pub provider_id: i64,
    pub patient_id: i64,
    pub insurance_id: i64,
    pub encounter_id: i64,
}

pub fn service_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
}

/// In-memory database with one clinic, provider, self-insured patient,
/// established-patient encounter, and `diagnoses` ranked diagnoses.
pub fn fixture(diagnoses: u32) -> Fixture {
    let db = Database::open_in_memory().unwrap();
    let conn = db.conn();

    let clinic_id = reference::insert_clinic(
        conn,
        &Clinic {
            id: 0,
            name: "MAIN STREET CLINIC".to_string(),
            npi: "1234567893".to_string(),
            tax_id: "123456789".to_string(),
            address: Address {
                line1: "1 MAIN ST".to_string(),
                city: "SPRINGFIELD".to_string(),
                state: "IL".to_string(),
                zip: "62701".to_string(),
            },
        },
    )
    .unwrap();

    let provider_id = reference::insert_provider(
        conn,
        &Provider {
            id: 0,
            first_name: "ALEX".to_string(),
            last_name: "SMITH".to_string(),
            npi: "1987654320".to_string(),
        },
    )
    .unwrap();

    let patient_id = reference::insert_patient(
        conn,
        &Patient {
            id: 0,
            first_name: "JANE".to_string(),
            last_name: "DOE".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1980, 7, 4),
            gender: "F".to_string(),
            address: Address::default(),
        },
    )
    .unwrap();

    let insurance_id = reference::insert_insurance(
        conn,
        &InsurancePolicy {
            id: 0,
            patient_id,
            payer_name: "ACME HEALTH".to_string(),
            payer_id: "ACME01".to_string(),
            member_id: "MEM123".to_string(),
            group_number: Some("GRP9".to_string()),
            relationship: SubscriberRelationship::SelfInsured,
            subscriber_first_name: None,
            subscriber_last_name: None,
            subscriber_dob: None,
        },
    )
    .unwrap();

    let encounter_id = add_encounter(&db, patient_id, provider_id, clinic_id, diagnoses);

    seed_fee_schedule(conn).unwrap();
    reference::upsert_billing_code(
        conn,
        &BillingCode {
            code: "36415".to_string(),
            description: "Routine venipuncture".to_string(),
            fee: 2000,
        },
    )
    .unwrap();

    Fixture {
        db,
        clinic_id,
        provider_id,
        patient_id,
        insurance_id,
        encounter_id,
    }
}

pub fn add_encounter(
    db: &Database,
    patient_id: i64,
    provider_id: i64,
    clinic_id: i64,
    diagnoses: u32,
) -> i64 {
    let encounter_id = reference::insert_encounter(
        db.conn(),
        &Encounter {
            id: 0,
            patient_id,
            provider_id,
            clinic_id,
            encounter_type: "Established Patient".to_string(),
            service_date: service_date(),
        },
    )
    .unwrap();

    let codes = ["E11.9", "I10", "J45.909", "M54.5", "R51.9"];
    for rank in 1..=diagnoses {
        reference::insert_diagnosis(
            db.conn(),
            &Diagnosis {
                encounter_id,
                rank,
                code: codes[(rank as usize - 1) % codes.len()].to_string(),
                description: String::new(),
            },
        )
        .unwrap();
    }

    encounter_id
}

impl Fixture {
    pub fn another_encounter(&self, diagnoses: u32) -> i64 {
        add_encounter(
            &self.db,
            self.patient_id,
            self.provider_id,
            self.clinic_id,
            diagnoses,
        )
    }
}

/// A claim for a fresh encounter carrying one charge per code, already moved
/// to submitted without going through the gateway.
pub fn submitted_claim(fx: &Fixture, codes: &[&str]) -> Claim {
    let encounter_id = fx.another_encounter(1);
    let ledger = ChargeLedger::new(&fx.db);
    for code in codes {
        ledger
            .add_charge(NewCharge::new(encounter_id, *code, vec![1]))
            .unwrap();
    }

    let assembler = ClaimAssembler::new(
        &fx.db,
        FakeGateway::default(),
        TracingAuditLog,
        EdiConfig::default(),
    );
    let claim = assembler
        .create_claim(encounter_id, fx.insurance_id, &Actor::new("biller-1"))
        .unwrap();
    claims::mark_submitted(fx.db.conn(), claim.id, "ISA~", Utc::now()).unwrap();
    assembler.get_claim(claim.id).unwrap()
}
