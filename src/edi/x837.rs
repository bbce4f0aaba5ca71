//! Encoder for outbound 837 professional claims (005010X222A1).
//!
//! Encoding is a pure function of the claim graph, the envelope settings,
//! the control numbers, and the timestamp. Identical inputs give identical
//! bytes.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    config::EdiConfig,
    edi::{format_date, segment, COMPONENT_SEPARATOR},
    money::format_decimal,
    storage::models::{
        Charge, Claim, Clinic, Diagnosis, Encounter, InsurancePolicy, Patient, Provider,
        SubscriberRelationship,
    },
};

pub const IMPLEMENTATION_GUIDE: &str = "005010X222A1";

/// Office place of service
const PLACE_OF_SERVICE: &str = "11";
/// At most this many diagnosis pointers fit on one SV1.
pub const MAX_LINE_POINTERS: usize = 4;
/// HI carries at most this many diagnosis codes.
pub const MAX_CLAIM_DIAGNOSES: usize = 12;

/// Everything the encoder needs about one claim, already loaded.
#[derive(Debug, Clone)]
pub struct ClaimGraph {
    pub claim: Claim,
    pub encounter: Encounter,
    pub patient: Patient,
    pub insurance: InsurancePolicy,
    pub clinic: Clinic,
    pub provider: Provider,
    /// Ordered by rank
    pub diagnoses: Vec<Diagnosis>,
    /// Ordered by line number
    pub lines: Vec<ClaimLine>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClaimLine {
    pub line_number: u32,
    pub charge: Charge,
}

impl ClaimGraph {
    pub fn patient_is_subscriber(&self) -> bool {
        self.insurance.relationship == SubscriberRelationship::SelfInsured
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlNumbers {
    pub interchange: i64,
    pub group: i64,
    pub transaction: i64,
}

impl ControlNumbers {
    /// One claim per interchange: every level shares the interchange number.
    pub fn single(interchange: i64) -> Self {
        Self {
            interchange,
            group: interchange,
            transaction: interchange,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdiDocument {
    pub segments: Vec<String>,
}

impl EdiDocument {
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Segments whose identifier is `id`.
    pub fn find<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a String> + 'a {
        self.segments
            .iter()
            .filter(move |s| s.split(['*', '~']).next() == Some(id))
    }

    /// One segment per line.
    pub fn render(&self) -> String {
        self.segments.join("\n")
    }
}

impl std::fmt::Display for EdiDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

pub fn encode_claim(
    graph: &ClaimGraph,
    envelope: &EdiConfig,
    control: ControlNumbers,
    now: DateTime<Utc>,
) -> EdiDocument {
    let mut out = Vec::new();

    let isa_date = now.format("%y%m%d").to_string();
    let isa_time = now.format("%H%M").to_string();
    let date = now.format("%Y%m%d").to_string();
    let time = now.format("%H%M%S").to_string();
    let interchange = format!("{:09}", control.interchange);
    let group = control.group.to_string();
    let transaction = format!("{:04}", control.transaction);

    // Envelope
    out.push(segment(&[
        "ISA",
        "00",
        &" ".repeat(10),
        "00",
        &" ".repeat(10),
        "ZZ",
        &pad15(&envelope.submitter_id),
        "ZZ",
        &pad15(&envelope.receiver_id),
        &isa_date,
        &isa_time,
        "^",
        "00501",
        &interchange,
        "0",
        &envelope.usage_indicator,
        ":",
    ]));
    out.push(segment(&[
        "GS",
        "HC",
        &envelope.submitter_id,
        &envelope.receiver_id,
        &date,
        &time,
        &group,
        "X",
        IMPLEMENTATION_GUIDE,
    ]));

    let st_index = out.len();
    out.push(segment(&["ST", "837", &transaction, IMPLEMENTATION_GUIDE]));
    out.push(segment(&[
        "BHT",
        "0019",
        "00",
        &graph.claim.claim_number,
        &date,
        &time,
        "CH",
    ]));

    // Submitter / receiver
    out.push(segment(&[
        "NM1",
        "41",
        "2",
        &envelope.submitter_name,
        "",
        "",
        "",
        "",
        "46",
        &envelope.submitter_id,
    ]));
    out.push(segment(&[
        "PER",
        "IC",
        &envelope.contact_name,
        "TE",
        &envelope.contact_phone,
    ]));
    out.push(segment(&[
        "NM1",
        "40",
        "2",
        &envelope.receiver_name,
        "",
        "",
        "",
        "",
        "46",
        &envelope.receiver_id,
    ]));

    // Billing provider
    let clinic = &graph.clinic;
    out.push(segment(&["HL", "1", "", "20", "1"]));
    out.push(segment(&[
        "NM1", "85", "2", &clinic.name, "", "", "", "", "XX", &clinic.npi,
    ]));
    out.push(segment(&["N3", &clinic.address.line1]));
    out.push(segment(&[
        "N4",
        &clinic.address.city,
        &clinic.address.state,
        &clinic.address.zip,
    ]));
    out.push(segment(&["REF", "EI", &clinic.tax_id]));

    // Subscriber
    let insurance = &graph.insurance;
    let patient = &graph.patient;
    let has_patient_loop = !graph.patient_is_subscriber();
    let relationship = if has_patient_loop {
        ""
    } else {
        SubscriberRelationship::SelfInsured.x12_code()
    };

    out.push(segment(&[
        "HL",
        "2",
        "1",
        "22",
        if has_patient_loop { "1" } else { "0" },
    ]));
    out.push(segment(&[
        "SBR",
        "P",
        relationship,
        insurance.group_number.as_deref().unwrap_or(""),
        "",
        "",
        "",
        "",
        "",
        "CI",
    ]));

    let (sub_last, sub_first, sub_dob, sub_gender) = if has_patient_loop {
        (
            insurance.subscriber_last_name.as_deref().unwrap_or(""),
            insurance.subscriber_first_name.as_deref().unwrap_or(""),
            insurance.subscriber_dob,
            "U",
        )
    } else {
        (
            patient.last_name.as_str(),
            patient.first_name.as_str(),
            patient.date_of_birth,
            patient.gender.as_str(),
        )
    };

    out.push(segment(&[
        "NM1",
        "IL",
        "1",
        sub_last,
        sub_first,
        "",
        "",
        "",
        "MI",
        &insurance.member_id,
    ]));
    out.push(segment(&[
        "DMG",
        "D8",
        &sub_dob.map(format_date).unwrap_or_default(),
        sub_gender,
    ]));
    out.push(segment(&[
        "NM1",
        "PR",
        "2",
        &insurance.payer_name,
        "",
        "",
        "",
        "",
        "PI",
        &insurance.payer_id,
    ]));

    // Patient, only when not the subscriber
    if has_patient_loop {
        out.push(segment(&["HL", "3", "2", "23", "0"]));
        out.push(segment(&["PAT", insurance.relationship.x12_code()]));
        out.push(segment(&[
            "NM1",
            "QC",
            "1",
            &patient.last_name,
            &patient.first_name,
        ]));
        out.push(segment(&[
            "DMG",
            "D8",
            &patient.date_of_birth.map(format_date).unwrap_or_default(),
            &patient.gender,
        ]));
    }

    // Claim
    let place = [PLACE_OF_SERVICE, "B", "1"].join(":");
    out.push(segment(&[
        "CLM",
        &graph.claim.claim_number,
        &format_decimal(graph.claim.total_charge_amount),
        "",
        "",
        &place,
        "Y",
        "A",
        "Y",
        "Y",
    ]));
    out.push(segment(&[
        "DTP",
        "472",
        "D8",
        &format_date(graph.encounter.service_date),
    ]));

    let diagnosis_codes: Vec<String> = graph
        .diagnoses
        .iter()
        .map(|d| d.code.replace('.', ""))
        .collect();
    let hi = std::iter::once("ABK".to_string())
        .chain(diagnosis_codes)
        .collect::<Vec<_>>()
        .join(&COMPONENT_SEPARATOR.to_string());
    out.push(segment(&["HI", &hi]));

    let provider = &graph.provider;
    out.push(segment(&[
        "NM1",
        "82",
        "1",
        &provider.last_name,
        &provider.first_name,
        "",
        "",
        "",
        "XX",
        &provider.npi,
    ]));

    // Service lines
    for line in &graph.lines {
        let charge = &line.charge;

        let procedure = std::iter::once("HC")
            .chain(std::iter::once(charge.code.as_str()))
            .chain(charge.modifiers.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(":");
        let pointers = charge
            .diagnosis_pointers
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(":");

        out.push(segment(&["LX", &line.line_number.to_string()]));
        out.push(segment(&[
            "SV1",
            &procedure,
            &format_decimal(charge.amount),
            "UN",
            &charge.units.to_string(),
            "",
            "",
            &pointers,
        ]));
        out.push(segment(&[
            "DTP",
            "472",
            "D8",
            &format_date(charge.service_date),
        ]));
    }

    // ST..SE inclusive
    let transaction_segments = out.len() - st_index + 1;
    out.push(segment(&["SE", &transaction_segments.to_string(), &transaction]));
    out.push(segment(&["GE", "1", &group]));
    out.push(segment(&["IEA", "1", &interchange]));

    EdiDocument { segments: out }
}

fn pad15(id: &str) -> String {
    format!("{:<15.15}", id)
}
