use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    Pending,
    Submitted,
}

impl ChargeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargeStatus::Pending => "pending",
            ChargeStatus::Submitted => "submitted",
        }
    }
}

impl std::str::FromStr for ChargeStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ChargeStatus::Pending),
            "submitted" => Ok(ChargeStatus::Submitted),
            other => Err(format!("unknown charge status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Charge {
    pub id: i64,
    pub encounter_id: i64,
    pub patient_id: i64,
    pub provider_id: i64,
    pub code: String,
    pub description: String,
    pub modifiers: Vec<String>,
    pub units: u32,
    /// unit fee x units, in cents
    pub amount: i64,
    pub diagnosis_pointers: Vec<u32>,
    pub service_date: NaiveDate,
    pub status: ChargeStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Draft,
    Submitted,
    Paid,
    PartiallyPaid,
    Denied,
    Appealing,
    Resolved,
}

impl ClaimStatus {
    pub const ALL: [ClaimStatus; 7] = [
        ClaimStatus::Draft,
        ClaimStatus::Submitted,
        ClaimStatus::Paid,
        ClaimStatus::PartiallyPaid,
        ClaimStatus::Denied,
        ClaimStatus::Appealing,
        ClaimStatus::Resolved,
    ];

    /// Forward edges of the claim lifecycle. `Denied -> Submitted` is the
    /// resubmission edge; nothing else moves backwards. `Denied -> Denied`
    /// admits a repeat denial notice for the same claim and `Paid -> Paid`
    /// admits a later payer's remittance on a claim already paid in full.
    pub fn can_transition_to(self, next: ClaimStatus) -> bool {
        use ClaimStatus::*;
        matches!(
            (self, next),
            (Draft, Submitted)
                | (Submitted, Paid)
                | (Submitted, PartiallyPaid)
                | (Submitted, Denied)
                | (PartiallyPaid, Paid)
                | (PartiallyPaid, PartiallyPaid)
                | (PartiallyPaid, Denied)
                | (Paid, Paid)
                | (Denied, Denied)
                | (Denied, Appealing)
                | (Denied, Submitted)
                | (Denied, Resolved)
                | (Appealing, Paid)
                | (Appealing, PartiallyPaid)
                | (Appealing, Denied)
                | (Appealing, Resolved)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Draft => "draft",
            ClaimStatus::Submitted => "submitted",
            ClaimStatus::Paid => "paid",
            ClaimStatus::PartiallyPaid => "partially_paid",
            ClaimStatus::Denied => "denied",
            ClaimStatus::Appealing => "appealing",
            ClaimStatus::Resolved => "resolved",
        }
    }
}

impl std::fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ClaimStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ClaimStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown claim status: {}", s))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claim {
    pub id: i64,
    pub encounter_id: i64,
    pub patient_id: i64,
    pub insurance_id: i64,
    pub claim_number: String,
    pub total_charge_amount: i64,
    pub total_paid_amount: i64,
    pub patient_responsibility: i64,
    pub status: ClaimStatus,
    pub submission_date: Option<DateTime<Utc>>,
    pub adjudication_date: Option<NaiveDate>,
    pub clearinghouse_claim_id: Option<String>,
    pub edi_content: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClaimCharge {
    pub claim_id: i64,
    pub charge_id: i64,
    pub line_number: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: i64,
    pub claim_id: i64,
    pub patient_id: i64,
    pub amount: i64,
    pub payment_date: NaiveDate,
    pub source: String,
    pub trace_number: Option<String>,
    pub raw_remittance: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Adjustment {
    pub id: i64,
    pub claim_id: i64,
    pub charge_id: Option<i64>,
    pub group_code: String,
    pub reason_code: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DenialStatus {
    Pending,
    Appealing,
    Resolved,
}

impl DenialStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialStatus::Pending => "pending",
            DenialStatus::Appealing => "appealing",
            DenialStatus::Resolved => "resolved",
        }
    }
}

impl std::fmt::Display for DenialStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DenialStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DenialStatus::Pending),
            "appealing" => Ok(DenialStatus::Appealing),
            "resolved" => Ok(DenialStatus::Resolved),
            other => Err(format!("unknown denial status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Denial {
    pub id: i64,
    pub claim_id: i64,
    pub code: String,
    pub reason_description: String,
    pub denied_amount: i64,
    pub status: DenialStatus,
    pub appeal_deadline: Option<NaiveDate>,
    pub appealed_by: Option<String>,
    pub resolution: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DenialAppeal {
    pub id: i64,
    pub denial_id: i64,
    pub claim_id: i64,
    pub reason: String,
    pub supporting_documents: Vec<String>,
    pub appellant: String,
    pub deadline: NaiveDate,
    pub created_at: DateTime<Utc>,
}

// Reference rows owned by the surrounding EMR. The billing core only reads them.

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Address {
    pub line1: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Clinic {
    pub id: i64,
    pub name: String,
    pub npi: String,
    pub tax_id: String,
    pub address: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Provider {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub npi: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    /// `M`, `F` or `U`
    pub gender: String,
    pub address: Address,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubscriberRelationship {
    #[serde(rename = "self")]
    SelfInsured,
    Spouse,
    Child,
    Other,
}

impl SubscriberRelationship {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriberRelationship::SelfInsured => "self",
            SubscriberRelationship::Spouse => "spouse",
            SubscriberRelationship::Child => "child",
            SubscriberRelationship::Other => "other",
        }
    }

    /// X12 individual relationship code (SBR02 / PAT01)
    pub fn x12_code(&self) -> &'static str {
        match self {
            SubscriberRelationship::SelfInsured => "18",
            SubscriberRelationship::Spouse => "01",
            SubscriberRelationship::Child => "19",
            SubscriberRelationship::Other => "G8",
        }
    }
}

impl std::str::FromStr for SubscriberRelationship {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "self" => Ok(SubscriberRelationship::SelfInsured),
            "spouse" => Ok(SubscriberRelationship::Spouse),
            "child" => Ok(SubscriberRelationship::Child),
            "other" => Ok(SubscriberRelationship::Other),
            other => Err(format!("unknown subscriber relationship: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InsurancePolicy {
    pub id: i64,
    pub patient_id: i64,
    pub payer_name: String,
    pub payer_id: String,
    pub member_id: String,
    pub group_number: Option<String>,
    pub relationship: SubscriberRelationship,
    /// Subscriber demographics; only meaningful when the patient is not the subscriber
    pub subscriber_first_name: Option<String>,
    pub subscriber_last_name: Option<String>,
    pub subscriber_dob: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Encounter {
    pub id: i64,
    pub patient_id: i64,
    pub provider_id: i64,
    pub clinic_id: i64,
    pub encounter_type: String,
    pub service_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Diagnosis {
    pub encounter_id: i64,
    pub rank: u32,
    pub code: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BillingCode {
    pub code: String,
    pub description: String,
    pub fee: i64,
}
