use serde::{Deserialize, Serialize};

use crate::{coding::mdm::MdmLevel, storage::models::BillingCode};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EncounterType {
    NewPatient,
    Established,
    FollowUp,
}

impl EncounterType {
    /// Recognizes the usual spellings; anything else is `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let normalized: String = text
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c == '_' || c == '-' { ' ' } else { c })
            .collect();

        match normalized.as_str() {
            "new" | "new patient" | "new visit" => Some(EncounterType::NewPatient),
            "established" | "established patient" | "office visit" => {
                Some(EncounterType::Established)
            }
            "follow up" | "followup" | "follow up visit" => Some(EncounterType::FollowUp),
            _ => None,
        }
    }

    fn is_new(self) -> bool {
        self == EncounterType::NewPatient
    }
}

/// One row of the E&M fee table. Fee in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CodeSelection {
    pub code: &'static str,
    pub description: &'static str,
    pub fee: i64,
}

impl From<CodeSelection> for BillingCode {
    fn from(selection: CodeSelection) -> Self {
        BillingCode {
            code: selection.code.to_string(),
            description: selection.description.to_string(),
            fee: selection.fee,
        }
    }
}

const ESTABLISHED: [CodeSelection; 4] = [
    CodeSelection {
        code: "99212",
        description: "Office visit, established patient, straightforward MDM",
        fee: 7500,
    },
    CodeSelection {
        code: "99213",
        description: "Office visit, established patient, low MDM",
        fee: 11000,
    },
    CodeSelection {
        code: "99214",
        description: "Office visit, established patient, moderate MDM",
        fee: 16500,
    },
    CodeSelection {
        code: "99215",
        description: "Office visit, established patient, high MDM",
        fee: 22500,
    },
];

const NEW_PATIENT: [CodeSelection; 4] = [
    CodeSelection {
        code: "99202",
        description: "Office visit, new patient, straightforward MDM",
        fee: 10000,
    },
    CodeSelection {
        code: "99203",
        description: "Office visit, new patient, low MDM",
        fee: 15000,
    },
    CodeSelection {
        code: "99204",
        description: "Office visit, new patient, moderate MDM",
        fee: 22500,
    },
    CodeSelection {
        code: "99205",
        description: "Office visit, new patient, high MDM",
        fee: 30000,
    },
];

fn level_index(level: MdmLevel) -> usize {
    match level {
        MdmLevel::Straightforward => 0,
        MdmLevel::Low => 1,
        MdmLevel::Moderate => 2,
        MdmLevel::High => 3,
    }
}

/// Pick the E&M code for a level. Unrecognized encounter types bill from the
/// established-patient table.
pub fn determine_code(level: MdmLevel, encounter_type: &str) -> CodeSelection {
    let table = match EncounterType::parse(encounter_type) {
        Some(kind) if kind.is_new() => &NEW_PATIENT,
        _ => &ESTABLISHED,
    };
    table[level_index(level)]
}

/// Like [`determine_code`] with the level given as text. A level that does
/// not parse bills as established-patient Low.
pub fn determine_code_for(level: &str, encounter_type: &str) -> CodeSelection {
    match level.parse::<MdmLevel>() {
        Ok(level) => determine_code(level, encounter_type),
        Err(_) => ESTABLISHED[level_index(MdmLevel::Low)],
    }
}

/// Every code the engine can emit, for seeding the fee table.
pub fn evaluation_codes() -> impl Iterator<Item = CodeSelection> {
    ESTABLISHED.into_iter().chain(NEW_PATIENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_office_visit_moderate_is_99214() {
        let selection = determine_code(MdmLevel::Moderate, "Office Visit");
        assert_eq!(selection.code, "99214");
        assert_eq!(selection.fee, 16500);
    }

    #[test]
    fn test_established_straightforward_is_99212() {
        let selection = determine_code(MdmLevel::Straightforward, "Established Patient");
        assert_eq!(selection.code, "99212");
        assert_eq!(selection.fee, 7500);
    }

    #[test]
    fn test_new_patient_table() {
        assert_eq!(determine_code(MdmLevel::High, "New Patient").code, "99205");
        assert_eq!(determine_code(MdmLevel::Low, "new_patient").code, "99203");
    }

    #[test]
    fn test_follow_up_and_unknown_use_established() {
        assert_eq!(determine_code(MdmLevel::Low, "Follow-up").code, "99213");
        assert_eq!(determine_code(MdmLevel::High, "Telehealth").code, "99215");
    }

    #[test]
    fn test_unparseable_level_defaults_to_established_low() {
        let selection = determine_code_for("Extreme", "New Patient");
        assert_eq!(selection.code, "99213");
        assert_eq!(selection.fee, 11000);
        assert_eq!(determine_code_for("moderate", "New Patient").code, "99204");
    }

    #[test]
    fn test_fee_increases_with_level() {
        for table in [ESTABLISHED, NEW_PATIENT] {
            assert!(table.windows(2).all(|w| w[0].fee < w[1].fee));
        }
        assert_eq!(evaluation_codes().count(), 8);
    }
}
