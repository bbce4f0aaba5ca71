// Claim adjustment reason codes (CARC) the billing office sees most.
const REASONS: &[(&str, &str)] = &[
    ("1", "Deductible amount"),
    ("2", "Coinsurance amount"),
    ("3", "Co-payment amount"),
    ("16", "Claim lacks information needed for adjudication"),
    ("18", "Exact duplicate claim or service"),
    ("22", "Care may be covered by another payer"),
    ("27", "Expenses incurred after coverage terminated"),
    ("29", "Time limit for filing has expired"),
    ("45", "Charge exceeds fee schedule or maximum allowable amount"),
    ("50", "Not deemed a medical necessity by the payer"),
    ("96", "Non-covered charge"),
    ("97", "Benefit included in payment for another service already adjudicated"),
    ("109", "Claim not covered by this payer"),
    ("197", "Precertification or authorization absent"),
    ("204", "Service not covered under the patient's current benefit plan"),
];

/// CLP02 values meaning the payer settled the claim in full.
pub const FULL_PAYMENT_STATUS_CODES: &[&str] = &["1", "2", "3", "19", "20", "21"];

/// CLP02 value for a denied claim.
pub const DENIED_STATUS_CODE: &str = "4";

/// Human description of a reason code; unknown codes read `Code {code}`.
pub fn describe(code: &str) -> String {
    REASONS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, description)| description.to_string())
        .unwrap_or_else(|| format!("Code {}", code))
}

pub fn is_full_payment(status_code: &str) -> bool {
    FULL_PAYMENT_STATUS_CODES.contains(&status_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_and_unknown_codes() {
        assert_eq!(describe("50"), "Not deemed a medical necessity by the payer");
        assert_eq!(describe("B7"), "Code B7");
        assert_eq!(describe("CLP4"), "Code CLP4");
    }

    #[test]
    fn test_full_payment_codes() {
        assert!(is_full_payment("1"));
        assert!(is_full_payment("19"));
        assert!(!is_full_payment("4"));
        assert!(!is_full_payment("22"));
    }
}
