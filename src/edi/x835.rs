//! Decoder for inbound 835 health care claim payment/advice transactions.
//!
//! The parser walks segments once, keeping the claim and the service line
//! currently being built. A `CLP` closes the previous claim, an `SVC` closes
//! the previous line, and `SE` (or the end of input) closes both.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    edi::{parse_date, split_segments, ParseError, COMPONENT_SEPARATOR},
    money,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RemittanceAdvice {
    pub payer_name: Option<String>,
    pub payee_name: Option<String>,
    pub payer_id: Option<String>,
    pub trace_number: Option<String>,
    pub production_date: Option<NaiveDate>,
    /// BPR02, in cents
    pub payment_amount: Option<i64>,
    pub payment_date: Option<NaiveDate>,
    pub claims: Vec<RemittanceClaim>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RemittanceClaim {
    pub claim_number: String,
    pub status_code: String,
    pub total_charge_amount: i64,
    pub total_paid_amount: i64,
    pub patient_responsibility: i64,
    pub payer_claim_id: Option<String>,
    pub patient_name: Option<String>,
    pub patient_id: Option<String>,
    pub service_lines: Vec<RemittanceServiceLine>,
    /// Claim-level adjustments only; line adjustments live on their line.
    pub adjustments: Vec<RemittanceAdjustment>,
}

impl RemittanceClaim {
    /// Claim-level adjustments followed by every line's, in input order.
    pub fn all_adjustments(&self) -> impl Iterator<Item = &RemittanceAdjustment> {
        self.adjustments
            .iter()
            .chain(self.service_lines.iter().flat_map(|l| l.adjustments.iter()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RemittanceServiceLine {
    pub procedure_code: String,
    pub modifiers: Vec<String>,
    pub charge_amount: i64,
    pub paid_amount: i64,
    pub units: u32,
    pub service_date: Option<NaiveDate>,
    pub adjustments: Vec<RemittanceAdjustment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemittanceAdjustment {
    pub group_code: String,
    pub reason_code: String,
    pub amount: i64,
}

#[derive(Default)]
struct Cursor {
    advice: RemittanceAdvice,
    claim: Option<RemittanceClaim>,
    line: Option<RemittanceServiceLine>,
}

impl Cursor {
    fn flush_line(&mut self) {
        if let Some(line) = self.line.take() {
            if let Some(claim) = self.claim.as_mut() {
                claim.service_lines.push(line);
            }
        }
    }

    fn flush_claim(&mut self) {
        self.flush_line();
        if let Some(claim) = self.claim.take() {
            debug!(
                "Decoded remittance claim {} ({} lines)",
                claim.claim_number,
                claim.service_lines.len()
            );
            self.advice.claims.push(claim);
        }
    }
}

/// Decode one 835 interchange.
pub fn parse_remittance(text: &str) -> Result<RemittanceAdvice, ParseError> {
    let segments = split_segments(text);
    if segments.is_empty() {
        return Err(ParseError::new("", 0, "remittance is empty"));
    }

    let mut cursor = Cursor::default();

    for (index, elements) in segments.iter().enumerate() {
        let position = index + 1;
        let seg = Segment {
            elements: elements.as_slice(),
            position,
        };

        match seg.id() {
            "BPR" => {
                cursor.advice.payment_amount = seg.amount_opt(2)?;
                cursor.advice.payment_date = seg.date_opt(16)?;
            }
            "TRN" => cursor.advice.trace_number = seg.text(2),
            "DTM" => match seg.element(1) {
                "405" => cursor.advice.production_date = seg.date_opt(2)?,
                "472" => {
                    let date = seg.date_opt(2)?;
                    if let Some(line) = cursor.line.as_mut() {
                        line.service_date = date;
                    }
                }
                _ => {}
            },
            "N1" => match seg.element(1) {
                "PR" => cursor.advice.payer_name = seg.text(2),
                "PE" => cursor.advice.payee_name = seg.text(2),
                _ => {}
            },
            "REF" => {
                if seg.element(1) == "EV" {
                    cursor.advice.payer_id = seg.text(2);
                }
            }
            "CLP" => {
                cursor.flush_claim();
                cursor.claim = Some(RemittanceClaim {
                    claim_number: seg.required(1, "claim number")?.to_string(),
                    status_code: seg.required(2, "claim status code")?.to_string(),
                    total_charge_amount: seg.amount(3, "charge amount")?,
                    total_paid_amount: seg.amount(4, "paid amount")?,
                    patient_responsibility: seg.amount_opt(5)?.unwrap_or(0),
                    payer_claim_id: seg.text(7),
                    ..Default::default()
                });
            }
            "NM1" => {
                if seg.element(1) == "QC" {
                    if let Some(claim) = cursor.claim.as_mut() {
                        let name = [seg.element(4), seg.element(3)]
                            .iter()
                            .filter(|p| !p.is_empty())
                            .copied()
                            .collect::<Vec<_>>()
                            .join(" ");
                        claim.patient_name = (!name.is_empty()).then_some(name);
                        claim.patient_id = seg.text(9);
                    }
                }
            }
            "SVC" => {
                if cursor.claim.is_none() {
                    return Err(seg.error("service line outside of a claim"));
                }
                cursor.flush_line();

                let composite = seg.required(1, "procedure")?;
                let mut parts = composite.split(COMPONENT_SEPARATOR);
                let _qualifier = parts.next();
                let procedure_code = parts
                    .next()
                    .filter(|c| !c.is_empty())
                    .ok_or_else(|| seg.error(format!("malformed procedure '{}'", composite)))?
                    .to_string();
                let modifiers = parts
                    .filter(|m| !m.is_empty())
                    .map(str::to_string)
                    .collect();

                let units = match seg.element(5) {
                    "" => 1,
                    raw => raw
                        .parse::<u32>()
                        .or_else(|_| parse_whole_units(raw))
                        .map_err(|_| seg.error(format!("invalid units '{}'", raw)))?,
                };

                cursor.line = Some(RemittanceServiceLine {
                    procedure_code,
                    modifiers,
                    charge_amount: seg.amount(2, "line charge")?,
                    paid_amount: seg.amount(3, "line payment")?,
                    units,
                    service_date: None,
                    adjustments: Vec::new(),
                });
            }
            "CAS" => {
                let group_code = seg.required(1, "adjustment group")?.to_string();
                let mut adjustments = Vec::new();
                // Reason/amount/quantity triplets start at CAS02.
                let mut idx = 2;
                while idx < elements.len() {
                    let reason = seg.element(idx);
                    if !reason.is_empty() {
                        adjustments.push(RemittanceAdjustment {
                            group_code: group_code.clone(),
                            reason_code: reason.to_string(),
                            amount: seg.amount(idx + 1, "adjustment amount")?,
                        });
                    }
                    idx += 3;
                }

                if let Some(line) = cursor.line.as_mut() {
                    line.adjustments.extend(adjustments);
                } else if let Some(claim) = cursor.claim.as_mut() {
                    claim.adjustments.extend(adjustments);
                } else {
                    return Err(seg.error("adjustment outside of a claim"));
                }
            }
            "SE" => cursor.flush_claim(),
            _ => {}
        }
    }

    cursor.flush_claim();

    if cursor.advice.claims.is_empty() {
        return Err(ParseError::new(
            "CLP",
            segments.len(),
            "no claim payment segment found",
        ));
    }

    Ok(cursor.advice)
}

// Some payers send units as "1.0".
fn parse_whole_units(raw: &str) -> Result<u32, ()> {
    match money::parse_decimal(raw) {
        Some(cents) if cents >= 0 && cents % money::CENTS_PER_DOLLAR == 0 => {
            u32::try_from(cents / money::CENTS_PER_DOLLAR).map_err(|_| ())
        }
        _ => Err(()),
    }
}

struct Segment<'a> {
    elements: &'a [&'a str],
    position: usize,
}

impl<'a> Segment<'a> {
    fn id(&self) -> &'a str {
        self.element(0)
    }

    fn element(&self, idx: usize) -> &'a str {
        self.elements.get(idx).map(|e| e.trim()).unwrap_or("")
    }

    fn text(&self, idx: usize) -> Option<String> {
        let value = self.element(idx);
        (!value.is_empty()).then(|| value.to_string())
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.id(), self.position, message)
    }

    fn required(&self, idx: usize, what: &str) -> Result<&'a str, ParseError> {
        match self.element(idx) {
            "" => Err(self.error(format!("missing {}", what))),
            value => Ok(value),
        }
    }

    fn amount(&self, idx: usize, what: &str) -> Result<i64, ParseError> {
        let raw = self.required(idx, what)?;
        money::parse_decimal(raw).ok_or_else(|| self.error(format!("invalid {} '{}'", what, raw)))
    }

    fn amount_opt(&self, idx: usize) -> Result<Option<i64>, ParseError> {
        match self.element(idx) {
            "" => Ok(None),
            raw => money::parse_decimal(raw)
                .map(Some)
                .ok_or_else(|| self.error(format!("invalid amount '{}'", raw))),
        }
    }

    fn date_opt(&self, idx: usize) -> Result<Option<NaiveDate>, ParseError> {
        match self.element(idx) {
            "" => Ok(None),
            raw => parse_date(raw)
                .map(Some)
                .ok_or_else(|| self.error(format!("invalid date '{}'", raw))),
        }
    }
}
