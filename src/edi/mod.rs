pub mod x835;
pub mod x837;

use chrono::NaiveDate;
use thiserror::Error;

pub use x835::{
    parse_remittance, RemittanceAdjustment, RemittanceAdvice, RemittanceClaim,
    RemittanceServiceLine,
};
pub use x837::{encode_claim, ClaimGraph, ClaimLine, ControlNumbers, EdiDocument};

pub const SEGMENT_TERMINATOR: char = '~';
pub const ELEMENT_SEPARATOR: char = '*';
pub const COMPONENT_SEPARATOR: char = ':';

/// A remittance that could not be decoded. `position` is the 1-based index of
/// the offending segment (0 when the input has no segments at all).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("segment {segment} at position {position}: {message}")]
pub struct ParseError {
    pub segment: String,
    pub position: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(segment: impl Into<String>, position: usize, message: impl Into<String>) -> Self {
        Self {
            segment: segment.into(),
            position,
            message: message.into(),
        }
    }
}

/// Split raw interchange text into segments of elements. Whitespace and line
/// breaks around segments are dropped, as are empty segments.
pub fn split_segments(text: &str) -> Vec<Vec<&str>> {
    text.split(SEGMENT_TERMINATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.split(ELEMENT_SEPARATOR).collect())
        .collect()
}

/// Build one terminated segment. Trailing empty elements are dropped.
pub(crate) fn segment<S: AsRef<str>>(elements: &[S]) -> String {
    let mut end = elements.len();
    while end > 1 && elements[end - 1].as_ref().is_empty() {
        end -= 1;
    }

    let mut out = String::new();
    for (i, element) in elements[..end].iter().enumerate() {
        if i > 0 {
            out.push(ELEMENT_SEPARATOR);
        }
        out.push_str(element.as_ref());
    }
    out.push(SEGMENT_TERMINATOR);
    out
}

/// `CCYYMMDD`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

pub fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y%m%d").ok()
}
