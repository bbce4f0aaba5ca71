//! Amounts are carried as integer cents; these helpers are the only place
//! that converts to and from decimal text.

/// Cents per dollar
pub const CENTS_PER_DOLLAR: i64 = 100;

/// Render cents as a plain two-decimal amount, e.g. `16500` -> `"165.00"`.
pub fn format_decimal(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Parse a decimal amount (`"165"`, `"165.5"`, `"-20.00"`, `".75"`) into cents.
///
/// More than two fractional digits are rejected rather than rounded.
pub fn parse_decimal(text: &str) -> Option<i64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let (whole, fraction) = match digits.split_once('.') {
        Some((w, f)) => (w, f),
        None => (digits, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if fraction.len() > 2
        || !whole.chars().all(|c| c.is_ascii_digit())
        || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let whole_value: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let fraction_value: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().ok()? * 10,
        _ => fraction.parse().ok()?,
    };

    let cents = whole_value
        .checked_mul(CENTS_PER_DOLLAR)?
        .checked_add(fraction_value)?;
    Some(if negative { -cents } else { cents })
}

/// Convert cents to dollars (as f64), for display only
pub fn cents_to_dollars(cents: i64) -> f64 {
    cents as f64 / CENTS_PER_DOLLAR as f64
}
