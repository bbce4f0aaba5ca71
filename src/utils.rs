use colored::Colorize;

use crate::{
    money,
    storage::models::{ClaimStatus, DenialStatus},
};

/// Format cents as dollars with color
pub fn format_amount(cents: i64) -> String {
    format!("${}", money::format_decimal(cents)).yellow().to_string()
}

/// Shorten long identifiers (tracking ids, traces) for table cells
pub fn truncate_middle(text: &str, max: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max || max < 5 {
        return text.to_string();
    }
    let side = (max - 3) / 2;
    let head: String = chars[..side].iter().collect();
    let tail: String = chars[chars.len() - side..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Format timestamp in human-readable format
pub fn format_timestamp(timestamp: &chrono::DateTime<chrono::Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

pub fn format_optional_date(date: Option<chrono::NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
}

pub fn colorize_claim_status(status: ClaimStatus) -> String {
    let label = status.as_str();
    match status {
        ClaimStatus::Paid | ClaimStatus::Resolved => label.green().to_string(),
        ClaimStatus::PartiallyPaid | ClaimStatus::Appealing => label.yellow().to_string(),
        ClaimStatus::Denied => label.red().to_string(),
        ClaimStatus::Draft | ClaimStatus::Submitted => label.cyan().to_string(),
    }
}

pub fn colorize_denial_status(status: DenialStatus) -> String {
    let label = status.as_str();
    match status {
        DenialStatus::Pending => label.red().to_string(),
        DenialStatus::Appealing => label.yellow().to_string(),
        DenialStatus::Resolved => label.green().to_string(),
    }
}

/// Prompt user for yes/no confirmation
pub fn confirm_action(prompt: &str) -> bool {
    use std::io::{self, Write};

    print!("{} (y/N): ", prompt);
    if io::stdout().flush().is_err() {
        return false;
    }

    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return false;
    }

    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Print a formatted table border
pub fn print_table_border(width: usize) {
    println!("{}", "=".repeat(width));
}

/// Print a table row with columns
pub fn print_table_row(columns: &[&str], widths: &[usize]) {
    let mut row = String::new();
    for (i, col) in columns.iter().enumerate() {
        if i < widths.len() {
            row.push_str(&format!("{:<width$}  ", col, width = widths[i]));
        }
    }
    println!("{}", row.trim_end());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_middle() {
        assert_eq!(truncate_middle("CH-CLM00000001", 20), "CH-CLM00000001");
        assert_eq!(truncate_middle("1512345678901234567890", 11), "1512...7890");
    }

    #[test]
    fn test_format_amount_contains_dollars() {
        colored::control::set_override(false);
        assert_eq!(format_amount(16500), "$165.00");
        assert_eq!(format_optional_date(None), "-");
    }
}
