//! Output formatting utilities

use chrono::NaiveDateTime;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};
use rust_decimal::Decimal;
use tally_core::TransactionKind;

/// Print a success message
pub fn success(msg: &str) {
    println!("{}", msg.green());
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

/// Print a warning message
pub fn warning(msg: &str) {
    println!("{}", msg.yellow());
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{}", msg.cyan());
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Format an amount with the currency symbol, thousands separators and two decimals
pub fn format_money(amount: Decimal, symbol: &str) -> String {
    let fixed = format!("{:.2}", amount.abs().round_dp(2));
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount.is_sign_negative() && !amount.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{}{}{}.{}", sign, symbol, grouped, cents)
}

/// Human label for a ledger entry type
pub fn kind_label(kind: TransactionKind) -> &'static str {
    match kind {
        TransactionKind::Deposit => "Deposit",
        TransactionKind::Withdrawal => "Withdrawal",
        TransactionKind::TransferSent => "Transfer sent",
        TransactionKind::TransferReceived => "Transfer received",
    }
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_money_groups_thousands() {
        assert_eq!(format_money(Decimal::new(250000, 2), "₦"), "₦2,500.00");
        assert_eq!(format_money(Decimal::new(123456789, 1), "$"), "$12,345,678.90");
        assert_eq!(format_money(Decimal::new(999, 0), ""), "999.00");
    }

    #[test]
    fn test_format_money_small_and_negative() {
        assert_eq!(format_money(Decimal::ZERO, "₦"), "₦0.00");
        assert_eq!(format_money(Decimal::new(5, 2), "₦"), "₦0.05");
        assert_eq!(format_money(Decimal::new(-150000, 2), "₦"), "-₦1,500.00");
    }
}
