//! Formatting helpers for tree output

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Format a number with thousands separators
pub fn format_number<T: ToString>(n: T) -> String {
    let s = n.to_string();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", s.as_str()),
    };

    let mut result = String::new();
    let mut count = 0;
    for c in digits.chars().rev() {
        if count == 3 {
            result.push(',');
            count = 0;
        }
        result.push(c);
        count += 1;
    }
    format!("{}{}", sign, result.chars().rev().collect::<String>())
}

/// Format a money amount with two decimal places and thousands separators
pub fn format_amount(amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let abs = rounded.abs();
    let whole = abs.trunc();
    let cents = ((abs - whole) * Decimal::from(100)).trunc().to_u32().unwrap_or(0);

    format!(
        "{}{}.{:02}",
        if negative { "-" } else { "" },
        format_number(whole),
        cents
    )
}

/// Prefix a label with two spaces per tree level
pub fn indent(level: usize, label: &str) -> String {
    format!("{}{}", "  ".repeat(level), label)
}
