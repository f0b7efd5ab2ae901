//! Exact-precision monetary amounts.
//!
//! Every amount that crosses the claim path is an integer count of micro-units
//! (10⁻⁶ of a dollar, matching the USDC token's 6 decimals). Text is converted
//! digit by digit; no floating point is involved anywhere.

use crate::error::{Error, Result};

/// Number of fractional digits carried by a micro-unit amount.
pub const MICRO_DECIMALS: usize = 6;

/// Micro-units per whole unit.
pub const MICRO_PER_UNIT: u128 = 1_000_000;

/// Convert monetary text such as `"1,234.56"` into micro-units.
///
/// Thousands separators are dropped and the fractional part is right-padded
/// or right-truncated to exactly six digits. A comma is only accepted between
/// groups of three whole digits.
pub fn parse_micro_units(text: &str) -> Result<u128> {
    let trimmed = text.trim();

    if trimmed.is_empty() {
        return Err(Error::InvalidAmount(format!("empty amount: {text:?}")));
    }

    let (grouped, frac) = match trimmed.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (trimmed, ""),
    };
    let whole = strip_thousands(grouped)
        .ok_or_else(|| Error::InvalidAmount(format!("misplaced separator: {text:?}")))?;
    let whole = whole.as_str();

    if frac.contains('.') {
        return Err(Error::InvalidAmount(format!("multiple decimal points: {text:?}")));
    }
    if whole.is_empty() && frac.is_empty() {
        return Err(Error::InvalidAmount(format!("no digits: {text:?}")));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::InvalidAmount(format!("invalid whole part: {text:?}")));
    }
    if !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::InvalidAmount(format!("invalid fractional part: {text:?}")));
    }

    let whole_units: u128 = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<u128>()
            .map_err(|_| Error::AmountOverflow(text.to_string()))?
            .checked_mul(MICRO_PER_UNIT)
            .ok_or_else(|| Error::AmountOverflow(text.to_string()))?
    };

    let mut frac_digits: String = frac.chars().take(MICRO_DECIMALS).collect();
    while frac_digits.len() < MICRO_DECIMALS {
        frac_digits.push('0');
    }
    // Six ASCII digits always fit.
    let frac_units: u128 = frac_digits
        .parse()
        .map_err(|_| Error::InvalidAmount(format!("invalid fractional part: {text:?}")))?;

    whole_units
        .checked_add(frac_units)
        .ok_or_else(|| Error::AmountOverflow(text.to_string()))
}

/// `"1,234,567"` -> `"1234567"`; `None` unless every group after the first is
/// exactly three characters and the first is one to three.
fn strip_thousands(whole: &str) -> Option<String> {
    if !whole.contains(',') {
        return Some(whole.to_string());
    }
    let mut groups = whole.split(',');
    let first = groups.next()?;
    if first.is_empty() || first.len() > 3 {
        return None;
    }
    let mut digits = first.to_string();
    for group in groups {
        if group.len() != 3 {
            return None;
        }
        digits.push_str(group);
    }
    Some(digits)
}

/// Render micro-units for display: thousands separators and at least two
/// fractional digits (`1_234_560_000` → `"1,234.56"`).
pub fn format_micro_units(value: u128) -> String {
    let whole = value / MICRO_PER_UNIT;
    let frac = value % MICRO_PER_UNIT;

    let frac_str = format!("{frac:06}");
    let mut frac_trimmed = frac_str.trim_end_matches('0').to_string();
    while frac_trimmed.len() < 2 {
        frac_trimmed.push('0');
    }

    format!("{}.{}", group_thousands(whole), frac_trimmed)
}

fn group_thousands(value: u128) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Whether user-typed text is an acceptable partial amount: digits, at most
/// one decimal point, at most six fractional digits. Empty input is accepted
/// so a form field can be cleared.
pub fn is_valid_amount_input(text: &str) -> bool {
    let (whole, frac) = match text.split_once('.') {
        Some((whole, frac)) => (whole, Some(frac)),
        None => (text, None),
    };

    if !whole.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    match frac {
        None => true,
        Some(frac) => frac.len() <= MICRO_DECIMALS && frac.chars().all(|c| c.is_ascii_digit()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_separators() {
        assert_eq!(parse_micro_units("1,234.56").unwrap(), 1_234_560_000);
        assert_eq!(parse_micro_units("42.10").unwrap(), 42_100_000);
        assert_eq!(parse_micro_units("1717.85").unwrap(), 1_717_850_000);
        assert_eq!(parse_micro_units("10000").unwrap(), 10_000_000_000);
        assert_eq!(parse_micro_units(".5").unwrap(), 500_000);
        assert_eq!(parse_micro_units(" 7.").unwrap(), 7_000_000);
    }

    #[test]
    fn test_parse_rejects_misplaced_separators() {
        assert_eq!(parse_micro_units("1,234,567.00").unwrap(), 1_234_567_000_000);
        assert!(parse_micro_units("1,2,3.00").is_err());
        assert!(parse_micro_units("1234,567").is_err());
        assert!(parse_micro_units(",123").is_err());
        assert!(parse_micro_units("1,23").is_err());
        assert!(parse_micro_units("1.00,0").is_err());
    }

    #[test]
    fn test_parse_truncates_past_six_digits() {
        assert_eq!(parse_micro_units("0.1234567").unwrap(), 123_456);
        assert_eq!(parse_micro_units("0.000001").unwrap(), 1);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_micro_units("").is_err());
        assert!(parse_micro_units(".").is_err());
        assert!(parse_micro_units("1.2.3").is_err());
        assert!(parse_micro_units("12a.00").is_err());
        assert!(parse_micro_units("$12.00").is_err());
        assert!(matches!(
            parse_micro_units(&"9".repeat(40)),
            Err(Error::AmountOverflow(_))
        ));
    }

    #[test]
    fn test_format_roundtrip() {
        assert_eq!(format_micro_units(1_234_560_000), "1,234.56");
        assert_eq!(format_micro_units(42_100_000), "42.10");
        assert_eq!(format_micro_units(0), "0.00");
        assert_eq!(format_micro_units(1), "0.000001");
        assert_eq!(format_micro_units(1_000_000_000_000), "1,000,000.00");
        let text = format_micro_units(1_234_560_000);
        assert_eq!(parse_micro_units(&text).unwrap(), 1_234_560_000);
    }

    #[test]
    fn test_amount_input_validation() {
        assert!(is_valid_amount_input(""));
        assert!(is_valid_amount_input("12"));
        assert!(is_valid_amount_input("12."));
        assert!(is_valid_amount_input("12.123456"));
        assert!(is_valid_amount_input(".5"));
        assert!(!is_valid_amount_input("12.1234567"));
        assert!(!is_valid_amount_input("1.2.3"));
        assert!(!is_valid_amount_input("-1"));
        assert!(!is_valid_amount_input("1,000"));
    }
}
