//! Linode billing receipts.
//!
//! The amount sits after a fixed sentence in the plain-text body; the date is
//! taken from the signed `date:` header.

use zimburse_common::{parse_micro_units, ByteRange, ClaimRecord};

use crate::anchor::AnchorScan;
use crate::date::parse_receipt_date;
use crate::error::ParseError;
use crate::header::{extract_parties, header_date_line};
use crate::vendor::Vendor;

/// Sentence that immediately precedes the charged amount.
pub const AMOUNT_PREFIX: &str =
    "This is your receipt of payment against your credit card in the amount of";

/// Extract a claim record from a verified Linode receipt.
pub fn extract(
    body: &[u8],
    header: &[u8],
    from_range: Option<ByteRange>,
    to_range: Option<ByteRange>,
) -> Result<ClaimRecord, ParseError> {
    let parties = extract_parties(Vendor::Linode, header, from_range, to_range)?;
    let amount = extract_amount(body)?;
    let date = extract_date(header)?;

    Ok(ClaimRecord {
        amount,
        date,
        from: parties.from,
        to: parties.to,
    })
}

/// `$` nearest before the first decimal point after the prefix, through two
/// cents digits.
fn extract_amount(body: &[u8]) -> Result<u128, ParseError> {
    let scan = AnchorScan::new(Vendor::Linode, body);

    let prefix_index = scan.find(AMOUNT_PREFIX, 0)?;
    let decimal_index = scan.find(".", prefix_index + AMOUNT_PREFIX.len())?;
    let dollar_index = scan.rfind("$", decimal_index)?;

    let amount_text = scan.slice(dollar_index + 1, decimal_index + 3, "amount")?;
    parse_micro_units(amount_text)
        .map_err(|_| ParseError::new(Vendor::Linode, format!("valid amount (found {amount_text:?})")))
}

fn extract_date(header: &[u8]) -> Result<chrono::DateTime<chrono::Utc>, ParseError> {
    let line = header_date_line(Vendor::Linode, header)?;
    parse_receipt_date(&line)
        .ok_or_else(|| ParseError::new(Vendor::Linode, format!("valid date header (found {line:?})")))
}
