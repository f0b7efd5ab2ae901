//! United Airlines e-ticket receipts.
//!
//! Both the amount and the date live in the HTML body. The circuit for this
//! vendor reads the body in two deferred segments, so the split point is
//! computed here alongside the extraction, once.

use chrono::{DateTime, Utc};
use zimburse_common::{parse_micro_units, ByteRange, ClaimRecord};

use crate::anchor::AnchorScan;
use crate::date::parse_receipt_date;
use crate::error::ParseError;
use crate::header::extract_parties;
use crate::vendor::Vendor;

pub const TOTAL_ANCHOR: &str = "Total:";
pub const CURRENCY_SUFFIX: &str = " USD";
/// Row label that precedes the flight arrival cell carrying the date.
pub const DATE_ANCHOR: &str = "2nd bag weight and dimensions";
pub const ARRIVAL_CLOSE: &str = ")<br/>";
pub const LINE_BREAK: &str = "<br/>";

/// Body split into the segments the circuit consumes separately.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeferredBody {
    /// From the first of the amount/date anchors through the end of the later one.
    pub amount_to_date: Vec<u8>,
    /// Everything after `amount_to_date`.
    pub remaining: Vec<u8>,
    /// Length of the decoded body the segments were cut from.
    pub actual_length: usize,
}

/// Record plus deferred segments, computed in one pass over the body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitedReceipt {
    pub record: ClaimRecord,
    pub deferred: DeferredBody,
}

/// Extract a claim record from a verified United receipt.
pub fn extract(
    body: &[u8],
    header: &[u8],
    from_range: Option<ByteRange>,
    to_range: Option<ByteRange>,
) -> Result<ClaimRecord, ParseError> {
    extract_with_deferred(body, header, from_range, to_range).map(|receipt| receipt.record)
}

pub fn extract_with_deferred(
    body: &[u8],
    header: &[u8],
    from_range: Option<ByteRange>,
    to_range: Option<ByteRange>,
) -> Result<UnitedReceipt, ParseError> {
    let parties = extract_parties(Vendor::United, header, from_range, to_range)?;
    let scan = AnchorScan::new(Vendor::United, body);

    let amount = locate_amount(&scan)?;
    let date = locate_date(&scan)?;

    let split_start = amount.start.min(date.start);
    let split_end = amount.end.max(date.end);
    let deferred = DeferredBody {
        amount_to_date: scan.bytes(split_start, split_end).to_vec(),
        remaining: scan.tail(split_end).to_vec(),
        actual_length: scan.len(),
    };

    Ok(UnitedReceipt {
        record: ClaimRecord {
            amount: amount.value,
            date: date.value,
            from: parties.from,
            to: parties.to,
        },
        deferred,
    })
}

/// Parsed value and the body span it was read from.
struct Located<T> {
    value: T,
    start: usize,
    end: usize,
}

/// `Total:` → next ` USD` → nearest preceding `>`; the text between is the amount.
fn locate_amount(scan: &AnchorScan<'_>) -> Result<Located<u128>, ParseError> {
    let total_index = scan.find(TOTAL_ANCHOR, 0)?;
    let amount_end = scan.find(CURRENCY_SUFFIX, total_index)?;
    let amount_start = scan.rfind(">", amount_end)? + 1;

    let text = scan.slice(amount_start, amount_end, "amount")?;
    let value = parse_micro_units(text)
        .map_err(|_| ParseError::new(Vendor::United, format!("valid amount (found {text:?})")))?;

    Ok(Located {
        value,
        start: total_index,
        end: amount_end,
    })
}

/// Anchor row → `)<br/>` closing the arrival cell → preceding `<br/>` ends the
/// date → preceding `>` starts it.
fn locate_date(scan: &AnchorScan<'_>) -> Result<Located<DateTime<Utc>>, ParseError> {
    let anchor_index = scan.find(DATE_ANCHOR, 0)?;
    let arrival_index = scan.find(ARRIVAL_CLOSE, anchor_index)?;
    let date_end = scan.rfind(LINE_BREAK, arrival_index)?;
    let date_start = scan.rfind(">", date_end)? + 1;

    let text = scan.slice(date_start, date_end, "date")?;
    let value = parse_receipt_date(text)
        .ok_or_else(|| ParseError::new(Vendor::United, format!("valid date (found {text:?})")))?;

    Ok(Located {
        value,
        start: date_start,
        end: date_end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn body() -> String {
        concat!(
            "<html><table>",
            "<tr><td>Fare</td><td>1,500.00 USD</td></tr>",
            "<tr><td>Total:</td><td style=\"bold\">1,717.85 USD</td></tr>",
            "<tr><td>2nd bag weight and dimensions</td>",
            "<td>Tue, Sep 03, 2024<br/>Houston, TX, US (IAH)<br/></td></tr>",
            "<p>Thank you for choosing United</p></table></html>"
        )
        .to_string()
    }

    #[test]
    fn test_amount_and_date() {
        let body = body();
        let scan = AnchorScan::new(Vendor::United, body.as_bytes());
        assert_eq!(locate_amount(&scan).unwrap().value, 1_717_850_000);
        assert_eq!(
            locate_date(&scan).unwrap().value,
            Utc.with_ymd_and_hms(2024, 9, 3, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_deferred_split_covers_body() {
        let body = body();
        let header = b"from:receipts@united.comto:me@example.com";
        let receipt = extract_with_deferred(
            body.as_bytes(),
            header,
            Some(ByteRange::new(5, 19)),
            Some(ByteRange::new(27, 14)),
        )
        .unwrap();

        let deferred = &receipt.deferred;
        assert_eq!(deferred.actual_length, body.len());
        let segment = String::from_utf8(deferred.amount_to_date.clone()).unwrap();
        assert!(segment.starts_with("Total:"));
        assert!(segment.ends_with("Tue, Sep 03, 2024"));
        let remaining = String::from_utf8(deferred.remaining.clone()).unwrap();
        assert!(remaining.starts_with("<br/>Houston"));
        assert!(body.ends_with(&remaining));
        assert_eq!(receipt.record.from, "receipts@united.com");
    }

    #[test]
    fn test_missing_date_anchor() {
        let body = body().replace("2nd bag weight and dimensions", "Baggage");
        let scan = AnchorScan::new(Vendor::United, body.as_bytes());
        let err = locate_date(&scan).map(|_| ()).unwrap_err();
        assert_eq!(err.vendor, Vendor::United);
        assert!(err.missing_anchor.contains(DATE_ANCHOR));
    }
}
