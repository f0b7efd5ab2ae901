//! Signed-header helpers shared by every vendor.

use zimburse_common::ByteRange;

use crate::error::ParseError;
use crate::vendor::Vendor;

/// Sender and recipient addresses decoded from the signed header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parties {
    pub from: String,
    pub to: String,
}

/// Slice the header at the verifier-supplied ranges and decode both addresses.
pub fn extract_parties(
    vendor: Vendor,
    header: &[u8],
    from_range: Option<ByteRange>,
    to_range: Option<ByteRange>,
) -> Result<Parties, ParseError> {
    let from = decode_range(vendor, header, from_range, "sender")?;
    let to = decode_range(vendor, header, to_range, "recipient")?;
    Ok(Parties { from, to })
}

fn decode_range(
    vendor: Vendor,
    header: &[u8],
    range: Option<ByteRange>,
    what: &str,
) -> Result<String, ParseError> {
    let range = range.ok_or_else(|| ParseError::new(vendor, format!("{what} address range")))?;
    let bytes = range.slice(header).ok_or_else(|| {
        ParseError::new(
            vendor,
            format!(
                "{what} address at header offsets {}..{}",
                range.index,
                range.index.saturating_add(range.length)
            ),
        )
    })?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| ParseError::new(vendor, format!("utf-8 {what} address")))
}

/// Value of the `date:` header line, up to the next CRLF (or end of header).
pub fn header_date_line(vendor: Vendor, header: &[u8]) -> Result<String, ParseError> {
    const DATE_ANCHOR: &str = "date:";

    let scan = crate::anchor::AnchorScan::new(vendor, header);
    let date_index = scan.find(DATE_ANCHOR, 0)?;
    let value_start = date_index + DATE_ANCHOR.len();
    let line_end = crate::anchor::find_from(header, b"\r\n", date_index).unwrap_or(header.len());
    scan.slice(value_start, line_end, "date header").map(str::to_string)
}
