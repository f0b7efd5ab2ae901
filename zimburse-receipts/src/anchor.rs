//! Anchor scanning over raw receipt bytes.
//!
//! Vendor strategies locate a fixed anchor substring, then walk forward to the
//! next delimiter or backward to the nearest preceding one. Offsets are byte
//! offsets; decoding to text happens only for the final slice.

use crate::error::ParseError;
use crate::vendor::Vendor;

/// First occurrence of `needle` starting at or after `from`.
pub fn find_from(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    if needle.is_empty() {
        return Some(from);
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}

/// Last occurrence of `needle` that starts at or before `pos`.
pub fn rfind_at_or_before(haystack: &[u8], needle: &[u8], pos: usize) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    let last_start = pos.min(haystack.len() - needle.len());
    (0..=last_start)
        .rev()
        .find(|&start| &haystack[start..start + needle.len()] == needle)
}

/// Anchor scanner bound to one vendor, so every miss becomes a [`ParseError`]
/// carrying that vendor.
#[derive(Clone, Copy)]
pub struct AnchorScan<'a> {
    vendor: Vendor,
    text: &'a [u8],
}

impl<'a> AnchorScan<'a> {
    pub fn new(vendor: Vendor, text: &'a [u8]) -> Self {
        Self { vendor, text }
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Forward search for `needle` from `from`.
    pub fn find(&self, needle: &str, from: usize) -> Result<usize, ParseError> {
        find_from(self.text, needle.as_bytes(), from)
            .ok_or_else(|| ParseError::new(self.vendor, format!("anchor `{needle}`")))
    }

    /// Backward search for `needle` starting at or before `pos`.
    pub fn rfind(&self, needle: &str, pos: usize) -> Result<usize, ParseError> {
        rfind_at_or_before(self.text, needle.as_bytes(), pos).ok_or_else(|| {
            ParseError::new(self.vendor, format!("`{needle}` before offset {pos}"))
        })
    }

    /// Decode `[start, end)` as UTF-8.
    pub fn slice(&self, start: usize, end: usize, what: &str) -> Result<&'a str, ParseError> {
        let bytes = self
            .text
            .get(start..end)
            .ok_or_else(|| ParseError::new(self.vendor, format!("{what} at offsets {start}..{end}")))?;
        std::str::from_utf8(bytes)
            .map_err(|_| ParseError::new(self.vendor, format!("utf-8 {what} at offsets {start}..{end}")))
    }

    /// Bytes from `start` to the end.
    pub fn tail(&self, start: usize) -> &'a [u8] {
        self.text.get(start..).unwrap_or_default()
    }

    pub fn bytes(&self, start: usize, end: usize) -> &'a [u8] {
        self.text.get(start..end).unwrap_or_default()
    }
}
