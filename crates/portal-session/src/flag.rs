//! Boolean encoding at the store boundary.
//!
//! The proxy reads these values as raw strings, so exactly one encoding is
//! written: `"1"` for set, `"0"` for cleared. Anything other than `"1"` reads
//! back as cleared.

pub const FLAG_SET: &str = "1";
pub const FLAG_CLEARED: &str = "0";

/// Encodes a flag for storage.
#[must_use]
pub const fn encode(value: bool) -> &'static str {
    if value { FLAG_SET } else { FLAG_CLEARED }
}

/// Decodes a stored flag; absent values are cleared.
#[must_use]
pub fn decode(value: Option<&str>) -> bool {
    value == Some(FLAG_SET)
}

/// Returns `true` if `value` is one of the two canonical encodings.
#[must_use]
pub fn is_canonical(value: &str) -> bool {
    value == FLAG_SET || value == FLAG_CLEARED
}
