//! Order-preserving string keys for versions.
//!
//! A key is one length character (`'a'` plus the number of decimal digits)
//! followed by the decimal digits. Shorter numbers get a smaller leading
//! character, so byte-wise key order equals numeric order.

use crate::error::{CodecError, CodecResult};

/// Encodes a version as a sortable key.
pub fn encode(version: u64) -> String {
    let digits = version.to_string();
    // At most 20 digits, so the prefix stays within 'b'..='u'.
    let prefix = char::from(b'a' + digits.len() as u8);
    let mut key = String::with_capacity(digits.len() + 1);
    key.push(prefix);
    key.push_str(&digits);
    key
}

/// Decodes a key produced by [`encode`].
pub fn decode(key: &str) -> CodecResult<u64> {
    let bytes = key.as_bytes();
    let (&prefix, digits) = bytes
        .split_first()
        .ok_or_else(|| CodecError::invalid_sort_key(key))?;

    let expected_len = usize::from(prefix.wrapping_sub(b'a'));
    if digits.is_empty()
        || digits.len() != expected_len
        || !digits.iter().all(u8::is_ascii_digit)
        || (digits.len() > 1 && digits[0] == b'0')
    {
        return Err(CodecError::invalid_sort_key(key));
    }

    key[1..]
        .parse::<u64>()
        .map_err(|_| CodecError::invalid_sort_key(key))
}
