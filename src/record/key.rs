//! Prefix-compressed key encoding.
//!
//! ```text
//! [prefix_len: varint]                   // bytes shared with the previous key
//! [suffix_len << 3 | value_type: varint]
//! [suffix: bytes]
//! ```

use crate::coding::{common_prefix_len, ensure_len, get_varint, put_varint};
use crate::error::{Error, Result};

/// Value types occupy the low three bits of the suffix length field.
pub const MAX_VALUE_TYPE: u8 = 0x7;

/// Encodes `key` relative to `prev_key` into `buf`.
///
/// Returns the number of bytes written, or `None` if `buf` is too small. An
/// empty `prev_key` writes the key in full.
pub fn encode_key(buf: &mut [u8], prev_key: &[u8], key: &[u8], value_type: u8) -> Option<usize> {
    debug_assert!(value_type <= MAX_VALUE_TYPE);

    let prefix_len = common_prefix_len(prev_key, key);
    let suffix = &key[prefix_len..];

    let mut n = put_varint(buf, prefix_len as u64)?;
    n += put_varint(
        &mut buf[n..],
        ((suffix.len() as u64) << 3) | u64::from(value_type & MAX_VALUE_TYPE),
    )?;

    let end = n + suffix.len();
    buf.get_mut(n..end)?.copy_from_slice(suffix);
    Some(end)
}

/// Decodes a key written by [`encode_key`] against the same `prev_key`.
///
/// Returns the full key, its value type and the number of bytes consumed.
pub fn decode_key(buf: &[u8], prev_key: &[u8]) -> Result<(Vec<u8>, u8, usize)> {
    let (prefix_len, n1) =
        get_varint(buf).ok_or_else(|| Error::format("malformed key prefix length"))?;
    let (suffix_field, n2) =
        get_varint(&buf[n1..]).ok_or_else(|| Error::format("malformed key suffix length"))?;

    let value_type = (suffix_field & u64::from(MAX_VALUE_TYPE)) as u8;
    let suffix_len = usize::try_from(suffix_field >> 3)
        .map_err(|_| Error::format("key suffix length overflow"))?;
    let prefix_len =
        usize::try_from(prefix_len).map_err(|_| Error::format("key prefix length overflow"))?;

    if prefix_len > prev_key.len() {
        return Err(Error::format(format!(
            "key shares {} bytes with a {}-byte predecessor",
            prefix_len,
            prev_key.len()
        )));
    }

    let rest = &buf[n1 + n2..];
    ensure_len(rest, suffix_len, "key suffix")?;

    let mut key = Vec::with_capacity(prefix_len + suffix_len);
    key.extend_from_slice(&prev_key[..prefix_len]);
    key.extend_from_slice(&rest[..suffix_len]);
    Ok((key, value_type, n1 + n2 + suffix_len))
}
