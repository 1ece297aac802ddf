//! Integer encodings shared by the record and block codecs.
//!
//! Fixed-width fields are big-endian. Variable-width fields use the
//! "offset" varint: big-endian groups of 7 bits where every continuation
//! byte adds one before shifting, so each value has exactly one encoding.

use crate::error::{Error, Result};

/// Longest varint encoding of a `u64`.
pub const MAX_VARINT_LEN: usize = 10;

/// Writes `val` as a varint into `buf`. Returns the number of bytes
/// written, or `None` if `buf` is too small.
pub fn put_varint(buf: &mut [u8], mut val: u64) -> Option<usize> {
    let mut tmp = [0u8; MAX_VARINT_LEN];
    let mut i = MAX_VARINT_LEN - 1;
    tmp[i] = (val & 0x7f) as u8;
    loop {
        val >>= 7;
        if val == 0 {
            break;
        }
        val -= 1;
        i -= 1;
        tmp[i] = 0x80 | (val & 0x7f) as u8;
    }

    let n = MAX_VARINT_LEN - i;
    if n > buf.len() {
        return None;
    }
    buf[..n].copy_from_slice(&tmp[i..]);
    Some(n)
}

/// Reads a varint from the front of `buf`. Returns the value and the number
/// of bytes consumed, or `None` if the encoding is truncated or overflows.
pub fn get_varint(buf: &[u8]) -> Option<(u64, usize)> {
    let mut b = *buf.first()?;
    let mut val = u64::from(b & 0x7f);
    let mut ptr = 0;
    while b & 0x80 != 0 {
        ptr += 1;
        b = *buf.get(ptr)?;
        if val >= (1 << 57) - 1 {
            return None;
        }
        val = ((val + 1) << 7) | u64::from(b & 0x7f);
    }
    Some((val, ptr + 1))
}

/// Number of bytes `put_varint` needs for `val`.
pub fn varint_len(val: u64) -> usize {
    let mut tmp = [0u8; MAX_VARINT_LEN];
    // A 10-byte buffer always fits.
    put_varint(&mut tmp, val).unwrap_or(MAX_VARINT_LEN)
}

/// Writes the low 24 bits of `val` big-endian into `buf[..3]`.
pub fn put_u24(buf: &mut [u8], val: u32) {
    buf[..3].copy_from_slice(&val.to_be_bytes()[1..]);
}

/// Reads a 24-bit big-endian value from `buf[..3]`.
pub fn get_u24(buf: &[u8]) -> u32 {
    u32::from_be_bytes([0, buf[0], buf[1], buf[2]])
}

/// Writes `val` big-endian into `buf[..2]`.
pub fn put_u16(buf: &mut [u8], val: u16) {
    buf[..2].copy_from_slice(&val.to_be_bytes());
}

/// Reads a 16-bit big-endian value from `buf[..2]`.
pub fn get_u16(buf: &[u8]) -> u16 {
    u16::from_be_bytes([buf[0], buf[1]])
}

/// Length of the longest common prefix of `a` and `b`.
pub fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

/// Returns the smallest index in `0..n` for which `pred` is true, or `n` if
/// there is none. `pred` must be monotone (false..false, true..true).
/// The first error returned by `pred` aborts the search.
pub fn binsearch<F>(n: usize, mut pred: F) -> Result<usize>
where
    F: FnMut(usize) -> Result<bool>,
{
    let (mut lo, mut hi) = (0, n);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if pred(mid)? {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    Ok(lo)
}

/// Checks that `buf` holds at least `n` bytes.
pub(crate) fn ensure_len(buf: &[u8], n: usize, what: &str) -> Result<()> {
    if buf.len() < n {
        return Err(Error::format(format!(
            "{} truncated: need {} bytes, have {}",
            what,
            n,
            buf.len()
        )));
    }
    Ok(())
}

/// Bounded write cursor over a destination range. Every `put_*` returns
/// `None` once the range is exhausted, leaving the caller to treat the
/// record as not fitting.
pub(crate) struct EncodeBuf<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> EncodeBuf<'a> {
    pub(crate) fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes written so far.
    pub(crate) fn written(&self) -> usize {
        self.pos
    }

    pub(crate) fn put_varint(&mut self, val: u64) -> Option<()> {
        let n = put_varint(&mut self.buf[self.pos..], val)?;
        self.pos += n;
        Some(())
    }

    pub(crate) fn put_bytes(&mut self, data: &[u8]) -> Option<()> {
        let end = self.pos.checked_add(data.len())?;
        self.buf.get_mut(self.pos..end)?.copy_from_slice(data);
        self.pos = end;
        Some(())
    }

    pub(crate) fn put_u16(&mut self, val: u16) -> Option<()> {
        self.put_bytes(&val.to_be_bytes())
    }

    /// Varint length followed by the bytes.
    pub(crate) fn put_string(&mut self, data: &[u8]) -> Option<()> {
        self.put_varint(data.len() as u64)?;
        self.put_bytes(data)
    }
}

/// Read cursor over an encoded record. Running off the end is a format
/// error.
pub(crate) struct DecodeBuf<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> DecodeBuf<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes consumed so far.
    pub(crate) fn consumed(&self) -> usize {
        self.pos
    }

    pub(crate) fn get_varint(&mut self) -> Result<u64> {
        let (val, n) = get_varint(&self.buf[self.pos..])
            .ok_or_else(|| Error::format("malformed varint"))?;
        self.pos += n;
        Ok(val)
    }

    pub(crate) fn get_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let rest = &self.buf[self.pos..];
        ensure_len(rest, n, "record field")?;
        self.pos += n;
        Ok(&rest[..n])
    }

    pub(crate) fn get_u16(&mut self) -> Result<u16> {
        let b = self.get_bytes(2)?;
        Ok(get_u16(b))
    }

    pub(crate) fn get_string(&mut self) -> Result<String> {
        let len = self.get_varint()?;
        let len = usize::try_from(len).map_err(|_| Error::format("string length overflow"))?;
        let bytes = self.get_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| Error::format("string is not valid UTF-8"))
    }
}
