//! Auxiliary lookup records: object-id reverse index and block index.

use crate::coding::{DecodeBuf, EncodeBuf};
use crate::error::{Error, Result};

/// Maps an abbreviated object id to the offsets of the ref blocks that
/// mention it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjRecord {
    /// Unique prefix of the object id.
    pub hash_prefix: Vec<u8>,
    /// Ascending block offsets.
    pub offsets: Vec<u64>,
}

impl ObjRecord {
    pub(crate) fn value_type(&self) -> u8 {
        // Small counts ride in the key header instead of a varint.
        match self.offsets.len() {
            n @ 1..=7 => n as u8,
            _ => 0,
        }
    }

    pub(crate) fn encode(&self, buf: &mut [u8]) -> Result<Option<usize>> {
        if self.offsets.windows(2).any(|w| w[1] < w[0]) {
            return Err(Error::invalid_argument("object offsets must be ascending"));
        }
        let mut out = EncodeBuf::new(buf);
        Ok(self.encode_into(&mut out).map(|()| out.written()))
    }

    fn encode_into(&self, out: &mut EncodeBuf<'_>) -> Option<()> {
        if self.value_type() == 0 {
            out.put_varint(self.offsets.len() as u64)?;
        }
        let mut last = 0;
        for (i, &off) in self.offsets.iter().enumerate() {
            out.put_varint(if i == 0 { off } else { off - last })?;
            last = off;
        }
        Some(())
    }

    pub(crate) fn decode(key: &[u8], value_type: u8, buf: &[u8]) -> Result<(Self, usize)> {
        let mut input = DecodeBuf::new(buf);
        let count = match value_type {
            0 => input.get_varint()?,
            n => u64::from(n),
        };

        // Every offset takes at least one byte.
        if count > buf.len() as u64 {
            return Err(Error::format("object record offset count exceeds block"));
        }

        let mut offsets = Vec::with_capacity(count as usize);
        let mut last = 0u64;
        for i in 0..count {
            let delta = input.get_varint()?;
            let off = if i == 0 {
                delta
            } else {
                last.checked_add(delta)
                    .ok_or_else(|| Error::format("object offset overflow"))?
            };
            offsets.push(off);
            last = off;
        }

        Ok((
            Self {
                hash_prefix: key.to_vec(),
                offsets,
            },
            input.consumed(),
        ))
    }
}

/// Points at the block whose last key is `last_key`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexRecord {
    /// Last key of the indexed block.
    pub last_key: Vec<u8>,
    /// File offset of the indexed block.
    pub offset: u64,
}

impl IndexRecord {
    pub(crate) fn encode(&self, buf: &mut [u8]) -> Option<usize> {
        let mut out = EncodeBuf::new(buf);
        out.put_varint(self.offset)?;
        Some(out.written())
    }

    pub(crate) fn decode(key: &[u8], buf: &[u8]) -> Result<(Self, usize)> {
        let mut input = DecodeBuf::new(buf);
        let offset = input.get_varint()?;
        Ok((
            Self {
                last_key: key.to_vec(),
                offset,
            },
            input.consumed(),
        ))
    }
}
