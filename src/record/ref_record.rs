//! Ref records: name to object id, peeled object id, or symbolic target.

use crate::coding::{DecodeBuf, EncodeBuf};
use crate::error::{Error, Result};

const VALUE_DELETION: u8 = 0;
const VALUE_VAL1: u8 = 1;
const VALUE_VAL2: u8 = 2;
const VALUE_SYMREF: u8 = 3;

/// What a ref points at.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RefValue {
    /// Tombstone: the ref was deleted.
    #[default]
    Deletion,
    /// A single object id.
    Val1(Vec<u8>),
    /// An annotated tag and the object it peels to.
    Val2 {
        /// Object id of the tag.
        value: Vec<u8>,
        /// Object id the tag peels to.
        target_value: Vec<u8>,
    },
    /// A symbolic ref naming another ref.
    Symref(String),
}

/// A single ref.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RefRecord {
    /// Full ref name, e.g. `refs/heads/main`.
    pub ref_name: String,
    /// Update index of the transaction that wrote this ref.
    pub update_index: u64,
    /// Target of the ref.
    pub value: RefValue,
}

impl RefRecord {
    /// Create a ref pointing at `hash`.
    pub fn new(ref_name: impl Into<String>, update_index: u64, hash: Vec<u8>) -> Self {
        Self {
            ref_name: ref_name.into(),
            update_index,
            value: RefValue::Val1(hash),
        }
    }

    /// Create a deletion tombstone.
    pub fn deletion(ref_name: impl Into<String>, update_index: u64) -> Self {
        Self {
            ref_name: ref_name.into(),
            update_index,
            value: RefValue::Deletion,
        }
    }

    /// Create a symbolic ref.
    pub fn symref(ref_name: impl Into<String>, update_index: u64, target: impl Into<String>) -> Self {
        Self {
            ref_name: ref_name.into(),
            update_index,
            value: RefValue::Symref(target.into()),
        }
    }

    /// Whether this record is a tombstone.
    pub fn is_deletion(&self) -> bool {
        matches!(self.value, RefValue::Deletion)
    }

    /// The object id this ref points at directly, if any.
    pub fn hash(&self) -> Option<&[u8]> {
        match &self.value {
            RefValue::Val1(h) | RefValue::Val2 { value: h, .. } => Some(h),
            _ => None,
        }
    }

    pub(crate) fn value_type(&self) -> u8 {
        match self.value {
            RefValue::Deletion => VALUE_DELETION,
            RefValue::Val1(_) => VALUE_VAL1,
            RefValue::Val2 { .. } => VALUE_VAL2,
            RefValue::Symref(_) => VALUE_SYMREF,
        }
    }

    pub(crate) fn encode(&self, buf: &mut [u8], hash_size: usize) -> Result<Option<usize>> {
        for hash in self.hashes() {
            if hash.len() != hash_size {
                return Err(Error::invalid_argument(format!(
                    "ref {} carries a {}-byte hash, table uses {}",
                    self.ref_name,
                    hash.len(),
                    hash_size
                )));
            }
        }

        let mut out = EncodeBuf::new(buf);
        Ok(self.encode_into(&mut out).map(|()| out.written()))
    }

    fn encode_into(&self, out: &mut EncodeBuf<'_>) -> Option<()> {
        out.put_varint(self.update_index)?;
        match &self.value {
            RefValue::Deletion => {}
            RefValue::Val1(value) => out.put_bytes(value)?,
            RefValue::Val2 { value, target_value } => {
                out.put_bytes(value)?;
                out.put_bytes(target_value)?;
            }
            RefValue::Symref(target) => out.put_string(target.as_bytes())?,
        }
        Some(())
    }

    fn hashes(&self) -> impl Iterator<Item = &[u8]> {
        let (a, b): (Option<&[u8]>, Option<&[u8]>) = match &self.value {
            RefValue::Val1(v) => (Some(v.as_slice()), None),
            RefValue::Val2 {
                value,
                target_value,
            } => (Some(value.as_slice()), Some(target_value.as_slice())),
            _ => (None, None),
        };
        a.into_iter().chain(b)
    }

    pub(crate) fn decode(
        key: &[u8],
        value_type: u8,
        buf: &[u8],
        hash_size: usize,
    ) -> Result<(Self, usize)> {
        let ref_name = String::from_utf8(key.to_vec())
            .map_err(|_| Error::format("ref name is not valid UTF-8"))?;
        let mut input = DecodeBuf::new(buf);
        let update_index = input.get_varint()?;

        let value = match value_type {
            VALUE_DELETION => RefValue::Deletion,
            VALUE_VAL1 => RefValue::Val1(input.get_bytes(hash_size)?.to_vec()),
            VALUE_VAL2 => RefValue::Val2 {
                value: input.get_bytes(hash_size)?.to_vec(),
                target_value: input.get_bytes(hash_size)?.to_vec(),
            },
            VALUE_SYMREF => RefValue::Symref(input.get_string()?),
            other => {
                return Err(Error::format(format!("unknown ref value type {}", other)));
            }
        };

        Ok((
            Self {
                ref_name,
                update_index,
                value,
            },
            input.consumed(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(rec: &RefRecord) -> RefRecord {
        let mut buf = [0u8; 128];
        let n = rec.encode(&mut buf, 20).unwrap().unwrap();
        let (decoded, used) =
            RefRecord::decode(rec.ref_name.as_bytes(), rec.value_type(), &buf[..n], 20).unwrap();
        assert_eq!(used, n);
        decoded
    }

    #[test]
    fn test_ref_value_variants() {
        let records = [
            RefRecord::deletion("refs/heads/gone", 4),
            RefRecord::new("refs/heads/main", 1, vec![1; 20]),
            RefRecord {
                ref_name: "refs/tags/v1".into(),
                update_index: 2,
                value: RefValue::Val2 {
                    value: vec![2; 20],
                    target_value: vec![3; 20],
                },
            },
            RefRecord::symref("HEAD", 3, "refs/heads/main"),
        ];
        for rec in &records {
            assert_eq!(&round_trip(rec), rec);
        }
    }

    #[test]
    fn test_ref_wrong_hash_size() {
        let rec = RefRecord::new("refs/heads/main", 1, vec![1; 32]);
        let mut buf = [0u8; 128];
        assert!(matches!(rec.encode(&mut buf, 20), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_ref_does_not_fit() {
        let rec = RefRecord::new("refs/heads/main", 1, vec![1; 20]);
        let mut buf = [0u8; 10];
        assert_eq!(rec.encode(&mut buf, 20).unwrap(), None);
    }

    #[test]
    fn test_ref_truncated_hash() {
        let rec = RefRecord::new("refs/heads/main", 1, vec![1; 20]);
        let mut buf = [0u8; 64];
        let n = rec.encode(&mut buf, 20).unwrap().unwrap();
        let res = RefRecord::decode(b"refs/heads/main", 1, &buf[..n - 1], 20);
        assert!(res.unwrap_err().is_format());
    }

    #[test]
    fn test_ref_unknown_value_type() {
        let res = RefRecord::decode(b"x", 5, &[0], 20);
        assert!(res.unwrap_err().is_format());
    }
}
