//! Records stored in reftable blocks.
//!
//! Each record is written as a prefix-compressed key (see [`key`]) followed
//! by a payload whose layout depends on the block type and the 3-bit value
//! type carried in the key header.

pub mod index;
pub mod key;
pub mod log_record;
pub mod ref_record;

pub use index::{IndexRecord, ObjRecord};
pub use key::{decode_key, encode_key};
pub use log_record::{LogRecord, LogUpdate, LogValue};
pub use ref_record::{RefRecord, RefValue};

use crate::block::BlockType;
use crate::error::Result;
use std::borrow::Cow;

/// One decoded record of any block type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// A ref.
    Ref(RefRecord),
    /// A reflog entry.
    Log(LogRecord),
    /// An object-id reverse index entry.
    Obj(ObjRecord),
    /// A block index entry.
    Index(IndexRecord),
}

impl Record {
    /// Block type this record lives in.
    pub fn block_type(&self) -> BlockType {
        match self {
            Record::Ref(_) => BlockType::Ref,
            Record::Log(_) => BlockType::Log,
            Record::Obj(_) => BlockType::Obj,
            Record::Index(_) => BlockType::Index,
        }
    }

    /// Sort key of the record.
    pub fn key(&self) -> Cow<'_, [u8]> {
        match self {
            Record::Ref(r) => Cow::Borrowed(r.ref_name.as_bytes()),
            Record::Log(l) => Cow::Owned(l.key()),
            Record::Obj(o) => Cow::Borrowed(&o.hash_prefix),
            Record::Index(i) => Cow::Borrowed(&i.last_key),
        }
    }

    /// The 3-bit value type written into the key header.
    pub fn value_type(&self) -> u8 {
        match self {
            Record::Ref(r) => r.value_type(),
            Record::Log(l) => l.value_type(),
            Record::Obj(o) => o.value_type(),
            Record::Index(_) => 0,
        }
    }

    /// Whether this record is a tombstone. Only refs and logs can be.
    pub fn is_deletion(&self) -> bool {
        match self {
            Record::Ref(r) => r.is_deletion(),
            Record::Log(l) => l.is_deletion(),
            Record::Obj(_) | Record::Index(_) => false,
        }
    }

    /// Encodes the payload (everything after the key) into `buf`.
    ///
    /// Returns `Ok(None)` if `buf` is too small; nothing meaningful has been
    /// written in that case. Errors are reserved for records that can never
    /// be written, such as a hash of the wrong length.
    pub fn encode(&self, buf: &mut [u8], hash_size: usize) -> Result<Option<usize>> {
        match self {
            Record::Ref(r) => r.encode(buf, hash_size),
            Record::Log(l) => l.encode(buf, hash_size),
            Record::Obj(o) => o.encode(buf),
            Record::Index(i) => Ok(i.encode(buf)),
        }
    }

    /// Decodes a payload written by [`Record::encode`], given its full key.
    ///
    /// Returns the record and the number of payload bytes consumed.
    pub fn decode(
        block_type: BlockType,
        key: &[u8],
        value_type: u8,
        buf: &[u8],
        hash_size: usize,
    ) -> Result<(Record, usize)> {
        Ok(match block_type {
            BlockType::Ref => {
                let (r, n) = RefRecord::decode(key, value_type, buf, hash_size)?;
                (Record::Ref(r), n)
            }
            BlockType::Log => {
                let (l, n) = LogRecord::decode(key, value_type, buf, hash_size)?;
                (Record::Log(l), n)
            }
            BlockType::Obj => {
                let (o, n) = ObjRecord::decode(key, value_type, buf)?;
                (Record::Obj(o), n)
            }
            BlockType::Index => {
                let (i, n) = IndexRecord::decode(key, buf)?;
                (Record::Index(i), n)
            }
        })
    }
}

impl From<RefRecord> for Record {
    fn from(r: RefRecord) -> Self {
        Record::Ref(r)
    }
}

impl From<LogRecord> for Record {
    fn from(l: LogRecord) -> Self {
        Record::Log(l)
    }
}

impl From<ObjRecord> for Record {
    fn from(o: ObjRecord) -> Self {
        Record::Obj(o)
    }
}

impl From<IndexRecord> for Record {
    fn from(i: IndexRecord) -> Self {
        Record::Index(i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_dispatch() {
        let rec: Record = RefRecord::new("refs/heads/main", 1, vec![7; 20]).into();
        assert_eq!(rec.block_type(), BlockType::Ref);
        assert_eq!(&*rec.key(), b"refs/heads/main");
        assert_eq!(rec.value_type(), 1);
        assert!(!rec.is_deletion());

        let mut buf = [0u8; 64];
        let n = rec.encode(&mut buf, 20).unwrap().unwrap();
        let (decoded, used) =
            Record::decode(BlockType::Ref, &rec.key(), rec.value_type(), &buf[..n], 20).unwrap();
        assert_eq!(used, n);
        assert_eq!(decoded, rec);
    }

    #[test]
    fn test_log_record_key_is_owned() {
        let rec: Record = LogRecord {
            ref_name: "refs/heads/main".into(),
            update_index: 2,
            value: LogValue::Deletion,
        }
        .into();
        assert!(matches!(rec.key(), Cow::Owned(_)));
        assert!(rec.is_deletion());
    }
}
