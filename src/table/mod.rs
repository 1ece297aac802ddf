//! Table container: a file header followed by a run of blocks.
//!
//! ```text
//! [magic "REFT"][version: u8][block_size: u24]
//! [min_update_index: u64][max_update_index: u64]
//! [hash_id: u32]                     // version 2 only
//! [ref blocks...][log blocks...]
//! ```
//!
//! The header shares the first `block_size` bytes with the first block.
//! Ref blocks are padded to `block_size`; log blocks are stored compressed
//! and unpadded.

pub mod reader;
pub mod writer;

pub use reader::{Reader, TableIter};
pub use writer::{BlockStats, TableWriter, WriterStats};

use crate::coding::{ensure_len, get_u24, put_u24};
use crate::config::HashId;
use crate::error::{Error, Result};
use crate::iterator::RecordIterator;
use crate::record::{LogRecord, Record, RefRecord};

/// File magic.
pub const MAGIC: &[u8; 4] = b"REFT";

/// Header length of a version 1 (SHA-1) table.
pub const HEADER_V1_LEN: usize = 24;

/// Header length of a version 2 table, which names its hash function.
pub const HEADER_V2_LEN: usize = 28;

/// Parsed file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Format version, 1 or 2.
    pub version: u8,
    /// Padded size of ref blocks.
    pub block_size: u32,
    /// Lowest update index in the table.
    pub min_update_index: u64,
    /// Highest update index in the table.
    pub max_update_index: u64,
    /// Object-id function.
    pub hash_id: HashId,
}

impl FileHeader {
    /// Header for a table with the given settings. SHA-1 tables use the
    /// shorter version 1 header.
    pub fn new(block_size: u32, min_update_index: u64, max_update_index: u64, hash_id: HashId) -> Self {
        Self {
            version: if hash_id == HashId::Sha1 { 1 } else { 2 },
            block_size,
            min_update_index,
            max_update_index,
            hash_id,
        }
    }

    /// Encoded length.
    pub fn encoded_len(&self) -> usize {
        if self.version == 1 {
            HEADER_V1_LEN
        } else {
            HEADER_V2_LEN
        }
    }

    /// Encode the header.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.encoded_len()];
        buf[..4].copy_from_slice(MAGIC);
        buf[4] = self.version;
        put_u24(&mut buf[5..], self.block_size);
        buf[8..16].copy_from_slice(&self.min_update_index.to_be_bytes());
        buf[16..24].copy_from_slice(&self.max_update_index.to_be_bytes());
        if self.version == 2 {
            buf[24..28].copy_from_slice(&self.hash_id.format_id().to_be_bytes());
        }
        buf
    }

    /// Decode a header from the start of `data`.
    pub fn decode(data: &[u8]) -> Result<Self> {
        ensure_len(data, HEADER_V1_LEN, "file header")?;
        if &data[..4] != MAGIC {
            return Err(Error::format("bad table magic"));
        }

        let version = data[4];
        let hash_id = match version {
            1 => HashId::Sha1,
            2 => {
                ensure_len(data, HEADER_V2_LEN, "file header")?;
                let id = u32::from_be_bytes([data[24], data[25], data[26], data[27]]);
                HashId::from_format_id(id)
                    .ok_or_else(|| Error::format(format!("unknown hash id 0x{:08x}", id)))?
            }
            v => return Err(Error::format(format!("unsupported table version {}", v))),
        };

        let min_update_index = u64::from_be_bytes(fixed8(&data[8..16]));
        let max_update_index = u64::from_be_bytes(fixed8(&data[16..24]));
        Ok(Self {
            version,
            block_size: get_u24(&data[5..]),
            min_update_index,
            max_update_index,
            hash_id,
        })
    }
}

fn fixed8(b: &[u8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&b[..8]);
    out
}

/// Anything that can be seeked and iterated like a single table: one
/// [`Reader`], or a [`MergedTable`](crate::merged::MergedTable) of them.
pub trait Table: Send + Sync {
    /// Iterator over records of `rec`'s kind, starting at the first key
    /// `>= rec.key()`.
    fn seek_record(&self, rec: &Record) -> Result<Box<dyn RecordIterator + '_>>;

    /// Object-id function of the table.
    fn hash_id(&self) -> HashId;

    /// Lowest update index in the table.
    fn min_update_index(&self) -> u64;

    /// Highest update index in the table.
    fn max_update_index(&self) -> u64;

    /// Iterator over refs starting at `name`.
    fn seek_ref(&self, name: &str) -> Result<Box<dyn RecordIterator + '_>> {
        let want = RefRecord {
            ref_name: name.to_string(),
            ..Default::default()
        };
        self.seek_record(&want.into())
    }

    /// Iterator over log entries starting at `name`'s newest entry with an
    /// update index `<= update_index`.
    fn seek_log(&self, name: &str, update_index: u64) -> Result<Box<dyn RecordIterator + '_>> {
        let want = LogRecord {
            ref_name: name.to_string(),
            update_index,
            ..Default::default()
        };
        self.seek_record(&want.into())
    }
}

/// Looks up a single ref. A deletion reads as absent.
pub fn read_ref(table: &dyn Table, name: &str) -> Result<Option<RefRecord>> {
    let mut iter = table.seek_ref(name)?;
    match iter.next_ref()? {
        Some(r) if r.ref_name == name && !r.is_deletion() => Ok(Some(r)),
        _ => Ok(None),
    }
}

/// Looks up the log entry of `name` in effect at `update_index`: the newest
/// entry written at or before it. A deleted entry reads as absent.
pub fn read_log_at(table: &dyn Table, name: &str, update_index: u64) -> Result<Option<LogRecord>> {
    let mut iter = table.seek_log(name, update_index)?;
    match iter.next_log()? {
        Some(l) if l.ref_name == name && !l.is_deletion() => Ok(Some(l)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_v1() {
        let header = FileHeader::new(4096, 3, 9, HashId::Sha1);
        let encoded = header.encode();
        assert_eq!(encoded.len(), HEADER_V1_LEN);
        assert_eq!(&encoded[..5], b"REFT\x01");
        assert_eq!(FileHeader::decode(&encoded).unwrap(), header);
    }

    #[test]
    fn test_header_v2() {
        let header = FileHeader::new(256, 0, u64::MAX, HashId::Sha256);
        let encoded = header.encode();
        assert_eq!(encoded.len(), HEADER_V2_LEN);
        assert_eq!(&encoded[24..], b"s256");
        assert_eq!(FileHeader::decode(&encoded).unwrap(), header);
    }

    #[test]
    fn test_header_rejects_garbage() {
        assert!(FileHeader::decode(b"REFT").unwrap_err().is_format());

        let mut encoded = FileHeader::new(4096, 1, 1, HashId::Sha1).encode();
        encoded[0] = b'X';
        assert!(FileHeader::decode(&encoded).unwrap_err().is_format());

        let mut encoded = FileHeader::new(4096, 1, 1, HashId::Sha1).encode();
        encoded[4] = 9;
        assert!(FileHeader::decode(&encoded).unwrap_err().is_format());
    }
}
