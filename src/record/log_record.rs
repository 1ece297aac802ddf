//! Reflog records.
//!
//! The key of a log record is the ref name, a NUL byte and the update index
//! inverted and stored big-endian, so one ref's entries sort newest first:
//!
//! ```text
//! [ref_name][0x00][u64::MAX - update_index: u64 BE]
//! ```

use crate::coding::{DecodeBuf, EncodeBuf};
use crate::error::{Error, Result};

const VALUE_DELETION: u8 = 0;
const VALUE_UPDATE: u8 = 1;

/// Bytes appended to the ref name to form the key.
const KEY_SUFFIX_LEN: usize = 9;

/// Payload of a reflog update.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogUpdate {
    /// Object id before the update. Empty encodes as all zeroes.
    pub old_hash: Vec<u8>,
    /// Object id after the update. Empty encodes as all zeroes.
    pub new_hash: Vec<u8>,
    /// Committer name.
    pub name: String,
    /// Committer email.
    pub email: String,
    /// Seconds since the epoch.
    pub time: u64,
    /// Timezone offset, e.g. `-700` for UTC-07:00.
    pub tz_offset: i16,
    /// Reflog message.
    pub message: String,
}

/// Whether a log entry records an update or its removal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogValue {
    /// Tombstone for a previously written entry.
    #[default]
    Deletion,
    /// A ref update.
    Update(LogUpdate),
}

/// A single reflog entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogRecord {
    /// Ref the entry belongs to.
    pub ref_name: String,
    /// Update index of the transaction.
    pub update_index: u64,
    /// Entry contents.
    pub value: LogValue,
}

impl LogRecord {
    /// Create an update entry.
    pub fn update(ref_name: impl Into<String>, update_index: u64, update: LogUpdate) -> Self {
        Self {
            ref_name: ref_name.into(),
            update_index,
            value: LogValue::Update(update),
        }
    }

    /// Whether this record is a tombstone.
    pub fn is_deletion(&self) -> bool {
        matches!(self.value, LogValue::Deletion)
    }

    /// Sort key of the record.
    pub fn key(&self) -> Vec<u8> {
        Self::make_key(&self.ref_name, self.update_index)
    }

    pub(crate) fn make_key(ref_name: &str, update_index: u64) -> Vec<u8> {
        let mut key = Vec::with_capacity(ref_name.len() + KEY_SUFFIX_LEN);
        key.extend_from_slice(ref_name.as_bytes());
        key.push(0);
        key.extend_from_slice(&(u64::MAX - update_index).to_be_bytes());
        key
    }

    fn split_key(key: &[u8]) -> Result<(String, u64)> {
        if key.len() < KEY_SUFFIX_LEN {
            return Err(Error::format("log key too short"));
        }
        let (name, suffix) = key.split_at(key.len() - KEY_SUFFIX_LEN);
        if suffix[0] != 0 {
            return Err(Error::format("log key missing name terminator"));
        }
        let mut inverted = [0u8; 8];
        inverted.copy_from_slice(&suffix[1..]);
        let name = String::from_utf8(name.to_vec())
            .map_err(|_| Error::format("log ref name is not valid UTF-8"))?;
        Ok((name, u64::MAX - u64::from_be_bytes(inverted)))
    }

    pub(crate) fn value_type(&self) -> u8 {
        match self.value {
            LogValue::Deletion => VALUE_DELETION,
            LogValue::Update(_) => VALUE_UPDATE,
        }
    }

    pub(crate) fn encode(&self, buf: &mut [u8], hash_size: usize) -> Result<Option<usize>> {
        let update = match &self.value {
            LogValue::Deletion => return Ok(Some(0)),
            LogValue::Update(update) => update,
        };

        let zero = vec![0u8; hash_size];
        let old_hash = Self::hash_or_zero(&update.old_hash, &zero, &self.ref_name)?;
        let new_hash = Self::hash_or_zero(&update.new_hash, &zero, &self.ref_name)?;

        let mut out = EncodeBuf::new(buf);
        let fits = Self::encode_update(&mut out, update, old_hash, new_hash);
        Ok(fits.map(|()| out.written()))
    }

    fn encode_update(
        out: &mut EncodeBuf<'_>,
        update: &LogUpdate,
        old_hash: &[u8],
        new_hash: &[u8],
    ) -> Option<()> {
        out.put_bytes(old_hash)?;
        out.put_bytes(new_hash)?;
        out.put_string(update.name.as_bytes())?;
        out.put_string(update.email.as_bytes())?;
        out.put_varint(update.time)?;
        out.put_u16(update.tz_offset as u16)?;
        out.put_string(update.message.as_bytes())
    }

    fn hash_or_zero<'a>(hash: &'a [u8], zero: &'a [u8], ref_name: &str) -> Result<&'a [u8]> {
        if hash.is_empty() {
            return Ok(zero);
        }
        if hash.len() != zero.len() {
            return Err(Error::invalid_argument(format!(
                "log entry for {} carries a {}-byte hash, table uses {}",
                ref_name,
                hash.len(),
                zero.len()
            )));
        }
        Ok(hash)
    }

    pub(crate) fn decode(
        key: &[u8],
        value_type: u8,
        buf: &[u8],
        hash_size: usize,
    ) -> Result<(Self, usize)> {
        let (ref_name, update_index) = Self::split_key(key)?;

        match value_type {
            VALUE_DELETION => {
                let rec = Self {
                    ref_name,
                    update_index,
                    value: LogValue::Deletion,
                };
                return Ok((rec, 0));
            }
            VALUE_UPDATE => {}
            other => {
                return Err(Error::format(format!("unknown log value type {}", other)));
            }
        }

        let mut input = DecodeBuf::new(buf);
        let update = LogUpdate {
            old_hash: input.get_bytes(hash_size)?.to_vec(),
            new_hash: input.get_bytes(hash_size)?.to_vec(),
            name: input.get_string()?,
            email: input.get_string()?,
            time: input.get_varint()?,
            tz_offset: input.get_u16()? as i16,
            message: input.get_string()?,
        };

        Ok((
            Self {
                ref_name,
                update_index,
                value: LogValue::Update(update),
            },
            input.consumed(),
        ))
    }
}
