//! Configuration options for writing reftables.

use crate::error::{Error, Result};

/// Default block size (4KB).
pub const DEFAULT_BLOCK_SIZE: u32 = 4096;

/// Default number of records between restart points.
pub const DEFAULT_RESTART_INTERVAL: usize = 16;

/// Block sizes must fit the 3-byte length field of the block header.
pub const MAX_BLOCK_SIZE: u32 = (1 << 24) - 1;

/// The object-id function shared by every table in a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashId {
    /// SHA-1, 20-byte object ids.
    #[default]
    Sha1,
    /// SHA-256, 32-byte object ids.
    Sha256,
}

impl HashId {
    /// Length in bytes of an object id.
    pub fn size(self) -> usize {
        match self {
            HashId::Sha1 => 20,
            HashId::Sha256 => 32,
        }
    }

    /// The 4-byte identifier stored in version 2 file headers.
    pub fn format_id(self) -> u32 {
        match self {
            HashId::Sha1 => u32::from_be_bytes(*b"sha1"),
            HashId::Sha256 => u32::from_be_bytes(*b"s256"),
        }
    }

    /// Inverse of [`HashId::format_id`].
    pub fn from_format_id(id: u32) -> Option<Self> {
        match &id.to_be_bytes() {
            b"sha1" => Some(HashId::Sha1),
            b"s256" => Some(HashId::Sha256),
            _ => None,
        }
    }
}

/// Options for [`TableWriter`](crate::table::TableWriter).
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Size of each block in bytes. Non-log blocks are padded to this size.
    /// Default: 4KB
    pub block_size: u32,

    /// Number of records between restart points.
    /// Default: 16
    pub restart_interval: usize,

    /// Object-id function.
    /// Default: SHA-1
    pub hash_id: HashId,

    /// Lowest update index any record in the table may carry.
    /// Default: 0
    pub min_update_index: u64,

    /// Highest update index any record in the table may carry.
    /// Default: 0
    pub max_update_index: u64,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            restart_interval: DEFAULT_RESTART_INTERVAL,
            hash_id: HashId::Sha1,
            min_update_index: 0,
            max_update_index: 0,
        }
    }
}

impl WriteOptions {
    /// Creates a new WriteOptions with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the block size.
    pub fn block_size(mut self, size: u32) -> Self {
        self.block_size = size;
        self
    }

    /// Sets the restart interval.
    pub fn restart_interval(mut self, interval: usize) -> Self {
        self.restart_interval = interval;
        self
    }

    /// Sets the object-id function.
    pub fn hash_id(mut self, hash_id: HashId) -> Self {
        self.hash_id = hash_id;
        self
    }

    /// Sets the update index range covered by the table.
    pub fn update_index_range(mut self, min: u64, max: u64) -> Self {
        self.min_update_index = min;
        self.max_update_index = max;
        self
    }

    /// Validates the options and returns an error if any are invalid.
    pub fn validate(&self) -> Result<()> {
        // Room for the largest file header plus a block header and an
        // empty restart table.
        if self.block_size < 64 {
            return Err(Error::invalid_argument("block_size must be >= 64"));
        }
        if self.block_size > MAX_BLOCK_SIZE {
            return Err(Error::invalid_argument(format!(
                "block_size must be <= {}",
                MAX_BLOCK_SIZE
            )));
        }
        if self.restart_interval == 0 {
            return Err(Error::invalid_argument("restart_interval must be > 0"));
        }
        if self.min_update_index > self.max_update_index {
            return Err(Error::invalid_argument(
                "min_update_index must not exceed max_update_index",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = WriteOptions::default();
        assert_eq!(opts.block_size, 4096);
        assert_eq!(opts.restart_interval, 16);
        assert_eq!(opts.hash_id, HashId::Sha1);
    }

    #[test]
    fn test_options_builder() {
        let opts = WriteOptions::new()
            .block_size(256)
            .restart_interval(4)
            .hash_id(HashId::Sha256)
            .update_index_range(3, 7);

        assert_eq!(opts.block_size, 256);
        assert_eq!(opts.restart_interval, 4);
        assert_eq!(opts.hash_id.size(), 32);
        assert_eq!((opts.min_update_index, opts.max_update_index), (3, 7));
    }

    #[test]
    fn test_options_validation() {
        let mut opts = WriteOptions::default();
        assert!(opts.validate().is_ok());

        opts.restart_interval = 0;
        assert!(opts.validate().is_err());

        opts.restart_interval = 16;
        opts.block_size = 1 << 24;
        assert!(opts.validate().is_err());

        opts.block_size = 4096;
        opts.min_update_index = 5;
        opts.max_update_index = 4;
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_hash_id_format_id() {
        for id in [HashId::Sha1, HashId::Sha256] {
            assert_eq!(HashId::from_format_id(id.format_id()), Some(id));
        }
        assert_eq!(HashId::from_format_id(0), None);
    }
}
