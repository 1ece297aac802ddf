//! Block writer: accumulates records into one block.

use crate::block::compress::compress;
use crate::block::{log_block_limit, BlockType, BLOCK_HEADER_SIZE, MAX_RESTARTS};
use crate::coding::{put_u16, put_u24};
use crate::config::{DEFAULT_RESTART_INTERVAL, MAX_BLOCK_SIZE};
use crate::error::{Error, Result};
use crate::record::{encode_key, Record};

/// BlockWriter fills one fixed-capacity block with prefix-compressed
/// records.
///
/// Every `restart_interval`-th record is written with its full key and
/// registered as a restart point so readers can binary search the block.
///
/// The first `header_off` bytes of the buffer are reserved for the caller
/// (the file header in the first block of a table).
///
/// A finished log block may be slightly longer than the buffer when its
/// payload does not compress; see [`log_block_limit`].
pub struct BlockWriter {
    buf: Vec<u8>,
    capacity: usize,
    header_off: usize,
    next: usize,
    restart_interval: usize,
    restarts: Vec<u32>,
    last_key: Vec<u8>,
    entries: usize,
    hash_size: usize,
    finished: bool,
}

impl BlockWriter {
    /// Create a writer for a block of `block_size` bytes.
    pub fn new(
        block_type: BlockType,
        block_size: usize,
        header_off: usize,
        hash_size: usize,
    ) -> Result<Self> {
        Self::with_buffer(block_type, vec![0u8; block_size], header_off, hash_size)
    }

    /// Create a writer over a caller-supplied buffer; its length is the
    /// block capacity.
    ///
    /// The buffer must hold the block header and an empty restart table, and
    /// must not exceed what the 3-byte length field can address.
    pub fn with_buffer(
        block_type: BlockType,
        buf: Vec<u8>,
        header_off: usize,
        hash_size: usize,
    ) -> Result<Self> {
        if header_off + BLOCK_HEADER_SIZE + 2 > buf.len() {
            return Err(Error::invalid_argument(format!(
                "block buffer of {} bytes too small for a header at offset {}",
                buf.len(),
                header_off
            )));
        }
        if buf.len() > MAX_BLOCK_SIZE as usize {
            return Err(Error::invalid_argument(format!(
                "block buffer of {} bytes exceeds the maximum of {}",
                buf.len(),
                MAX_BLOCK_SIZE
            )));
        }

        let mut writer = Self {
            capacity: buf.len(),
            buf,
            header_off,
            next: header_off + BLOCK_HEADER_SIZE,
            restart_interval: DEFAULT_RESTART_INTERVAL,
            restarts: Vec::new(),
            last_key: Vec::new(),
            entries: 0,
            hash_size,
            finished: false,
        };
        writer.buf[header_off] = block_type as u8;
        Ok(writer)
    }

    /// Set the number of records between restart points.
    pub fn set_restart_interval(&mut self, interval: usize) -> Result<()> {
        if interval == 0 {
            return Err(Error::invalid_argument("restart interval must be > 0"));
        }
        self.restart_interval = interval;
        Ok(())
    }

    /// Type of the block being written.
    pub fn block_type(&self) -> BlockType {
        // The type byte is only ever written from a BlockType.
        BlockType::from_u8(self.buf[self.header_off]).unwrap_or(BlockType::Ref)
    }

    /// Add a record to the block.
    ///
    /// Returns `Ok(false)` if the record does not fit; the writer is left
    /// untouched and the caller should finish this block and retry in a new
    /// one. Errors are reserved for records that can never be encoded.
    pub fn add(&mut self, rec: &Record) -> Result<bool> {
        if self.finished {
            return Err(Error::invalid_argument("block already finished"));
        }
        if rec.block_type() != self.block_type() {
            return Err(Error::invalid_argument(format!(
                "{:?} record added to {:?} block",
                rec.block_type(),
                self.block_type()
            )));
        }

        let restart = self.entries % self.restart_interval == 0;
        let prev_key: &[u8] = if restart { &[] } else { &self.last_key };
        let key = rec.key();

        let out = &mut self.buf[self.next..];
        let key_len = match encode_key(out, prev_key, &key, rec.value_type()) {
            Some(n) => n,
            None => return Ok(false),
        };
        let value_len = match rec.encode(&mut out[key_len..], self.hash_size)? {
            Some(n) => n,
            None => return Ok(false),
        };

        Ok(self.register_restart(key_len + value_len, restart, &key))
    }

    fn register_restart(&mut self, n: usize, mut restart: bool, key: &[u8]) -> bool {
        if restart && self.restarts.len() >= MAX_RESTARTS {
            log::warn!(
                "restart table full at {} entries, writing record {} without restart",
                MAX_RESTARTS,
                self.entries
            );
            restart = false;
        }

        let restart_count = self.restarts.len() + usize::from(restart);
        if 2 + 3 * restart_count + n > self.buf.len() - self.next {
            return false;
        }

        if restart {
            if self.restarts.len() == self.restarts.capacity() {
                self.restarts.reserve_exact(self.restarts.capacity() + 1);
            }
            self.restarts.push(self.next as u32);
        }

        self.next += n;
        self.last_key.clear();
        self.last_key.extend_from_slice(key);
        self.entries += 1;
        true
    }

    /// Write the restart table and the block length, compressing log blocks.
    ///
    /// Returns the number of bytes of the buffer in use, including the
    /// reserved header region. For log blocks this is the compressed size,
    /// which may exceed the capacity but never [`log_block_limit`].
    pub fn finish(&mut self) -> Result<usize> {
        if self.finished {
            return Err(Error::invalid_argument("block already finished"));
        }

        for &restart in &self.restarts {
            put_u24(&mut self.buf[self.next..], restart);
            self.next += 3;
        }
        put_u16(&mut self.buf[self.next..], self.restarts.len() as u16);
        self.next += 2;
        put_u24(&mut self.buf[self.header_off + 1..], self.next as u32);
        self.finished = true;

        if self.block_type().is_compressed() {
            let skip = self.header_off + BLOCK_HEADER_SIZE;
            let compressed = compress(&self.buf[skip..self.next])?;
            let limit = log_block_limit(self.capacity);
            if skip + compressed.len() > limit {
                return Err(Error::compression(format!(
                    "compressed log block of {} bytes exceeds its {}-byte limit",
                    skip + compressed.len(),
                    limit
                )));
            }
            log::trace!(
                "compressed log block: {} -> {} bytes",
                self.next - skip,
                compressed.len()
            );
            self.buf.truncate(skip);
            self.buf.extend_from_slice(&compressed);
            self.next = self.buf.len();
        }

        log::trace!(
            "finished {:?} block: {} entries, {} restarts, {} bytes",
            self.block_type(),
            self.entries,
            self.restarts.len(),
            self.next
        );
        Ok(self.next)
    }

    /// Prepare for the next block, keeping the buffer and the restart
    /// table's allocation.
    pub fn reset(&mut self) {
        let block_type = self.buf[self.header_off];
        self.buf.resize(self.capacity, 0);
        self.buf.fill(0);
        self.buf[self.header_off] = block_type;
        self.next = self.header_off + BLOCK_HEADER_SIZE;
        self.restarts.clear();
        self.last_key.clear();
        self.entries = 0;
        self.finished = false;
    }

    /// The block written so far, including the reserved header region.
    pub fn data(&self) -> &[u8] {
        &self.buf[..self.next]
    }

    /// Take the output buffer, leaving the writer empty.
    pub fn into_buffer(self) -> Vec<u8> {
        self.buf
    }

    /// Number of records added.
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Number of restart points registered.
    pub fn restart_count(&self) -> usize {
        self.restarts.len()
    }

    /// Offset of the reserved header region's end.
    pub fn header_off(&self) -> usize {
        self.header_off
    }

    /// Check if the block is empty
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coding::{get_u16, get_u24};
    use crate::record::{LogRecord, LogUpdate, RefRecord};

    fn ref_rec(name: &str) -> Record {
        RefRecord::new(name, 1, vec![0xab; 20]).into()
    }

    #[test]
    fn test_block_writer_empty() {
        let mut bw = BlockWriter::new(BlockType::Ref, 256, 0, 20).unwrap();
        assert!(bw.is_empty());
        let n = bw.finish().unwrap();
        // header + restart count
        assert_eq!(n, 6);
        assert_eq!(get_u24(&bw.data()[1..]), 6);
        assert_eq!(get_u16(&bw.data()[4..]), 0);
    }

    #[test]
    fn test_restart_every_interval() {
        let mut bw = BlockWriter::new(BlockType::Ref, 4096, 0, 20).unwrap();
        bw.set_restart_interval(4).unwrap();
        for i in 0..10 {
            assert!(bw.add(&ref_rec(&format!("refs/heads/branch-{:02}", i))).unwrap());
        }
        assert_eq!(bw.entries(), 10);
        assert_eq!(bw.restart_count(), 3);

        let n = bw.finish().unwrap();
        let data = bw.data();
        assert_eq!(get_u16(&data[n - 2..]), 3);
        // The first restart is the first record, right after the header.
        assert_eq!(get_u24(&data[n - 2 - 9..]), 4);
    }

    #[test]
    fn test_does_not_fit_leaves_writer_untouched() {
        let mut bw = BlockWriter::new(BlockType::Ref, 64, 0, 20).unwrap();
        assert!(bw.add(&ref_rec("refs/heads/a")).unwrap());
        let before = bw.data().to_vec();

        assert!(!bw.add(&ref_rec("refs/heads/b")).unwrap());
        assert_eq!(bw.entries(), 1);
        assert_eq!(bw.data(), before.as_slice());
    }

    #[test]
    fn test_header_offset_reserved() {
        let mut bw = BlockWriter::new(BlockType::Ref, 256, 24, 20).unwrap();
        assert!(bw.add(&ref_rec("HEAD")).unwrap());
        let n = bw.finish().unwrap();
        let data = bw.data();
        assert!(data[..24].iter().all(|&b| b == 0));
        assert_eq!(data[24], b'r');
        assert_eq!(get_u24(&data[25..]) as usize, n);
        // Restart offsets are relative to the buffer, not the block header.
        assert_eq!(get_u24(&data[n - 5..]), 28);
    }

    #[test]
    fn test_wrong_record_type() {
        let mut bw = BlockWriter::new(BlockType::Ref, 256, 0, 20).unwrap();
        let log: Record = LogRecord::update("refs/heads/main", 1, LogUpdate::default()).into();
        assert!(matches!(bw.add(&log), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_log_block_is_compressed() {
        let mut bw = BlockWriter::new(BlockType::Log, 4096, 0, 20).unwrap();
        for i in 0..20u64 {
            let update = LogUpdate {
                name: "A U Thor".into(),
                email: "author@example.com".into(),
                message: "commit: the same message every time".into(),
                time: 1_700_000_000 + i,
                ..Default::default()
            };
            let rec: Record = LogRecord::update("refs/heads/main", 100 - i, update).into();
            assert!(bw.add(&rec).unwrap());
        }
        let n = bw.finish().unwrap();
        let declared = get_u24(&bw.data()[1..]) as usize;
        assert!(n < declared, "compressed {} vs raw {}", n, declared);
    }

    #[test]
    fn test_reset_reuses_writer() {
        let mut bw = BlockWriter::new(BlockType::Ref, 256, 0, 20).unwrap();
        assert!(bw.add(&ref_rec("refs/heads/a")).unwrap());
        bw.finish().unwrap();
        assert!(bw.add(&ref_rec("refs/heads/b")).is_err());

        bw.reset();
        assert!(bw.is_empty());
        assert_eq!(bw.restart_count(), 0);
        assert!(bw.add(&ref_rec("refs/heads/b")).unwrap());
        assert_eq!(bw.restart_count(), 1);
    }

    #[test]
    fn test_rejects_bad_buffers() {
        let err = BlockWriter::new(BlockType::Ref, 8, 4, 20).err().unwrap();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let oversize = vec![0u8; MAX_BLOCK_SIZE as usize + 1];
        let err = BlockWriter::with_buffer(BlockType::Ref, oversize, 0, 20).err().unwrap();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let mut bw = BlockWriter::new(BlockType::Ref, 256, 0, 20).unwrap();
        assert!(matches!(bw.set_restart_interval(0), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_incompressible_log_block_stays_within_limit() {
        let mut bw = BlockWriter::new(BlockType::Log, 128, 0, 20).unwrap();
        // Distinct pseudo-random hashes leave deflate nothing to work with.
        let mut state = 0x9e37_79b9_7f4a_7c15u64;
        let mut noise = || {
            (0..20)
                .map(|_| {
                    state ^= state << 13;
                    state ^= state >> 7;
                    state ^= state << 17;
                    state as u8
                })
                .collect::<Vec<u8>>()
        };
        let mut ui = 100;
        loop {
            let update = LogUpdate {
                old_hash: noise(),
                new_hash: noise(),
                ..Default::default()
            };
            if !bw.add(&LogRecord::update("HEAD", ui, update).into()).unwrap() {
                break;
            }
            ui -= 1;
        }
        assert!(bw.entries() > 0);

        let declared = {
            let n = bw.finish().unwrap();
            assert!(n <= log_block_limit(128));
            get_u24(&bw.data()[1..]) as usize
        };
        assert!(declared <= 128);

        bw.reset();
        assert_eq!(bw.data().len(), BLOCK_HEADER_SIZE);
        assert!(bw.add(&log_rec()).unwrap());
    }

    fn log_rec() -> Record {
        LogRecord::update("HEAD", 1, LogUpdate::default()).into()
    }
}
