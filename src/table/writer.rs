//! Table writer implementation.
//!
//! Builds a table from refs and log entries supplied in key order.

use crate::block::{BlockType, BlockWriter};
use crate::config::WriteOptions;
use crate::error::{Error, Result};
use crate::record::{LogRecord, Record, RefRecord};
use crate::table::FileHeader;
use std::io::Write;

/// Counters for one block type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockStats {
    /// Blocks written.
    pub blocks: usize,
    /// Records written.
    pub entries: usize,
    /// Restart points written.
    pub restarts: usize,
}

/// Summary of a finished table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Ref block counters.
    pub refs: BlockStats,
    /// Log block counters.
    pub logs: BlockStats,
    /// Total bytes written, header and padding included.
    pub bytes_written: u64,
}

/// TableWriter builds one table.
///
/// Usage:
/// ```no_run
/// use reftable::{RefRecord, TableWriter, WriteOptions};
///
/// let mut buf = Vec::new();
/// let opts = WriteOptions::default().update_index_range(1, 1);
/// let mut writer = TableWriter::new(&mut buf, opts).unwrap();
/// writer.add_ref(&RefRecord::new("refs/heads/main", 1, vec![0x11; 20])).unwrap();
/// writer.finish().unwrap();
/// ```
pub struct TableWriter<W: Write> {
    out: W,
    opts: WriteOptions,
    header: FileHeader,
    block_writer: Option<BlockWriter>,
    last_key: Vec<u8>,
    last_type: Option<BlockType>,
    offset: u64,
    stats: WriterStats,
}

impl<W: Write> TableWriter<W> {
    /// Create a writer emitting to `out`.
    pub fn new(out: W, opts: WriteOptions) -> Result<Self> {
        opts.validate()?;
        let header = FileHeader::new(
            opts.block_size,
            opts.min_update_index,
            opts.max_update_index,
            opts.hash_id,
        );

        Ok(Self {
            out,
            opts,
            header,
            block_writer: None,
            last_key: Vec::new(),
            last_type: None,
            offset: 0,
            stats: WriterStats::default(),
        })
    }

    /// Add a ref. Refs must be added in strictly ascending name order and
    /// before any log entry.
    pub fn add_ref(&mut self, rec: &RefRecord) -> Result<()> {
        self.check_update_index(rec.update_index)?;
        // Ref update indexes are stored relative to the table's minimum.
        let mut stored = rec.clone();
        stored.update_index -= self.opts.min_update_index;
        self.add(&Record::Ref(stored))
    }

    /// Add a log entry. Entries must be added in ascending key order:
    /// by ref name, then newest first.
    pub fn add_log(&mut self, rec: &LogRecord) -> Result<()> {
        self.check_update_index(rec.update_index)?;
        self.add(&Record::Log(rec.clone()))
    }

    fn check_update_index(&self, update_index: u64) -> Result<()> {
        if update_index < self.opts.min_update_index || update_index > self.opts.max_update_index {
            return Err(Error::invalid_argument(format!(
                "update index {} outside [{}, {}]",
                update_index, self.opts.min_update_index, self.opts.max_update_index
            )));
        }
        Ok(())
    }

    fn add(&mut self, rec: &Record) -> Result<()> {
        let typ = rec.block_type();
        let key = rec.key();

        match self.last_type {
            Some(last) if last == typ => {
                if key.as_ref() <= self.last_key.as_slice() {
                    return Err(Error::invalid_argument(format!(
                        "{:?} keys must be added in sorted order",
                        typ
                    )));
                }
            }
            Some(BlockType::Log) if typ == BlockType::Ref => {
                return Err(Error::invalid_argument("refs must be added before logs"));
            }
            _ => {}
        }

        if self.block_writer.as_ref().map(|bw| bw.block_type()) != Some(typ) {
            self.flush_block()?;
            self.start_block(typ)?;
        }

        if !self.current_block()?.add(rec)? {
            self.flush_block()?;
            self.start_block(typ)?;
            if !self.current_block()?.add(rec)? {
                return Err(Error::invalid_argument(format!(
                    "record {} too large for block size {}",
                    String::from_utf8_lossy(&key),
                    self.opts.block_size
                )));
            }
        }

        self.last_key.clear();
        self.last_key.extend_from_slice(&key);
        self.last_type = Some(typ);
        self.stats_for(typ).entries += 1;
        Ok(())
    }

    fn current_block(&mut self) -> Result<&mut BlockWriter> {
        self.block_writer
            .as_mut()
            .ok_or_else(|| Error::invalid_argument("no open block"))
    }

    fn start_block(&mut self, typ: BlockType) -> Result<()> {
        // The first block shares its space with the file header.
        let header_off = if self.offset == 0 {
            self.header.encoded_len()
        } else {
            0
        };
        let mut bw = BlockWriter::new(
            typ,
            self.opts.block_size as usize,
            header_off,
            self.opts.hash_id.size(),
        )?;
        bw.set_restart_interval(self.opts.restart_interval)?;
        self.block_writer = Some(bw);
        Ok(())
    }

    fn flush_block(&mut self) -> Result<()> {
        let mut bw = match self.block_writer.take() {
            Some(bw) if !bw.is_empty() => bw,
            _ => return Ok(()),
        };

        let typ = bw.block_type();
        let header_off = bw.header_off();
        let n = bw.finish()?;

        if header_off > 0 {
            self.out.write_all(&self.header.encode())?;
        }
        self.out.write_all(&bw.data()[header_off..n])?;

        let mut written = n;
        if typ != BlockType::Log {
            let padding = self.opts.block_size as usize - n;
            self.out.write_all(&vec![0u8; padding])?;
            written += padding;
        }

        log::debug!(
            "flushed {:?} block at offset {}: {} entries, {} bytes",
            typ,
            self.offset,
            bw.entries(),
            written
        );

        let restarts = bw.restart_count();
        let stats = self.stats_for(typ);
        stats.blocks += 1;
        stats.restarts += restarts;
        self.offset += written as u64;
        Ok(())
    }

    fn stats_for(&mut self, typ: BlockType) -> &mut BlockStats {
        match typ {
            BlockType::Log => &mut self.stats.logs,
            _ => &mut self.stats.refs,
        }
    }

    /// Flush the last block and return the table's statistics. A table
    /// without records consists of the file header alone.
    pub fn finish(mut self) -> Result<WriterStats> {
        self.flush_block()?;
        if self.offset == 0 {
            let header = self.header.encode();
            self.out.write_all(&header)?;
            self.offset = header.len() as u64;
        }
        self.out.flush()?;

        self.stats.bytes_written = self.offset;
        log::debug!(
            "finished table: {} ref blocks, {} log blocks, {} bytes",
            self.stats.refs.blocks,
            self.stats.logs.blocks,
            self.offset
        );
        Ok(self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HashId;
    use crate::record::LogUpdate;
    use crate::table::{HEADER_V1_LEN, HEADER_V2_LEN};

    fn opts(block_size: u32) -> WriteOptions {
        WriteOptions::default()
            .block_size(block_size)
            .update_index_range(1, 10)
    }

    #[test]
    fn test_empty_table_is_header_only() {
        let mut buf = Vec::new();
        let stats = TableWriter::new(&mut buf, opts(256)).unwrap().finish().unwrap();
        assert_eq!(buf.len(), HEADER_V1_LEN);
        assert_eq!(stats.bytes_written, HEADER_V1_LEN as u64);
        assert_eq!(&buf[..4], b"REFT");
    }

    #[test]
    fn test_ref_blocks_are_padded() {
        let mut buf = Vec::new();
        let mut w = TableWriter::new(&mut buf, opts(256)).unwrap();
        for i in 0..40 {
            let rec = RefRecord::new(format!("refs/heads/b{:03}", i), 5, vec![i as u8; 20]);
            w.add_ref(&rec).unwrap();
        }
        let stats = w.finish().unwrap();

        assert!(stats.refs.blocks > 1);
        assert_eq!(stats.refs.entries, 40);
        assert_eq!(buf.len(), 256 * stats.refs.blocks);
        // First block type byte sits right after the file header.
        assert_eq!(buf[HEADER_V1_LEN], b'r');
        assert_eq!(buf[256], b'r');
    }

    #[test]
    fn test_sha256_uses_v2_header() {
        let mut buf = Vec::new();
        let opts = opts(512).hash_id(HashId::Sha256);
        let mut w = TableWriter::new(&mut buf, opts).unwrap();
        w.add_ref(&RefRecord::new("HEAD", 1, vec![1; 32])).unwrap();
        w.finish().unwrap();
        assert_eq!(buf[4], 2);
        assert_eq!(buf[HEADER_V2_LEN], b'r');
    }

    #[test]
    fn test_rejects_unsorted_refs() {
        let mut buf = Vec::new();
        let mut w = TableWriter::new(&mut buf, opts(256)).unwrap();
        w.add_ref(&RefRecord::new("refs/heads/b", 1, vec![0; 20])).unwrap();
        let err = w.add_ref(&RefRecord::new("refs/heads/a", 1, vec![0; 20])).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        let err = w.add_ref(&RefRecord::new("refs/heads/b", 1, vec![0; 20])).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_rejects_update_index_out_of_range() {
        let mut buf = Vec::new();
        let mut w = TableWriter::new(&mut buf, opts(256)).unwrap();
        let err = w.add_ref(&RefRecord::new("refs/heads/a", 11, vec![0; 20])).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_rejects_ref_after_log() {
        let mut buf = Vec::new();
        let mut w = TableWriter::new(&mut buf, opts(1024)).unwrap();
        w.add_log(&LogRecord::update("refs/heads/a", 2, LogUpdate::default())).unwrap();
        let err = w.add_ref(&RefRecord::new("refs/heads/b", 2, vec![0; 20])).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_record_too_large() {
        let mut buf = Vec::new();
        let mut w = TableWriter::new(&mut buf, opts(64)).unwrap();
        let rec = RefRecord::symref("HEAD", 1, "refs/heads/".repeat(10));
        let err = w.add_ref(&rec).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_log_blocks_are_not_padded() {
        let mut buf = Vec::new();
        let mut w = TableWriter::new(&mut buf, opts(1024)).unwrap();
        w.add_ref(&RefRecord::new("refs/heads/main", 3, vec![3; 20])).unwrap();
        for ui in (1..=3).rev() {
            let update = LogUpdate {
                new_hash: vec![ui as u8; 20],
                message: "commit".into(),
                ..Default::default()
            };
            w.add_log(&LogRecord::update("refs/heads/main", ui, update)).unwrap();
        }
        let stats = w.finish().unwrap();

        assert_eq!(stats.refs.blocks, 1);
        assert_eq!(stats.logs.blocks, 1);
        assert_eq!(stats.logs.entries, 3);
        assert!(buf.len() > 1024 && buf.len() < 2048);
        assert_eq!(buf[1024], b'g');
    }
}
