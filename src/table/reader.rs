//! Table reader implementation.

use crate::block::{
    log_block_limit, Block, BlockIter, BlockReader, BlockSource, BlockType, FileBlockSource,
};
use crate::config::HashId;
use crate::error::{Error, Result};
use crate::iterator::RecordIterator;
use crate::record::Record;
use crate::table::{FileHeader, Table, HEADER_V1_LEN, HEADER_V2_LEN};
use std::path::Path;
use std::sync::Arc;

/// Location and first key of one block.
#[derive(Debug, Clone)]
struct BlockMeta {
    offset: u64,
    header_off: usize,
    block_type: BlockType,
    first_key: Vec<u8>,
}

/// Reader over one table.
///
/// Opening a table walks its blocks once and keeps the first key of each in
/// memory; seeks then read only the blocks they touch.
pub struct Reader {
    source: Arc<dyn BlockSource>,
    header: FileHeader,
    blocks: Vec<BlockMeta>,
    size: u64,
}

impl std::fmt::Debug for Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("header", &self.header)
            .field("blocks", &self.blocks)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl Reader {
    /// Open a table stored in a local file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(Arc::new(FileBlockSource::open(path)?))
    }

    /// Open a table backed by `source`.
    pub fn new(source: Arc<dyn BlockSource>) -> Result<Self> {
        let size = source.size();
        if size < HEADER_V1_LEN as u64 {
            return Err(Error::format(format!("table of {} bytes has no header", size)));
        }

        let header = {
            let block = Block::read(&source, 0, HEADER_V2_LEN)?;
            FileHeader::decode(block.data())?
        };
        let block_size = header.block_size as usize;
        let read_size = log_block_limit(block_size);
        let hash_size = header.hash_id.size();

        let mut blocks = Vec::new();
        let mut offset = 0u64;
        let mut header_off = header.encoded_len();
        while offset + (header_off as u64) < size {
            let block = Block::read(&source, offset, read_size)?;
            let reader = BlockReader::new(block, header_off, block_size, hash_size)?;
            blocks.push(BlockMeta {
                offset,
                header_off,
                block_type: reader.block_type(),
                first_key: reader.first_key()?,
            });

            offset += reader.full_block_size() as u64;
            header_off = 0;
        }

        log::debug!(
            "opened table: {} blocks, {:?}, update index {}..={}",
            blocks.len(),
            header.hash_id,
            header.min_update_index,
            header.max_update_index
        );

        Ok(Self {
            source,
            header,
            blocks,
            size,
        })
    }

    /// The parsed file header.
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Number of blocks in the table.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Size of the table in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Iterator over records of `rec`'s kind starting at the first key
    /// `>= rec.key()`.
    pub fn seek(&self, rec: &Record) -> Result<TableIter<'_>> {
        let typ = rec.block_type();
        let want = rec.key();

        let of_type: Vec<usize> = (0..self.blocks.len())
            .filter(|&i| self.blocks[i].block_type == typ)
            .collect();
        if of_type.is_empty() {
            return Ok(TableIter::exhausted(self, typ));
        }

        // Last block whose first key is <= want; if want sorts before every
        // block, start at the first one.
        let pos = of_type.partition_point(|&i| self.blocks[i].first_key.as_slice() <= want.as_ref());
        let idx = of_type[pos.saturating_sub(1)];

        let reader = Arc::new(self.block_reader(idx)?);
        let iter = reader.seek(&want)?;
        Ok(TableIter {
            table: self,
            block_type: typ,
            current: Some(iter),
            next_block: idx + 1,
        })
    }

    fn block_reader(&self, idx: usize) -> Result<BlockReader> {
        let meta = &self.blocks[idx];
        let read_size = log_block_limit(self.header.block_size as usize);
        let block = Block::read(&self.source, meta.offset, read_size)?;
        BlockReader::new(
            block,
            meta.header_off,
            self.header.block_size as usize,
            self.header.hash_id.size(),
        )
    }
}

impl Table for Reader {
    fn seek_record(&self, rec: &Record) -> Result<Box<dyn RecordIterator + '_>> {
        Ok(Box::new(self.seek(rec)?))
    }

    fn hash_id(&self) -> HashId {
        self.header.hash_id
    }

    fn min_update_index(&self) -> u64 {
        self.header.min_update_index
    }

    fn max_update_index(&self) -> u64 {
        self.header.max_update_index
    }
}

/// Iterator over the records of one type in a table, crossing block
/// boundaries as needed.
pub struct TableIter<'a> {
    table: &'a Reader,
    block_type: BlockType,
    current: Option<BlockIter>,
    next_block: usize,
}

impl<'a> TableIter<'a> {
    fn exhausted(table: &'a Reader, block_type: BlockType) -> Self {
        Self {
            table,
            block_type,
            current: None,
            next_block: table.blocks.len(),
        }
    }

    fn advance_block(&mut self) -> Result<bool> {
        let blocks = &self.table.blocks;
        if self.next_block >= blocks.len() || blocks[self.next_block].block_type != self.block_type {
            self.current = None;
            return Ok(false);
        }

        let reader = Arc::new(self.table.block_reader(self.next_block)?);
        self.current = Some(reader.start());
        self.next_block += 1;
        Ok(true)
    }
}

impl RecordIterator for TableIter<'_> {
    fn next_record(&mut self) -> Result<Option<Record>> {
        loop {
            if let Some(iter) = self.current.as_mut() {
                if let Some(mut rec) = iter.next_record()? {
                    if let Record::Ref(r) = &mut rec {
                        r.update_index += self.table.header.min_update_index;
                    }
                    return Ok(Some(rec));
                }
            }
            if !self.advance_block()? {
                return Ok(None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::MemoryBlockSource;
    use crate::config::WriteOptions;
    use crate::record::{LogRecord, LogUpdate, RefRecord};
    use crate::table::{read_log_at, read_ref, TableWriter};

    fn build(refs: &[RefRecord], logs: &[LogRecord], opts: WriteOptions) -> Reader {
        let mut buf = Vec::new();
        let mut w = TableWriter::new(&mut buf, opts).unwrap();
        for r in refs {
            w.add_ref(r).unwrap();
        }
        for l in logs {
            w.add_log(l).unwrap();
        }
        w.finish().unwrap();
        Reader::new(Arc::new(MemoryBlockSource::new(buf))).unwrap()
    }

    fn many_refs(n: usize, update_index: u64) -> Vec<RefRecord> {
        (0..n)
            .map(|i| RefRecord::new(format!("refs/heads/topic-{:04}", i), update_index, vec![i as u8; 20]))
            .collect()
    }

    #[test]
    fn test_empty_table() {
        let reader = build(&[], &[], WriteOptions::default());
        assert_eq!(reader.block_count(), 0);
        let mut it = reader.seek_ref("refs/heads/main").unwrap();
        assert!(it.next_record().unwrap().is_none());
    }

    #[test]
    fn test_scan_across_blocks() {
        let refs = many_refs(200, 7);
        let opts = WriteOptions::default().block_size(256).update_index_range(5, 9);
        let reader = build(&refs, &[], opts);
        assert!(reader.block_count() > 5);

        let mut it = reader.seek_ref("").unwrap();
        let mut got = Vec::new();
        while let Some(r) = it.next_ref().unwrap() {
            got.push(r);
        }
        assert_eq!(got, refs);
    }

    #[test]
    fn test_seek_every_ref() {
        let refs = many_refs(100, 1);
        let opts = WriteOptions::default()
            .block_size(256)
            .restart_interval(3)
            .update_index_range(1, 1);
        let reader = build(&refs, &[], opts);

        for r in &refs {
            assert_eq!(read_ref(&reader, &r.ref_name).unwrap().as_ref(), Some(r));
        }
        assert!(read_ref(&reader, "refs/heads/topic-0050x").unwrap().is_none());
        assert!(read_ref(&reader, "zzz").unwrap().is_none());
    }

    #[test]
    fn test_deletion_reads_as_absent() {
        let refs = vec![RefRecord::deletion("refs/heads/gone", 2)];
        let reader = build(&refs, &[], WriteOptions::default().update_index_range(2, 2));
        assert!(read_ref(&reader, "refs/heads/gone").unwrap().is_none());

        let mut it = reader.seek_ref("refs/heads/gone").unwrap();
        assert!(it.next_ref().unwrap().unwrap().is_deletion());
    }

    #[test]
    fn test_logs_after_refs() {
        let refs = many_refs(3, 4);
        let logs: Vec<LogRecord> = (1..=4u64)
            .rev()
            .map(|ui| {
                let update = LogUpdate {
                    new_hash: vec![ui as u8; 20],
                    name: "A U Thor".into(),
                    email: "author@example.com".into(),
                    time: 1_600_000_000 + ui,
                    tz_offset: 100,
                    message: format!("move to {}", ui),
                    ..Default::default()
                };
                LogRecord::update("refs/heads/main", ui, update)
            })
            .collect();
        let reader = build(&refs, &logs, WriteOptions::default().update_index_range(1, 4));

        // Newest first.
        let mut it = reader.seek_log("refs/heads/main", u64::MAX).unwrap();
        let first = it.next_log().unwrap().unwrap();
        assert_eq!(first.update_index, 4);

        let entry = read_log_at(&reader, "refs/heads/main", 2).unwrap().unwrap();
        assert_eq!(entry.update_index, 2);
        assert!(read_log_at(&reader, "refs/heads/other", 2).unwrap().is_none());

        // Ref iteration stops at the log blocks.
        let mut it = reader.seek_ref("").unwrap();
        let mut n = 0;
        while it.next_ref().unwrap().is_some() {
            n += 1;
        }
        assert_eq!(n, 3);
    }

    #[test]
    fn test_update_index_delta() {
        let refs = vec![RefRecord::new("refs/heads/main", 1_000_005, vec![9; 20])];
        let opts = WriteOptions::default().update_index_range(1_000_000, 1_000_010);
        let reader = build(&refs, &[], opts);
        assert_eq!(reader.min_update_index(), 1_000_000);
        let r = read_ref(&reader, "refs/heads/main").unwrap().unwrap();
        assert_eq!(r.update_index, 1_000_005);
    }

    #[test]
    fn test_truncated_table() {
        let src = MemoryBlockSource::new(b"REFT\x01".to_vec());
        assert!(Reader::new(Arc::new(src)).unwrap_err().is_format());
    }
}
