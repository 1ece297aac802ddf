//! Block reader and iterator.

use crate::block::compress::decompress_into;
use crate::block::source::Block;
use crate::block::{BlockType, BLOCK_HEADER_SIZE};
use crate::coding::{binsearch, ensure_len, get_u16, get_u24};
use crate::error::{Error, Result};
use crate::iterator::RecordIterator;
use crate::record::{decode_key, Record};
use std::sync::Arc;

/// A parsed block.
///
/// Holds the block bytes (inflated, for log blocks) and the location of the
/// restart table. Iterators share the reader through an `Arc`, so a reader
/// outlives every iterator created from it.
#[derive(Debug)]
pub struct BlockReader {
    block: Block,
    header_off: usize,
    block_type: BlockType,
    /// End of the record area; the restart table starts here.
    restart_off: usize,
    restart_count: usize,
    full_block_size: usize,
    hash_size: usize,
}

impl BlockReader {
    /// Parse the block at the start of `block`.
    ///
    /// `header_off` is the size of the file header preceding the block
    /// header (non-zero only for the first block of a table).
    /// `table_block_size` is the table's padded block size, or 0 if unknown.
    pub fn new(
        block: Block,
        header_off: usize,
        table_block_size: usize,
        hash_size: usize,
    ) -> Result<Self> {
        let skip = header_off + BLOCK_HEADER_SIZE;
        ensure_len(block.data(), skip, "block header")?;

        let data = block.data();
        let block_type = BlockType::from_u8(data[header_off]).ok_or_else(|| {
            Error::format(format!("unknown block type 0x{:02x}", data[header_off]))
        })?;
        let sz = get_u24(&data[header_off + 1..]) as usize;
        if sz < skip + 2 {
            return Err(Error::format(format!("block length {} too small", sz)));
        }

        let (block, full_block_size) = if block_type.is_compressed() {
            let mut inflated = vec![0u8; sz];
            inflated[..skip].copy_from_slice(&data[..skip]);
            let consumed = decompress_into(&data[skip..], &mut inflated[skip..])?;
            // Dropping the on-disk block hands it back to its source.
            (Block::from_owned(inflated), skip + consumed)
        } else {
            if sz > data.len() {
                return Err(Error::format(format!(
                    "block length {} exceeds the {} bytes read",
                    sz,
                    data.len()
                )));
            }
            let full = if table_block_size == 0 {
                sz
            } else if sz < table_block_size && sz < data.len() && data[sz] != 0 {
                // Unpadded table: the next block starts right away.
                sz
            } else {
                table_block_size
            };
            (block, full)
        };

        let data = &block.data()[..sz];
        let restart_count = usize::from(get_u16(&data[sz - 2..]));
        let table_len = 2 + 3 * restart_count;
        if table_len > sz - skip {
            return Err(Error::format(format!(
                "restart table of {} entries does not fit a {}-byte block",
                restart_count, sz
            )));
        }

        Ok(Self {
            block,
            header_off,
            block_type,
            restart_off: sz - table_len,
            restart_count,
            full_block_size,
            hash_size,
        })
    }

    /// Type of records in this block.
    pub fn block_type(&self) -> BlockType {
        self.block_type
    }

    /// Size of the file header preceding the block header.
    pub fn header_off(&self) -> usize {
        self.header_off
    }

    /// Bytes this block occupies in the table: the padded block size, or
    /// the compressed size for log blocks.
    pub fn full_block_size(&self) -> usize {
        self.full_block_size
    }

    /// Number of restart points.
    pub fn restart_count(&self) -> usize {
        self.restart_count
    }

    /// End of the record area.
    pub fn block_len(&self) -> usize {
        self.restart_off
    }

    /// Buffer offset of the `i`-th restart record.
    pub fn restart_offset(&self, i: usize) -> Result<usize> {
        if i >= self.restart_count {
            return Err(Error::invalid_argument(format!(
                "restart {} out of {}",
                i, self.restart_count
            )));
        }
        let off = get_u24(&self.block.data()[self.restart_off + 3 * i..]) as usize;
        if off < self.records_start() || off >= self.restart_off {
            return Err(Error::format(format!("restart offset {} outside record area", off)));
        }
        Ok(off)
    }

    /// Key of the first record in the block.
    pub fn first_key(&self) -> Result<Vec<u8>> {
        self.key_at(self.records_start())
    }

    /// Iterator positioned at the first record.
    pub fn start(self: &Arc<Self>) -> BlockIter {
        BlockIter {
            next_off: self.records_start(),
            reader: Arc::clone(self),
            last_key: Vec::new(),
        }
    }

    /// Iterator positioned at the first record whose key is `>= want`.
    ///
    /// If every key is smaller, the iterator is exhausted.
    pub fn seek(self: &Arc<Self>, want: &[u8]) -> Result<BlockIter> {
        // First restart whose key sorts after `want`; the one before it is
        // the last restart that can precede the target.
        let i = binsearch(self.restart_count, |i| {
            let key = self.key_at(self.restart_offset(i)?)?;
            Ok(want < key.as_slice())
        })?;

        let mut iter = self.start();
        if i > 0 {
            iter.next_off = self.restart_offset(i - 1)?;
        }

        loop {
            let mut probe = iter.clone();
            match probe.next_record()? {
                Some(rec) if rec.key().as_ref() < want => iter = probe,
                _ => return Ok(iter),
            }
        }
    }

    fn records_start(&self) -> usize {
        self.header_off + BLOCK_HEADER_SIZE
    }

    /// Decodes the full key of the record at `off`, which must not be
    /// prefix-compressed.
    fn key_at(&self, off: usize) -> Result<Vec<u8>> {
        if off >= self.restart_off {
            return Err(Error::format("block has no records"));
        }
        let (key, _, _) = decode_key(&self.block.data()[off..self.restart_off], &[])?;
        Ok(key)
    }
}

/// Cursor over the records of one block.
///
/// Cloning is cheap and yields an independent cursor at the same position.
#[derive(Debug, Clone)]
pub struct BlockIter {
    reader: Arc<BlockReader>,
    next_off: usize,
    last_key: Vec<u8>,
}

impl BlockIter {
    /// The block being iterated.
    pub fn reader(&self) -> &Arc<BlockReader> {
        &self.reader
    }

    /// Whether every record has been returned.
    pub fn is_exhausted(&self) -> bool {
        self.next_off >= self.reader.restart_off
    }
}

impl RecordIterator for BlockIter {
    fn next_record(&mut self) -> Result<Option<Record>> {
        let reader = &*self.reader;
        if self.next_off >= reader.restart_off {
            return Ok(None);
        }

        let data = &reader.block.data()[self.next_off..reader.restart_off];
        let (key, value_type, key_len) = decode_key(data, &self.last_key)?;
        let (rec, value_len) = Record::decode(
            reader.block_type,
            &key,
            value_type,
            &data[key_len..],
            reader.hash_size,
        )?;

        self.next_off += key_len + value_len;
        self.last_key = key;
        Ok(Some(rec))
    }
}
