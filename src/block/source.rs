//! Block sources supply the raw bytes behind blocks.
//!
//! A [`Block`] taken from a source is handed back to it exactly once, when
//! the block is dropped. Blocks built from a buffer the reader allocated
//! itself (inflated log blocks) have no source and are simply freed.

use crate::error::Result;
use bytes::Bytes;
use parking_lot::Mutex;
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

/// Random-access byte storage backing a table.
///
/// Implementations may cache; `read_block` must tolerate repeated and
/// overlapping reads. Sources are shared between independent readers, so
/// they must be `Send + Sync`.
pub trait BlockSource: Send + Sync {
    /// Total size in bytes.
    fn size(&self) -> u64;

    /// Returns up to `size` bytes starting at `offset`. Reads running past
    /// the end are clamped; a read starting at or past the end fails.
    fn read_block(&self, offset: u64, size: usize) -> Result<Bytes>;

    /// Takes back a buffer previously returned by `read_block`.
    fn return_block(&self, _data: Bytes) {}

    /// Releases the underlying storage. Later reads fail.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Bytes of one block, owned exclusively until dropped.
pub struct Block {
    data: Bytes,
    source: Option<Arc<dyn BlockSource>>,
}

impl Block {
    /// Reads a block from `source`.
    pub fn read(source: &Arc<dyn BlockSource>, offset: u64, size: usize) -> Result<Self> {
        let data = source.read_block(offset, size)?;
        Ok(Self {
            data,
            source: Some(Arc::clone(source)),
        })
    }

    /// Wraps a buffer that belongs to no source.
    pub fn from_owned(data: Vec<u8>) -> Self {
        Self {
            data: Bytes::from(data),
            source: None,
        }
    }

    /// The block bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the block holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        if let Some(source) = self.source.take() {
            source.return_block(std::mem::take(&mut self.data));
        }
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("len", &self.data.len())
            .field("owned", &self.source.is_none())
            .finish()
    }
}

fn clamp(total: u64, offset: u64, size: usize) -> Result<usize> {
    if offset >= total {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("read at offset {} past end of {}-byte source", offset, total),
        )
        .into());
    }
    Ok(size.min((total - offset) as usize))
}

/// A source over an in-memory buffer. Reads are zero-copy slices.
#[derive(Debug, Clone)]
pub struct MemoryBlockSource {
    data: Bytes,
}

impl MemoryBlockSource {
    /// Create a source over `data`.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

impl BlockSource for MemoryBlockSource {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_block(&self, offset: u64, size: usize) -> Result<Bytes> {
        let len = clamp(self.size(), offset, size)?;
        let start = offset as usize;
        Ok(self.data.slice(start..start + len))
    }
}

/// A source over a file on local disk.
#[derive(Debug)]
pub struct FileBlockSource {
    file: Mutex<Option<File>>,
    size: u64,
}

impl FileBlockSource {
    /// Open `path` for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            file: Mutex::new(Some(file)),
            size,
        })
    }
}

impl BlockSource for FileBlockSource {
    fn size(&self) -> u64 {
        self.size
    }

    fn read_block(&self, offset: u64, size: usize) -> Result<Bytes> {
        let len = clamp(self.size, offset, size)?;
        let mut guard = self.file.lock();
        let file = guard
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "block source is closed"))?;

        let mut buf = vec![0u8; len];
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf)?;
        Ok(Bytes::from(buf))
    }

    fn close(&self) -> Result<()> {
        self.file.lock().take();
        Ok(())
    }
}
