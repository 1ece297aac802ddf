//! Block format implementation.
//!
//! A block holds prefix-compressed records followed by a restart table:
//!
//! ```text
//! [file header: header_off bytes]   // only in the first block of a table
//! [type: u8][block_len: u24]         // block_len counts from the start of the buffer
//! [Record 1]
//! ...
//! [Record N]
//! [Restart 1: u24]                   // buffer offset of a record with a full key
//! ...
//! [Restart M: u24]
//! [Num Restarts: u16]
//! ```
//!
//! Everything after the 4-byte block header of a log block is zlib
//! compressed on disk. The length field still records the uncompressed
//! size; the compressed size is learned by inflating. A log block of
//! incompressible records can end slightly past the block size.

pub mod compress;
pub mod reader;
pub mod source;
pub mod writer;

pub use reader::{BlockIter, BlockReader};
pub use source::{Block, BlockSource, FileBlockSource, MemoryBlockSource};
pub use writer::BlockWriter;

/// Size of the block header: one type byte plus a 3-byte length.
pub const BLOCK_HEADER_SIZE: usize = 4;

/// The restart count is a u16.
pub const MAX_RESTARTS: usize = u16::MAX as usize;

/// Largest number of bytes a log block written into a `block_size` buffer
/// occupies on disk.
///
/// Log blocks are not padded, and deflate can grow a payload that does not
/// compress by a few bytes, so a full log block may run past `block_size`.
/// Readers fetch this many bytes for every block.
pub fn log_block_limit(block_size: usize) -> usize {
    block_size + block_size / 16 + 64
}

/// Kind of records a block holds, stored as the first header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BlockType {
    /// Ref records.
    Ref = b'r',
    /// Reflog records; the only compressed block type.
    Log = b'g',
    /// Object-id to block offset records.
    Obj = b'o',
    /// Index records.
    Index = b'i',
}

impl BlockType {
    /// Convert from the header byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            b'r' => Some(BlockType::Ref),
            b'g' => Some(BlockType::Log),
            b'o' => Some(BlockType::Obj),
            b'i' => Some(BlockType::Index),
            _ => None,
        }
    }

    /// Whether the payload of this block type is deflated.
    pub fn is_compressed(self) -> bool {
        self == BlockType::Log
    }
}
