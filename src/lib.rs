//! # reftable - Block Engine and Merged Iteration for Reference Tables
//!
//! A reftable stores references (name to object id) and their logs in a
//! sorted, immutable file made of fixed-size blocks. Many such tables can be
//! stacked and read as one, newer tables shadowing older ones.
//!
//! ## Architecture
//!
//! - **Records**: ref, log, object and index records with prefix-compressed keys
//! - **Blocks**: prefix-compressed, binary-searchable runs of records with a
//!   restart table; log blocks are zlib-compressed
//! - **Tables**: a file header followed by ref blocks, then log blocks
//! - **Merged tables**: a priority-queue merge over a stack of tables
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use reftable::{
//!     read_ref, MemoryBlockSource, MergedTable, Reader, RefRecord, Table, TableWriter,
//!     WriteOptions,
//! };
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), reftable::Error> {
//! let mut buf = Vec::new();
//! let opts = WriteOptions::default().update_index_range(1, 1);
//! let mut writer = TableWriter::new(&mut buf, opts)?;
//! writer.add_ref(&RefRecord::new("refs/heads/main", 1, vec![0x11; 20]))?;
//! writer.finish()?;
//!
//! let reader: Arc<dyn Table> = Arc::new(Reader::new(Arc::new(MemoryBlockSource::new(buf)))?);
//! let merged = MergedTable::new(vec![reader], reftable::HashId::Sha1)?;
//!
//! if let Some(r) = read_ref(&merged, "refs/heads/main")? {
//!     println!("{} at {}", r.ref_name, r.update_index);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Module declarations
pub mod block;
pub mod coding;
pub mod config;
pub mod error;
pub mod iterator;
pub mod merged;
pub mod record;
pub mod table;

// Re-exports
pub use block::{
    Block, BlockIter, BlockReader, BlockSource, BlockType, BlockWriter, FileBlockSource,
    MemoryBlockSource,
};
pub use config::{HashId, WriteOptions};
pub use error::{Error, Result};
pub use iterator::{EmptyIterator, RecordIterator};
pub use merged::{MergedIter, MergedTable};
pub use record::{IndexRecord, LogRecord, LogUpdate, LogValue, ObjRecord, Record, RefRecord, RefValue};
pub use table::{read_log_at, read_ref, Reader, Table, TableWriter, WriterStats};
