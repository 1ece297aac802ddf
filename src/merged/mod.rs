//! Several tables read as one.
//!
//! A [`MergedTable`] stacks tables from oldest to newest. Seeking it seeks
//! every member and merges the results through a priority queue, so a key
//! written in several tables reads as its newest version. Merged tables are
//! themselves [`Table`]s and can be stacked again.

pub mod iter;
pub mod pq;

pub use iter::MergedIter;
pub use pq::{MergedPQueue, PqEntry};

use crate::config::HashId;
use crate::error::{Error, Result};
use crate::iterator::RecordIterator;
use crate::record::Record;
use crate::table::Table;
use std::sync::Arc;

/// A stack of tables, index 0 oldest.
///
/// The merged table shares its members with the caller; dropping it does
/// not close them.
pub struct MergedTable {
    tables: Vec<Arc<dyn Table>>,
    hash_id: HashId,
    min_update_index: u64,
    max_update_index: u64,
}

impl MergedTable {
    /// Stack `tables`, which must all use `hash_id`.
    pub fn new(tables: Vec<Arc<dyn Table>>, hash_id: HashId) -> Result<Self> {
        if let Some((i, t)) = tables.iter().enumerate().find(|(_, t)| t.hash_id() != hash_id) {
            return Err(Error::invalid_argument(format!(
                "table {} uses {:?}, merged table uses {:?}",
                i,
                t.hash_id(),
                hash_id
            )));
        }

        let min_update_index = tables.iter().map(|t| t.min_update_index()).min().unwrap_or(0);
        let max_update_index = tables.iter().map(|t| t.max_update_index()).max().unwrap_or(0);

        log::debug!(
            "merged {} tables, update index {}..={}",
            tables.len(),
            min_update_index,
            max_update_index
        );

        Ok(Self {
            tables,
            hash_id,
            min_update_index,
            max_update_index,
        })
    }

    /// Member tables, oldest first.
    pub fn tables(&self) -> &[Arc<dyn Table>] {
        &self.tables
    }

    /// Merged iterator starting at the first key `>= rec.key()`.
    pub fn seek(&self, rec: &Record) -> Result<MergedIter<'_>> {
        let subs = self
            .tables
            .iter()
            .map(|t| t.seek_record(rec))
            .collect::<Result<Vec<_>>>()?;
        MergedIter::new(subs)
    }
}

impl Table for MergedTable {
    fn seek_record(&self, rec: &Record) -> Result<Box<dyn RecordIterator + '_>> {
        Ok(Box::new(self.seek(rec)?))
    }

    fn hash_id(&self) -> HashId {
        self.hash_id
    }

    fn min_update_index(&self) -> u64 {
        self.min_update_index
    }

    fn max_update_index(&self) -> u64 {
        self.max_update_index
    }
}
