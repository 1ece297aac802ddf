//! Merging iterator over several sub-iterators.

use crate::error::Result;
use crate::iterator::RecordIterator;
use crate::merged::pq::{MergedPQueue, PqEntry};
use crate::record::Record;

/// Merges sub-iterators into one ascending stream with one record per key.
///
/// Sub-iterator `i` is considered newer than every sub-iterator before it;
/// for a key produced by several of them only the newest record is
/// returned. Deletions are returned like any other record.
pub struct MergedIter<'a> {
    subs: Vec<Box<dyn RecordIterator + 'a>>,
    pq: MergedPQueue,
}

impl<'a> MergedIter<'a> {
    /// Prime the merge with the first record of each sub-iterator.
    pub fn new(subs: Vec<Box<dyn RecordIterator + 'a>>) -> Result<Self> {
        let mut iter = Self {
            pq: MergedPQueue::with_capacity(subs.len()),
            subs,
        };
        for i in 0..iter.subs.len() {
            iter.advance(i)?;
        }
        Ok(iter)
    }

    /// Pull the next record of sub-iterator `i` into the queue.
    fn advance(&mut self, i: usize) -> Result<()> {
        if let Some(rec) = self.subs[i].next_record()? {
            self.pq.add(PqEntry::new(i, rec));
        }
        Ok(())
    }
}

impl RecordIterator for MergedIter<'_> {
    fn next_record(&mut self) -> Result<Option<Record>> {
        let winner = match self.pq.remove() {
            Some(entry) => entry,
            None => return Ok(None),
        };
        self.advance(winner.index)?;

        // Older records for the same key are shadowed.
        while self.pq.peek().is_some_and(|top| top.key == winner.key) {
            if let Some(shadowed) = self.pq.remove() {
                self.advance(shadowed.index)?;
            }
        }

        Ok(Some(winner.rec))
    }
}
