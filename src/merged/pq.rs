//! Priority queue driving the k-way merge.

use crate::record::Record;
use std::cmp::Ordering;

/// Entry in the merge heap: the next record of one sub-iterator.
#[derive(Debug, Clone)]
pub struct PqEntry {
    /// Sort key of `rec`, computed once on insertion.
    pub key: Vec<u8>,
    /// Position of the originating table; higher is newer.
    pub index: usize,
    /// The record itself.
    pub rec: Record,
}

impl PqEntry {
    /// Wrap the record produced by sub-iterator `index`.
    pub fn new(index: usize, rec: Record) -> Self {
        Self {
            key: rec.key().into_owned(),
            index,
            rec,
        }
    }
}

impl PartialEq for PqEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PqEntry {}

impl PartialOrd for PqEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PqEntry {
    /// Smallest key first; for equal keys the newer table comes first.
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then_with(|| other.index.cmp(&self.index))
    }
}

/// Binary min-heap of [`PqEntry`].
///
/// Holds at most one entry per sub-iterator, so it never grows past the
/// merge's fan-in.
#[derive(Debug, Default)]
pub struct MergedPQueue {
    heap: Vec<PqEntry>,
}

impl MergedPQueue {
    /// Create an empty queue with room for `n` entries.
    pub fn with_capacity(n: usize) -> Self {
        Self {
            heap: Vec::with_capacity(n),
        }
    }

    /// Number of queued entries.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// The smallest entry, without removing it.
    pub fn peek(&self) -> Option<&PqEntry> {
        self.heap.first()
    }

    /// Insert an entry.
    pub fn add(&mut self, entry: PqEntry) {
        self.heap.push(entry);
        let mut i = self.heap.len() - 1;
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.heap[parent] <= self.heap[i] {
                break;
            }
            self.heap.swap(parent, i);
            i = parent;
        }
    }

    /// Remove and return the smallest entry.
    pub fn remove(&mut self) -> Option<PqEntry> {
        if self.heap.is_empty() {
            return None;
        }
        let top = self.heap.swap_remove(0);

        let len = self.heap.len();
        let mut i = 0;
        loop {
            let (l, r) = (2 * i + 1, 2 * i + 2);
            let mut min = i;
            if l < len && self.heap[l] < self.heap[min] {
                min = l;
            }
            if r < len && self.heap[r] < self.heap[min] {
                min = r;
            }
            if min == i {
                break;
            }
            self.heap.swap(i, min);
            i = min;
        }
        Some(top)
    }

    /// Verifies that every entry sorts no earlier than its parent.
    pub fn check(&self) -> bool {
        (1..self.heap.len()).all(|i| self.heap[(i - 1) / 2] <= self.heap[i])
    }
}
