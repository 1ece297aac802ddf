//! Forward iteration over records.
//!
//! Blocks, tables and merged tables all hand out the same kind of cursor,
//! so callers (including the merge itself) cannot tell them apart.

use crate::error::{Error, Result};
use crate::record::{LogRecord, Record, RefRecord};

/// A forward cursor over records in key order.
///
/// `Ok(None)` signals the end of the sequence; any error aborts it.
/// Resources held by the iterator are released when it is dropped.
pub trait RecordIterator {
    /// Returns the next record, or `None` once the sequence is exhausted.
    fn next_record(&mut self) -> Result<Option<Record>>;

    /// Like [`next_record`](Self::next_record), for a stream of refs.
    fn next_ref(&mut self) -> Result<Option<RefRecord>> {
        match self.next_record()? {
            None => Ok(None),
            Some(Record::Ref(r)) => Ok(Some(r)),
            Some(other) => Err(unexpected("ref", &other)),
        }
    }

    /// Like [`next_record`](Self::next_record), for a stream of log entries.
    fn next_log(&mut self) -> Result<Option<LogRecord>> {
        match self.next_record()? {
            None => Ok(None),
            Some(Record::Log(l)) => Ok(Some(l)),
            Some(other) => Err(unexpected("log", &other)),
        }
    }
}

fn unexpected(wanted: &str, got: &Record) -> Error {
    Error::format(format!(
        "expected {} record, iterator produced {:?}",
        wanted,
        got.block_type()
    ))
}

impl<I: RecordIterator + ?Sized> RecordIterator for Box<I> {
    fn next_record(&mut self) -> Result<Option<Record>> {
        (**self).next_record()
    }
}

/// An iterator that yields nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyIterator;

impl RecordIterator for EmptyIterator {
    fn next_record(&mut self) -> Result<Option<Record>> {
        Ok(None)
    }
}
