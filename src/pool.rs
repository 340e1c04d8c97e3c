//! Arena of reusable [`Record`] slots for backends that rebuild a record on every request.
//!
//! A slot is checked out, reset and bound to a session; when its [`PooledRecord`] is dropped the
//! slot is reset again and its index goes back on the free list. A slot is never handed out twice
//! while checked out.

use crate::record::{Record, Values};
use parking_lot::Mutex;
use std::ops::Deref;
use std::sync::Arc;
use time::OffsetDateTime;

pub const DEFAULT_POOL_CAPACITY: usize = 1024;

/// Bounded set of reusable record slots shared by every handle a backend hands out.
pub struct RecordPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    slots: Mutex<Vec<Arc<Record>>>,
    free: Mutex<Vec<usize>>,
    capacity: usize,
}

impl RecordPool {
    /// `capacity` bounds the number of slots kept for reuse; checkouts beyond it get a one-off
    /// record that is simply dropped on release.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                slots: Mutex::new(Vec::new()),
                free: Mutex::new(Vec::new()),
                capacity,
            }),
        }
    }

    /// Takes a slot and binds it to `id` with the given values and deadline.
    pub fn checkout(&self, id: &str, values: Values, expires_at: OffsetDateTime) -> PooledRecord {
        let (slot, record) = self.take_slot();
        record.reset(id, values, expires_at);
        PooledRecord {
            pool: Arc::clone(&self.inner),
            slot,
            record,
        }
    }

    /// Number of slots currently on the free list.
    pub fn available(&self) -> usize {
        self.inner.free.lock().len()
    }

    /// Number of slots allocated so far.
    pub fn allocated(&self) -> usize {
        self.inner.slots.lock().len()
    }

    fn take_slot(&self) -> (Option<usize>, Arc<Record>) {
        let free = self.inner.free.lock().pop();
        if let Some(index) = free {
            let record = Arc::clone(&self.inner.slots.lock()[index]);
            return (Some(index), record);
        }

        let mut slots = self.inner.slots.lock();
        if slots.len() < self.inner.capacity {
            let record = Arc::new(Record::vacant());
            slots.push(Arc::clone(&record));
            return (Some(slots.len() - 1), record);
        }
        (None, Arc::new(Record::vacant()))
    }
}

impl PoolInner {
    fn checkin(&self, slot: usize, record: &Record) {
        record.reset("", Values::new(), OffsetDateTime::UNIX_EPOCH);
        self.free.lock().push(slot);
    }
}

/// A record checked out of a [`RecordPool`]; returns to the pool on drop.
pub struct PooledRecord {
    pool: Arc<PoolInner>,
    slot: Option<usize>,
    record: Arc<Record>,
}

impl PooledRecord {
    /// Index of the backing slot, `None` for an overflow record.
    pub fn slot(&self) -> Option<usize> {
        self.slot
    }
}

impl Deref for PooledRecord {
    type Target = Record;

    fn deref(&self) -> &Record {
        &self.record
    }
}

impl Drop for PooledRecord {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            self.pool.checkin(slot, &self.record);
        }
    }
}
