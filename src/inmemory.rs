use crate::error::{SessionError, SessionResult, config_error};
use crate::handle::{RecordSink, SessionHandle};
use crate::record::{Record, Values};
use crate::store::SessionBackend;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::task::JoinHandle;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

type Entries = Arc<DashMap<String, Arc<Record>>>;

/// In-memory backend backed by a concurrent hash map.
///
/// Handles wrap the live record, so `set` is visible to every holder of the same session right
/// away. Expired entries are hidden on access and removed by a periodic sweep task.
pub struct InMemoryBackend {
    entries: Entries,
    sink: Arc<LiveSink>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

struct LiveSink {
    closed: AtomicBool,
}

#[async_trait]
impl RecordSink for LiveSink {
    async fn save(&self, _record: &Record) -> SessionResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SessionError::Closed);
        }
        Ok(())
    }
}

impl InMemoryBackend {
    /// Builds the backend and starts its sweep task. Must be called inside a Tokio runtime.
    pub fn new() -> SessionResult<Self> {
        Self::with_sweep_interval(DEFAULT_SWEEP_INTERVAL)
    }

    /// Like [`new`](Self::new) with a custom sweep period. A zero interval is rejected.
    pub fn with_sweep_interval(interval: Duration) -> SessionResult<Self> {
        if interval.is_zero() {
            return Err(config_error("sweep interval must be non-zero"));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| config_error("in-memory backend requires a Tokio runtime"))?;
        let entries: Entries = Arc::new(DashMap::new());
        let sweeper = runtime.spawn(sweep_loop(Arc::clone(&entries), interval));
        Ok(Self {
            entries,
            sink: Arc::new(LiveSink {
                closed: AtomicBool::new(false),
            }),
            sweeper: Mutex::new(Some(sweeper)),
        })
    }

    fn now() -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }

    fn ensure_open(&self) -> SessionResult<()> {
        if self.sink.closed.load(Ordering::Acquire) {
            return Err(SessionError::Closed);
        }
        Ok(())
    }

    fn handle(&self, record: Arc<Record>) -> SessionHandle {
        let sink: Arc<dyn RecordSink> = self.sink.clone();
        SessionHandle::shared(record, sink)
    }

    fn insert(&self, id: &str, values: Values, ttl_secs: u64) -> SessionHandle {
        let record = Arc::new(Record::new(id, values, ttl_secs));
        self.entries.insert(id.to_owned(), Arc::clone(&record));
        self.handle(record)
    }

    /// Number of entries held, including expired ones the sweep has not reached.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries are held, expired or not.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every expired entry now. Returns the number removed.
    pub fn sweep(&self) -> usize {
        sweep_expired(&self.entries, Self::now())
    }
}

impl Drop for InMemoryBackend {
    fn drop(&mut self) {
        if let Some(task) = self.sweeper.get_mut().take() {
            task.abort();
        }
    }
}

async fn sweep_loop(entries: Entries, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    // the first tick completes immediately
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let removed = sweep_expired(&entries, OffsetDateTime::now_utc());
        tracing::trace!(removed, remaining = entries.len(), "session sweep");
    }
}

fn sweep_expired(entries: &DashMap<String, Arc<Record>>, now: OffsetDateTime) -> usize {
    let stale: Vec<String> = entries
        .iter()
        .filter(|entry| entry.value().is_expired(now))
        .map(|entry| entry.key().clone())
        .collect();

    // re-check under the entry lock: the record may have been touched since the scan
    stale
        .iter()
        .filter(|key| {
            entries
                .remove_if(key.as_str(), |_, record| record.is_expired(now))
                .is_some()
        })
        .count()
}

#[async_trait]
impl SessionBackend for InMemoryBackend {
    async fn check(&self, id: &str) -> SessionResult<bool> {
        self.ensure_open()?;
        let now = Self::now();
        Ok(self
            .entries
            .get(id)
            .is_some_and(|record| !record.is_expired(now)))
    }

    async fn create(&self, id: &str, ttl_secs: u64) -> SessionResult<SessionHandle> {
        self.ensure_open()?;
        Ok(self.insert(id, Values::new(), ttl_secs))
    }

    async fn update(&self, id: &str, ttl_secs: u64) -> SessionResult<SessionHandle> {
        self.ensure_open()?;
        let now = Self::now();
        if let Some(entry) = self.entries.get(id) {
            let record = Arc::clone(entry.value());
            drop(entry);
            if !record.is_expired(now) {
                record.touch(ttl_secs);
                return Ok(self.handle(record));
            }
            self.entries.remove_if(id, |_, current| current.is_expired(now));
        }
        Ok(self.insert(id, Values::new(), ttl_secs))
    }

    async fn refresh(
        &self,
        old_id: &str,
        new_id: &str,
        ttl_secs: u64,
    ) -> SessionResult<SessionHandle> {
        self.ensure_open()?;
        let now = Self::now();
        match self.entries.remove(old_id) {
            // rebind in place so handles still holding the record keep writing to the live session
            Some((_, record)) if !record.is_expired(now) => {
                record.rebind(new_id, ttl_secs);
                self.entries.insert(new_id.to_owned(), Arc::clone(&record));
                Ok(self.handle(record))
            }
            _ => Ok(self.insert(new_id, Values::new(), ttl_secs)),
        }
    }

    async fn delete(&self, id: &str) -> SessionResult<()> {
        self.ensure_open()?;
        self.entries.remove(id);
        Ok(())
    }

    async fn close(&self) -> SessionResult<()> {
        self.sink.closed.store(true, Ordering::Release);
        if let Some(task) = self.sweeper.lock().take() {
            task.abort();
        }
        self.entries.clear();
        Ok(())
    }
}
