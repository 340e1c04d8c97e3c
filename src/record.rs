use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use time::{Duration, OffsetDateTime, PrimitiveDateTime};

/// Key/value data of one session.
pub type Values = HashMap<String, Value>;

/// One session's data plus its expiry deadline.
///
/// All access goes through a per-record read/write lock, so readers of the same session never
/// block each other and a writer only blocks its own session.
#[derive(Debug)]
pub struct Record {
    state: RwLock<RecordState>,
}

#[derive(Debug)]
struct RecordState {
    id: String,
    values: Values,
    expires_at: OffsetDateTime,
}

impl Record {
    /// Builds a record expiring `ttl_secs` from now.
    pub fn new(id: impl Into<String>, values: Values, ttl_secs: u64) -> Self {
        Self {
            state: RwLock::new(RecordState {
                id: id.into(),
                values,
                expires_at: deadline(ttl_secs),
            }),
        }
    }

    /// An unbound record, used to seed pool slots.
    pub(crate) fn vacant() -> Self {
        Self {
            state: RwLock::new(RecordState {
                id: String::new(),
                values: Values::new(),
                expires_at: OffsetDateTime::UNIX_EPOCH,
            }),
        }
    }

    /// Session id the record is currently bound to.
    pub fn id(&self) -> String {
        self.state.read().id.clone()
    }

    pub fn expires_at(&self) -> OffsetDateTime {
        self.state.read().expires_at
    }

    /// True once `now` has reached the deadline.
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.state.read().expires_at
    }

    /// Whole seconds left before expiry, zero once expired.
    pub fn remaining_secs(&self, now: OffsetDateTime) -> u64 {
        let left = self.state.read().expires_at - now;
        left.whole_seconds().max(0) as u64
    }

    /// Moves the deadline to `ttl_secs` from now.
    pub fn touch(&self, ttl_secs: u64) {
        self.state.write().expires_at = deadline(ttl_secs);
    }

    /// Clone of the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.state.read().values.get(key).cloned()
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.state.write().values.insert(key.into(), value);
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.state.write().values.remove(key)
    }

    pub fn flush(&self) {
        self.state.write().values.clear();
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.state.read().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().values.is_empty()
    }

    /// Copy of the current values.
    pub fn snapshot(&self) -> Values {
        self.state.read().values.clone()
    }

    /// Moves the record to `id` with a fresh deadline, keeping its values.
    pub(crate) fn rebind(&self, id: &str, ttl_secs: u64) {
        let mut state = self.state.write();
        state.id.clear();
        state.id.push_str(id);
        state.expires_at = deadline(ttl_secs);
    }

    /// Rebinds the record to another session. Nothing from the previous binding survives.
    pub(crate) fn reset(&self, id: &str, values: Values, expires_at: OffsetDateTime) {
        let mut state = self.state.write();
        state.id.clear();
        state.id.push_str(id);
        state.values = values;
        state.expires_at = expires_at;
    }

    /// Serializes the values for storage. An empty map becomes an empty string.
    pub fn to_payload(&self) -> serde_json::Result<String> {
        let state = self.state.read();
        if state.values.is_empty() {
            return Ok(String::new());
        }
        serde_json::to_string(&state.values)
    }
}

/// Parses a stored payload written by [`Record::to_payload`].
pub fn parse_payload(payload: &str) -> serde_json::Result<Values> {
    if payload.is_empty() {
        return Ok(Values::new());
    }
    serde_json::from_str(payload)
}

/// `now + ttl_secs`, saturating far in the future.
pub fn deadline(ttl_secs: u64) -> OffsetDateTime {
    let ttl = Duration::seconds(i64::try_from(ttl_secs).unwrap_or(i64::MAX));
    OffsetDateTime::now_utc()
        .checked_add(ttl)
        .unwrap_or(PrimitiveDateTime::MAX.assume_utc())
}
