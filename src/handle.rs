use crate::error::SessionResult;
use crate::pool::PooledRecord;
use crate::record::{Record, Values};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use time::OffsetDateTime;

/// Where a handle's record goes when [`SessionHandle::save`] is called.
#[async_trait]
pub trait RecordSink: Send + Sync + 'static {
    async fn save(&self, record: &Record) -> SessionResult<()>;
}

enum RecordRef {
    /// The backend's live record.
    Shared(Arc<Record>),
    /// A pool slot populated from storage.
    Pooled(PooledRecord),
}

/// Request-scoped view over one session record.
///
/// `set`, `remove` and `flush` change the record in place; whether other requests see those
/// changes before [`save`](Self::save) depends on the backend that produced the handle.
pub struct SessionHandle {
    record: RecordRef,
    sink: Arc<dyn RecordSink>,
}

impl SessionHandle {
    /// Wraps a record owned by the backend itself.
    pub fn shared(record: Arc<Record>, sink: Arc<dyn RecordSink>) -> Self {
        Self {
            record: RecordRef::Shared(record),
            sink,
        }
    }

    /// Wraps a pool slot; the slot returns to its pool when the handle drops.
    pub fn pooled(record: PooledRecord, sink: Arc<dyn RecordSink>) -> Self {
        Self {
            record: RecordRef::Pooled(record),
            sink,
        }
    }

    fn record(&self) -> &Record {
        match &self.record {
            RecordRef::Shared(record) => &**record,
            RecordRef::Pooled(record) => &**record,
        }
    }

    /// Id of the session this handle belongs to.
    pub fn session_id(&self) -> String {
        self.record().id()
    }

    pub fn expires_at(&self) -> OffsetDateTime {
        self.record().expires_at()
    }

    /// Clone of the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.record().get(key)
    }

    /// Returns the value when it is stored as a JSON string.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.record().get(key)? {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Deserializes the stored value into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> SessionResult<Option<T>> {
        let value = self.record().get(key);
        Ok(value.map(serde_json::from_value).transpose()?)
    }

    /// Stores `value` under `key`.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.record().set(key, value.into());
    }

    /// Serializes `value` and stores it under `key`.
    pub fn insert<T>(&self, key: impl Into<String>, value: &T) -> SessionResult<()>
    where
        T: Serialize + ?Sized,
    {
        let value = serde_json::to_value(value)?;
        self.record().set(key, value);
        Ok(())
    }

    /// Removes `key`, returning what was stored there.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.record().remove(key)
    }

    /// Drops every value.
    pub fn flush(&self) {
        self.record().flush();
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.record().len()
    }

    pub fn is_empty(&self) -> bool {
        self.record().is_empty()
    }

    /// Copy of every stored value.
    pub fn values(&self) -> Values {
        self.record().snapshot()
    }

    /// Persists the current values through the backend.
    pub async fn save(&self) -> SessionResult<()> {
        self.sink.save(self.record()).await
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pooled = matches!(self.record, RecordRef::Pooled(_));
        f.debug_struct("SessionHandle")
            .field("len", &self.len())
            .field("expires_at", &self.expires_at())
            .field("pooled", &pooled)
            .finish()
    }
}
