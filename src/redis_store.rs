use crate::error::{SessionError, SessionResult, redis_error};
use crate::handle::{RecordSink, SessionHandle};
use crate::pool::RecordPool;
use crate::record::{Record, Values, deadline, parse_payload};
use crate::store::SessionBackend;
use async_trait::async_trait;
use parking_lot::Mutex;
use redis::Client;
use redis::aio::MultiplexedConnection;
use std::sync::Arc;
use time::OffsetDateTime;

pub const DEFAULT_NAMESPACE: &str = "session";

/// Redis-backed session store.
///
/// Each session is one string key holding the JSON-encoded values with a Redis-native expiry.
/// Every call works on a fresh copy of the stored values; nothing is shared between requests
/// until [`SessionHandle::save`] writes it back.
pub struct RedisBackend {
    inner: Arc<RedisInner>,
    pool: RecordPool,
}

struct RedisInner {
    conn: Mutex<Option<MultiplexedConnection>>,
    namespace: String,
}

impl RedisBackend {
    /// Connects using a Redis URL with the default namespace and pool capacity.
    pub async fn from_url(url: impl AsRef<str>) -> SessionResult<Self> {
        Self::connect(
            url.as_ref(),
            DEFAULT_NAMESPACE.to_string(),
            crate::pool::DEFAULT_POOL_CAPACITY,
        )
        .await
    }

    pub async fn connect(
        url: &str,
        namespace: impl Into<String>,
        pool_capacity: usize,
    ) -> SessionResult<Self> {
        let client = Client::open(url).map_err(redis_error)?;
        let conn = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(redis_error)?;
        Ok(Self {
            inner: Arc::new(RedisInner {
                conn: Mutex::new(Some(conn)),
                namespace: namespace.into(),
            }),
            pool: RecordPool::new(pool_capacity),
        })
    }

    /// Slots currently idle in the handle pool.
    pub fn pooled_handles(&self) -> usize {
        self.pool.available()
    }

    fn handle(&self, id: &str, values: Values, ttl_secs: u64) -> SessionHandle {
        let record = self.pool.checkout(id, values, deadline(ttl_secs));
        let sink: Arc<dyn RecordSink> = self.inner.clone();
        SessionHandle::pooled(record, sink)
    }
}

impl RedisInner {
    fn conn(&self) -> SessionResult<MultiplexedConnection> {
        self.conn.lock().clone().ok_or(SessionError::Closed)
    }

    fn session_entry_key(&self, id: &str) -> String {
        format!("{}:{}", self.namespace, id)
    }

    async fn write(&self, id: &str, payload: &str, ttl_secs: u64) -> SessionResult<()> {
        let mut conn = self.conn()?;
        redis::cmd("SET")
            .arg(self.session_entry_key(id))
            .arg(payload)
            .arg("EX")
            .arg(expiry_secs(ttl_secs))
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(redis_error)
    }
}

/// Redis rejects `EX 0`; a record always lives at least one second.
fn expiry_secs(ttl_secs: u64) -> u64 {
    ttl_secs.max(1)
}

#[async_trait]
impl RecordSink for RedisInner {
    async fn save(&self, record: &Record) -> SessionResult<()> {
        let payload = record.to_payload()?;
        let remaining = record.remaining_secs(OffsetDateTime::now_utc());
        self.write(&record.id(), &payload, remaining).await
    }
}

#[async_trait]
impl SessionBackend for RedisBackend {
    async fn check(&self, id: &str) -> SessionResult<bool> {
        let mut conn = self.inner.conn()?;
        redis::cmd("EXISTS")
            .arg(self.inner.session_entry_key(id))
            .query_async::<_, bool>(&mut conn)
            .await
            .map_err(redis_error)
    }

    async fn create(&self, id: &str, ttl_secs: u64) -> SessionResult<SessionHandle> {
        self.inner.write(id, "", ttl_secs).await?;
        Ok(self.handle(id, Values::new(), ttl_secs))
    }

    async fn update(&self, id: &str, ttl_secs: u64) -> SessionResult<SessionHandle> {
        let mut conn = self.inner.conn()?;
        let key = self.inner.session_entry_key(id);
        let (payload, _extended): (Option<String>, i64) = redis::pipe()
            .atomic()
            .cmd("GET")
            .arg(&key)
            .cmd("EXPIRE")
            .arg(&key)
            .arg(expiry_secs(ttl_secs))
            .query_async(&mut conn)
            .await
            .map_err(redis_error)?;

        match payload {
            Some(payload) => {
                let values = parse_payload(&payload)?;
                Ok(self.handle(id, values, ttl_secs))
            }
            None => self.create(id, ttl_secs).await,
        }
    }

    async fn refresh(
        &self,
        old_id: &str,
        new_id: &str,
        ttl_secs: u64,
    ) -> SessionResult<SessionHandle> {
        let mut conn = self.inner.conn()?;
        let old_key = self.inner.session_entry_key(old_id);
        let new_key = self.inner.session_entry_key(new_id);
        // read, copy and drop the old key in one transaction so a concurrent
        // delete or save cannot interleave with the move
        let (payload,): (Option<String>,) = redis::pipe()
            .atomic()
            .cmd("GET")
            .arg(&old_key)
            .cmd("COPY")
            .arg(&old_key)
            .arg(&new_key)
            .arg("REPLACE")
            .ignore()
            .cmd("DEL")
            .arg(&old_key)
            .ignore()
            .cmd("EXPIRE")
            .arg(&new_key)
            .arg(expiry_secs(ttl_secs))
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(redis_error)?;

        match payload {
            Some(payload) => {
                let values = parse_payload(&payload)?;
                Ok(self.handle(new_id, values, ttl_secs))
            }
            None => self.create(new_id, ttl_secs).await,
        }
    }

    async fn delete(&self, id: &str) -> SessionResult<()> {
        let mut conn = self.inner.conn()?;
        redis::cmd("DEL")
            .arg(self.inner.session_entry_key(id))
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(redis_error)
    }

    async fn close(&self) -> SessionResult<()> {
        self.inner.conn.lock().take();
        Ok(())
    }
}
