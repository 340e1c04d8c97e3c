use crate::error::SessionResult;
use crate::handle::SessionHandle;
use crate::inmemory::InMemoryBackend;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Storage interface behind the session manager.
///
/// Implementations own the mapping from session id to record and enforce expiry: an entry whose
/// deadline has passed must never be reported as existing, whether or not it has been evicted
/// yet. All methods take `&self`; implementations are shared between concurrent requests.
#[async_trait]
pub trait SessionBackend: Send + Sync + 'static {
    /// Reports whether a live (unexpired) record exists for `id`. Never mutates.
    async fn check(&self, id: &str) -> SessionResult<bool>;

    /// Creates an empty record for `id` expiring in `ttl_secs`, replacing any existing one.
    async fn create(&self, id: &str, ttl_secs: u64) -> SessionResult<SessionHandle>;

    /// Extends a live record's deadline and returns a handle over its values.
    ///
    /// Behaves like [`create`](Self::create) when no live record exists.
    async fn update(&self, id: &str, ttl_secs: u64) -> SessionResult<SessionHandle>;

    /// Moves a live record from `old_id` to `new_id` with a fresh deadline.
    ///
    /// Once this returns, `old_id` no longer resolves. When `old_id` has no live record this
    /// behaves like [`create`](Self::create) for `new_id`.
    async fn refresh(
        &self,
        old_id: &str,
        new_id: &str,
        ttl_secs: u64,
    ) -> SessionResult<SessionHandle>;

    /// Removes the record for `id`. Removing a missing id is not an error.
    async fn delete(&self, id: &str) -> SessionResult<()>;

    /// Releases background tasks and connections. Later calls fail with `Closed`.
    async fn close(&self) -> SessionResult<()>;
}

/// Backend selection for [`create_backend`].
#[derive(Clone)]
pub enum BackendConfig {
    InMemory {
        sweep_interval: Duration,
    },
    #[cfg(feature = "redis")]
    Redis {
        url: String,
        namespace: String,
        pool_capacity: usize,
    },
    /// An already constructed backend.
    Custom(Arc<dyn SessionBackend>),
}

impl BackendConfig {
    pub fn in_memory() -> Self {
        Self::InMemory {
            sweep_interval: crate::inmemory::DEFAULT_SWEEP_INTERVAL,
        }
    }

    #[cfg(feature = "redis")]
    pub fn redis(url: impl Into<String>) -> Self {
        Self::Redis {
            url: url.into(),
            namespace: crate::redis_store::DEFAULT_NAMESPACE.to_string(),
            pool_capacity: crate::pool::DEFAULT_POOL_CAPACITY,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InMemory { sweep_interval } => f
                .debug_struct("InMemory")
                .field("sweep_interval", sweep_interval)
                .finish(),
            #[cfg(feature = "redis")]
            Self::Redis {
                namespace,
                pool_capacity,
                ..
            } => f
                .debug_struct("Redis")
                .field("namespace", namespace)
                .field("pool_capacity", pool_capacity)
                .finish_non_exhaustive(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Builds the backend described by `config`.
pub async fn create_backend(config: &BackendConfig) -> SessionResult<Arc<dyn SessionBackend>> {
    match config {
        BackendConfig::InMemory { sweep_interval } => {
            let backend = InMemoryBackend::with_sweep_interval(*sweep_interval)?;
            Ok(Arc::new(backend))
        }
        #[cfg(feature = "redis")]
        BackendConfig::Redis {
            url,
            namespace,
            pool_capacity,
        } => {
            let backend =
                crate::redis_store::RedisBackend::connect(url, namespace.clone(), *pool_capacity)
                    .await?;
            Ok(Arc::new(backend))
        }
        BackendConfig::Custom(backend) => Ok(Arc::clone(backend)),
    }
}
