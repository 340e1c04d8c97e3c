#![forbid(unsafe_code)]

pub mod codec;
pub mod config;
pub mod error;
pub mod global;
pub mod handle;
pub mod inmemory;
pub mod manager;
pub mod pool;
pub mod record;
#[cfg(feature = "redis")]
pub mod redis_store;
pub mod store;
pub mod transport;

pub use config::SessionConfig;
pub use error::{InvalidReason, SessionError, SessionResult};
pub use handle::SessionHandle;
pub use inmemory::InMemoryBackend;
pub use manager::SessionManager;
#[cfg(feature = "redis")]
pub use redis_store::RedisBackend;
pub use store::{BackendConfig, SessionBackend, create_backend};
pub use transport::{CookieJar, CookieTransport, SessionCookie};
