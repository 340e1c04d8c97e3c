//! Configuration for the session manager.

use crate::codec;
use crate::error::{SessionResult, config_error};
use crate::store::BackendConfig;
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_COOKIE_NAME: &str = "session_id";

/// Default cookie lifetime: one day.
pub const DEFAULT_COOKIE_LIFETIME_SECS: i64 = 86_400;

/// Default record lifetime: two hours.
pub const DEFAULT_RECORD_TTL_SECS: u64 = 7_200;

/// Produces new session identifiers.
pub type IdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

#[derive(Clone)]
pub struct SessionConfig {
    /// Key mixed into the identifier signature. `None` signs with an empty key.
    pub signing_secret: Option<Vec<u8>>,

    pub cookie_name: String,

    /// `Max-Age` of issued cookies. Zero or negative issues a browser-session cookie.
    pub cookie_lifetime_secs: i64,

    /// Mark cookies `Secure` when the request arrived over a secure channel.
    pub secure: bool,

    pub domain: Option<String>,

    /// How long a record lives after its last start or refresh.
    pub record_ttl_secs: u64,

    pub id_generator: IdGenerator,

    pub backend: BackendConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            signing_secret: None,
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            cookie_lifetime_secs: DEFAULT_COOKIE_LIFETIME_SECS,
            secure: false,
            domain: None,
            record_ttl_secs: DEFAULT_RECORD_TTL_SECS,
            id_generator: Arc::new(codec::generate),
            backend: BackendConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Same as [`Default::default`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the key used to sign identifiers.
    pub fn with_signing_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.signing_secret = Some(secret.into());
        self
    }

    /// Sets the cookie name. Must be non-empty.
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Sets the cookie `Max-Age` in seconds.
    pub fn with_cookie_lifetime(mut self, secs: i64) -> Self {
        self.cookie_lifetime_secs = secs;
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Scopes issued cookies to `domain`.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Sets the server-side record lifetime in seconds. Must be non-zero.
    pub fn with_record_ttl(mut self, secs: u64) -> Self {
        self.record_ttl_secs = secs;
        self
    }

    /// Replaces the UUID v4 generator.
    pub fn with_id_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.id_generator = Arc::new(generator);
        self
    }

    /// Selects the storage backend.
    pub fn with_backend(mut self, backend: BackendConfig) -> Self {
        self.backend = backend;
        self
    }

    /// Rejects settings that can never produce a working session.
    pub fn validate(&self) -> SessionResult<()> {
        if self.cookie_name.is_empty() {
            return Err(config_error("cookie name must not be empty"));
        }
        if self.record_ttl_secs == 0 {
            return Err(config_error("record ttl must be at least one second"));
        }
        Ok(())
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("signing_secret", &self.signing_secret.as_ref().map(|_| "<redacted>"))
            .field("cookie_name", &self.cookie_name)
            .field("cookie_lifetime_secs", &self.cookie_lifetime_secs)
            .field("secure", &self.secure)
            .field("domain", &self.domain)
            .field("record_ttl_secs", &self.record_ttl_secs)
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}
