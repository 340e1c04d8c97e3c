use crate::codec;
use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::handle::SessionHandle;
use crate::store::{SessionBackend, create_backend};
use crate::transport::{CookieTransport, SessionCookie};
use std::sync::Arc;
use tracing::{debug, warn};

/// Ties the identifier codec, a backend and the cookie transport together.
///
/// One manager is shared by every request; it holds no per-request state.
pub struct SessionManager {
    config: SessionConfig,
    backend: Arc<dyn SessionBackend>,
}

impl SessionManager {
    /// Validates `config` and builds the configured backend.
    pub async fn new(config: SessionConfig) -> SessionResult<Self> {
        config.validate()?;
        let backend = create_backend(&config.backend).await?;
        Ok(Self { config, backend })
    }

    /// Uses an existing backend, ignoring `config.backend`.
    pub fn with_backend(
        config: SessionConfig,
        backend: Arc<dyn SessionBackend>,
    ) -> SessionResult<Self> {
        config.validate()?;
        Ok(Self { config, backend })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn SessionBackend> {
        &self.backend
    }

    /// Opens the session named by the request cookie, or issues a new one.
    ///
    /// A live session is reused with its values and its deadline pushed out; no cookie is sent.
    /// Otherwise a fresh, empty session is created and its cookie queued on `transport`.
    pub async fn start<T>(&self, transport: &mut T) -> SessionResult<SessionHandle>
    where
        T: CookieTransport + ?Sized,
    {
        let ttl = self.config.record_ttl_secs;
        if let Some(id) = self.inbound_id(transport)? {
            if self.backend.check(&id).await? {
                debug!(session = short(&id), "reusing live session");
                return self.backend.update(&id, ttl).await;
            }
        }

        let id = (self.config.id_generator)();
        let handle = self.backend.create(&id, ttl).await?;
        self.issue(transport, &id);
        debug!(session = short(&id), "issued new session");
        Ok(handle)
    }

    /// Deletes the request's session and tells the client to drop its cookie.
    ///
    /// A request without a usable session cookie is left untouched.
    pub async fn destroy<T>(&self, transport: &mut T) -> SessionResult<()>
    where
        T: CookieTransport + ?Sized,
    {
        let Some(id) = self.inbound_id(transport)? else {
            return Ok(());
        };
        self.backend.delete(&id).await?;
        transport.set_cookie(SessionCookie {
            name: self.config.cookie_name.clone(),
            value: String::new(),
            path: "/".to_string(),
            http_only: true,
            secure: false,
            domain: self.config.domain.clone(),
            max_age: Some(0),
        });
        debug!(session = short(&id), "destroyed session");
        Ok(())
    }

    /// Moves the request's session to a new identifier and issues the new cookie.
    ///
    /// Stored values are carried over. Without a usable inbound cookie this starts a new, empty
    /// session.
    pub async fn refresh<T>(&self, transport: &mut T) -> SessionResult<SessionHandle>
    where
        T: CookieTransport + ?Sized,
    {
        let ttl = self.config.record_ttl_secs;
        let old_id = self.inbound_id(transport)?;
        let new_id = (self.config.id_generator)();
        let handle = match &old_id {
            Some(old_id) => self.backend.refresh(old_id, &new_id, ttl).await?,
            None => self.backend.create(&new_id, ttl).await?,
        };
        self.issue(transport, &new_id);
        debug!(
            from = old_id.as_deref().map(short),
            to = short(&new_id),
            "refreshed session id"
        );
        Ok(handle)
    }

    /// Encodes `id` with this manager's signing secret.
    pub fn encode_id(&self, id: &str) -> String {
        codec::encode(id, self.secret())
    }

    /// Verifies a token against this manager's signing secret.
    pub fn decode_id(&self, token: &str) -> SessionResult<String> {
        codec::decode(token, self.secret())
    }

    pub async fn close(&self) -> SessionResult<()> {
        self.backend.close().await
    }

    fn secret(&self) -> Option<&[u8]> {
        self.config.signing_secret.as_deref()
    }

    /// The identifier carried by the request, if any.
    ///
    /// Tokens that parse but fail verification count as absent; unreadable values are errors.
    fn inbound_id<T>(&self, transport: &T) -> SessionResult<Option<String>>
    where
        T: CookieTransport + ?Sized,
    {
        let Some(token) = transport
            .cookie(&self.config.cookie_name)
            .filter(|value| !value.is_empty())
        else {
            return Ok(None);
        };

        match self.decode_id(&token) {
            Ok(id) => Ok(Some(id)),
            Err(SessionError::InvalidIdentifier(reason)) if reason.is_recoverable() => {
                warn!(%reason, "ignoring session cookie");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn issue<T>(&self, transport: &mut T, id: &str)
    where
        T: CookieTransport + ?Sized,
    {
        let token = self.encode_id(id);
        let lifetime = self.config.cookie_lifetime_secs;
        transport.set_cookie(SessionCookie {
            name: self.config.cookie_name.clone(),
            value: token.clone(),
            path: "/".to_string(),
            http_only: true,
            secure: self.config.secure && transport.is_secure_channel(),
            domain: self.config.domain.clone(),
            max_age: (lifetime > 0).then_some(lifetime),
        });
        transport.replace_inbound(&self.config.cookie_name, &token);
    }
}

/// Log-safe prefix of a session id.
fn short(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
