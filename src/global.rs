//! Process-wide default manager for applications that do not want to pass one around.
//!
//! The default is built on first use from [`SessionConfig::default`] unless [`init_manager`]
//! ran first.
//!
//! With the default in-memory backend, the sweep task is spawned on the runtime that first builds
//! the manager. If that runtime shuts down the sweep stops with it, and because the manager lives
//! in a static it is never dropped or closed; expired entries are then only hidden on access.
//! Install the manager from the long-lived runtime, or call [`SessionManager::close`] on shutdown.

use crate::config::SessionConfig;
use crate::error::{SessionResult, config_error};
use crate::handle::SessionHandle;
use crate::manager::SessionManager;
use crate::transport::CookieTransport;
use tokio::sync::OnceCell;

static DEFAULT_MANAGER: OnceCell<SessionManager> = OnceCell::const_new();

/// Installs the default manager. Fails if one is already in place.
pub async fn init_manager(config: SessionConfig) -> SessionResult<&'static SessionManager> {
    let manager = SessionManager::new(config).await?;
    DEFAULT_MANAGER
        .set(manager)
        .map_err(|_| config_error("default session manager already initialized"))?;
    default_manager().await
}

/// Returns the default manager, building it from defaults on first use.
pub async fn default_manager() -> SessionResult<&'static SessionManager> {
    DEFAULT_MANAGER
        .get_or_try_init(|| SessionManager::new(SessionConfig::default()))
        .await
}

/// [`SessionManager::start`] on the default manager.
pub async fn start<T>(transport: &mut T) -> SessionResult<SessionHandle>
where
    T: CookieTransport + ?Sized,
{
    default_manager().await?.start(transport).await
}

/// [`SessionManager::destroy`] on the default manager.
pub async fn destroy<T>(transport: &mut T) -> SessionResult<()>
where
    T: CookieTransport + ?Sized,
{
    default_manager().await?.destroy(transport).await
}

/// [`SessionManager::refresh`] on the default manager.
pub async fn refresh<T>(transport: &mut T) -> SessionResult<SessionHandle>
where
    T: CookieTransport + ?Sized,
{
    default_manager().await?.refresh(transport).await
}
