//! Shared interface for session providers

use rocket::{
    async_trait,
    http::{Cookie, CookieJar},
};

use crate::{error::SessionResult, store::SessionStore};

/// Trait representing a session backend. You can plug in your own session storage
/// by implementing this trait and registering it in a
/// [`ProviderRegistry`](crate::ProviderRegistry).
///
/// Request-scoped operations receive Rocket's cookie jar, so client-side providers
/// can read and clear their own cookies.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Configure the provider. `max_lifetime` is the inactivity threshold in seconds
    /// after which sessions expire, and `config` is the provider-specific
    /// configuration string. Called once, when the manager is built.
    async fn init(&mut self, max_lifetime: u64, config: &str) -> SessionResult<()>;

    /// Get the session with the given ID. If the session doesn't exist or has
    /// expired, a new empty session must be created and returned instead.
    async fn read(&self, id: &str, cookie_jar: &CookieJar<'_>) -> SessionResult<SessionStore>;

    /// Whether a session with the given ID exists
    async fn exists(&self, id: &str) -> bool;

    /// Move the data of `old_id` to `new_id`, remove `old_id`, and return the session
    /// under its new ID. If `old_id` doesn't exist, this should behave like [`read`](Self::read)
    /// with the new ID.
    async fn regenerate(
        &self,
        old_id: &str,
        new_id: &str,
        cookie_jar: &CookieJar<'_>,
    ) -> SessionResult<SessionStore>;

    /// Remove all data of a session. Destroying a missing session is not an error.
    async fn destroy(&self, id: &str, cookie_jar: &CookieJar<'_>) -> SessionResult<()>;

    /// Persist the store's data at the end of the request. Client-side providers
    /// can return a cookie that should be attached to the response.
    async fn release(&self, store: &SessionStore) -> SessionResult<Option<Cookie<'static>>>;

    /// Number of sessions currently tracked by the provider
    async fn count(&self) -> SessionResult<usize>;

    /// Evict sessions that have been inactive for longer than the max lifetime,
    /// returning the number of evicted sessions. Errors for individual sessions
    /// should be logged without aborting the sweep.
    async fn gc(&self) -> usize;

    /// Optional teardown of resources that will be called on server shutdown
    async fn shutdown(&self) -> SessionResult<()> {
        Ok(()) // Default no-op
    }
}
