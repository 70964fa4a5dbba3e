use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use rocket::{
    http::{Cookie, CookieJar, RawStr},
    time::{self, OffsetDateTime},
    tokio::{select, spawn, sync::oneshot, time::interval},
    Request,
};

use crate::{
    error::{SessionError, SessionResult},
    id::generate_id,
    provider::SessionProvider,
    store::SessionStore,
    ManagerConfig, ProviderRegistry,
};

/// The parts of an inbound request that the session manager looks at: the cookie
/// jar, the query parameter fallback for the session ID, and whether the request
/// came in over HTTPS. Create one with [`SessionManager::request`].
#[derive(Clone)]
pub struct SessionRequest<'a> {
    cookies: &'a CookieJar<'a>,
    query_id: Option<String>,
    https: bool,
}

impl<'a> SessionRequest<'a> {
    /// The request's cookie jar
    pub fn cookies(&self) -> &'a CookieJar<'a> {
        self.cookies
    }

    /// Whether the request was made over HTTPS
    pub fn is_https(&self) -> bool {
        self.https
    }
}

/**
Orchestrates one configured session provider: extracts or mints session IDs,
starts, regenerates and destroys sessions, emits the session cookie, and runs
periodic garbage collection.

When using the [`PluggableSession`](crate::PluggableSession) fairing, the manager is
built on ignite and available in Rocket's managed state as `Arc<SessionManager>`.

# Example
```
use rocket_pluggable_session::{ProviderRegistry, SessionManager};

# rocket::execute(async {
let manager = SessionManager::new(
    ProviderRegistry::with_defaults(),
    "memory",
    r#"{"cookieName":"SID","gcLifetime":3600}"#,
)
.await
.expect("valid session config");
assert_eq!(manager.count().await.unwrap(), 0);
# });
```
*/
pub struct SessionManager {
    config: ManagerConfig,
    provider: Arc<dyn SessionProvider>,
    gc_shutdown: Mutex<Option<oneshot::Sender<()>>>,
}

impl SessionManager {
    /// Build a manager from a registry, the name of the provider to use, and a JSON
    /// configuration string. Fails if the provider isn't registered or the
    /// configuration is malformed - the application shouldn't start in that case.
    pub async fn new(
        registry: ProviderRegistry,
        provider_name: &str,
        config: &str,
    ) -> SessionResult<Self> {
        let config = ManagerConfig::from_json(config)?;
        Self::from_config(registry, provider_name, config).await
    }

    /// Build a manager from a registry, the name of the provider to use, and an
    /// already parsed configuration
    pub async fn from_config(
        mut registry: ProviderRegistry,
        provider_name: &str,
        config: ManagerConfig,
    ) -> SessionResult<Self> {
        let provider = registry
            .take(provider_name)
            .ok_or_else(|| SessionError::UnknownProvider(provider_name.to_owned()))?;
        Self::init(provider, config.validated()?).await
    }

    /// Build a manager with the given provider and configuration
    pub async fn with_provider(
        provider: impl SessionProvider + 'static,
        config: ManagerConfig,
    ) -> SessionResult<Self> {
        Self::init(Box::new(provider), config.validated()?).await
    }

    async fn init(
        mut provider: Box<dyn SessionProvider>,
        config: ManagerConfig,
    ) -> SessionResult<Self> {
        provider
            .init(config.max_lifetime, &config.provider_config)
            .await?;
        Ok(Self {
            config,
            provider: Arc::from(provider),
            gc_shutdown: Mutex::default(),
        })
    }

    /// The manager's configuration
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Capture the session-related parts of a request
    pub fn request<'a>(&self, req: &'a Request<'_>) -> SessionRequest<'a> {
        let forwarded_https = req
            .headers()
            .get_one("X-Forwarded-Proto")
            .is_some_and(|proto| proto.eq_ignore_ascii_case("https"));
        SessionRequest {
            cookies: req.cookies(),
            query_id: req
                .query_value::<String>(&self.config.cookie_name)
                .and_then(Result::ok),
            https: forwarded_https || req.rocket().config().tls_enabled(),
        }
    }

    /// Get the session ID from the request's cookie or, if there is no cookie, from
    /// the query parameter of the same name. Returns `None` if neither is present.
    pub fn extract_id(&self, req: &SessionRequest<'_>) -> SessionResult<Option<String>> {
        if let Some(id) = self.cookie_id(req.cookies)? {
            return Ok(Some(id));
        }
        Ok(req.query_id.clone().filter(|id| !id.is_empty()))
    }

    /// Start the session for a request. An existing session is read from the provider,
    /// otherwise a new session is created under a freshly generated ID and the session
    /// cookie is added to the response (if enabled).
    pub async fn start(&self, req: &SessionRequest<'_>) -> SessionResult<SessionStore> {
        if let Some(id) = self.extract_id(req)? {
            if self.provider.exists(&id).await {
                rocket::debug!("Found existing session '{id}'");
                return self.provider.read(&id, req.cookies).await;
            }
            rocket::debug!("Session '{id}' not found, starting a new session");
        }

        let id = generate_id(self.config.session_id_length)?;
        let store = self.provider.read(&id, req.cookies).await?;
        self.set_cookie(req.cookies, &id, self.is_secure(req), self.config.domain.clone());
        Ok(store)
    }

    /// Read a session directly by ID
    pub async fn read(&self, id: &str, cookie_jar: &CookieJar<'_>) -> SessionResult<SessionStore> {
        self.provider.read(id, cookie_jar).await
    }

    /// Move the request's session to a newly generated ID, keeping its data. Use this
    /// after privilege changes such as logging in, to prevent session fixation.
    /// If the request has no session cookie, a new session is started instead.
    pub async fn regenerate(&self, req: &SessionRequest<'_>) -> SessionResult<SessionStore> {
        let old_id = self.cookie_id(req.cookies)?;
        self.regenerate_from(req, old_id.as_deref()).await
    }

    /// Move the session `old_id` (or nothing, if `None`) to a newly generated ID and
    /// send the new session cookie
    pub(crate) async fn regenerate_from(
        &self,
        req: &SessionRequest<'_>,
        old_id: Option<&str>,
    ) -> SessionResult<SessionStore> {
        let new_id = generate_id(self.config.session_id_length)?;
        let store = match old_id {
            Some(old_id) => {
                rocket::debug!("Regenerating session '{old_id}' as '{new_id}'");
                self.provider.regenerate(old_id, &new_id, req.cookies).await?
            }
            None => self.provider.read(&new_id, req.cookies).await?,
        };

        let existing = req
            .cookies
            .get(&self.config.cookie_name)
            .filter(|cookie| !cookie.value().is_empty());
        let secure = existing
            .as_ref()
            .and_then(|cookie| cookie.secure())
            .unwrap_or_else(|| self.is_secure(req));
        let domain = existing
            .as_ref()
            .and_then(|cookie| cookie.domain().map(str::to_owned))
            .or_else(|| self.config.domain.clone());
        self.set_cookie(req.cookies, &new_id, secure, domain);
        Ok(store)
    }

    /// Destroy the request's session and expire the session cookie. Does nothing if
    /// the request has no session cookie.
    pub async fn destroy(&self, req: &SessionRequest<'_>) -> SessionResult<()> {
        let Some(id) = self.cookie_id(req.cookies)? else {
            return Ok(());
        };
        self.destroy_id(req, &id).await
    }

    /// Destroy the session `id`, expiring the session cookie if one was sent or set
    pub(crate) async fn destroy_id(&self, req: &SessionRequest<'_>, id: &str) -> SessionResult<()> {
        self.provider.destroy(id, req.cookies).await?;

        if req.cookies.get(&self.config.cookie_name).is_some() {
            let mut removal = Cookie::build(self.config.cookie_name.clone())
                .path("/")
                .http_only(true);
            if let Some(domain) = &self.config.domain {
                removal = removal.domain(domain.clone());
            }
            req.cookies.remove(removal);
        }
        rocket::debug!("Destroyed session '{id}'");
        Ok(())
    }

    /// Persist a session store at the end of a request. Returns a cookie that should
    /// be attached to the response, if the provider keeps data on the client.
    pub async fn release(&self, store: &SessionStore) -> SessionResult<Option<Cookie<'static>>> {
        self.provider.release(store).await
    }

    /// Number of sessions tracked by the provider
    pub async fn count(&self) -> SessionResult<usize> {
        self.provider.count().await
    }

    /// Run a single garbage collection sweep, returning the number of evicted sessions
    pub async fn gc(&self) -> usize {
        self.provider.gc().await
    }

    /// Start the periodic garbage collection task, sweeping every `gc_lifetime`
    /// seconds until [`stop_gc`](Self::stop_gc) is called or the manager is dropped.
    /// Must be called within a Tokio runtime. Restarting replaces the previous task.
    pub fn start_gc(&self) {
        let provider = self.provider.clone();
        let period = Duration::from_secs(self.config.gc_lifetime);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        spawn(async move {
            let mut ticker = interval(period);
            loop {
                select! {
                    _ = ticker.tick() => {
                        let evicted = provider.gc().await;
                        if evicted > 0 {
                            rocket::debug!("Session GC evicted {evicted} sessions");
                        }
                    }
                    _ = &mut shutdown_rx => {
                        rocket::debug!("Session GC shutdown");
                        break;
                    }
                }
            }
        });

        let previous = self
            .gc_shutdown
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(shutdown_tx);
        if let Some(previous) = previous {
            let _ = previous.send(());
        }
    }

    /// Stop the periodic garbage collection task, if running
    pub fn stop_gc(&self) {
        let sender = self
            .gc_shutdown
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(tx) = sender {
            let _ = tx.send(());
        }
    }

    /// Stop garbage collection and release the provider's resources
    pub async fn shutdown(&self) -> SessionResult<()> {
        self.stop_gc();
        self.provider.shutdown().await
    }

    fn cookie_id(&self, cookie_jar: &CookieJar<'_>) -> SessionResult<Option<String>> {
        match cookie_jar.get(&self.config.cookie_name) {
            Some(cookie) if !cookie.value().is_empty() => decode_id(cookie.value()).map(Some),
            _ => Ok(None),
        }
    }

    fn is_secure(&self, req: &SessionRequest<'_>) -> bool {
        self.config.secure && req.https
    }

    fn set_cookie(&self, cookie_jar: &CookieJar<'_>, id: &str, secure: bool, domain: Option<String>) {
        if !self.config.enable_set_cookie {
            return;
        }
        let value = RawStr::new(id).percent_encode().as_str().to_owned();
        let mut cookie = Cookie::build((self.config.cookie_name.clone(), value))
            .path("/")
            .http_only(true)
            .secure(secure);
        if let Some(domain) = domain {
            cookie = cookie.domain(domain);
        }
        if self.config.cookie_lifetime > 0 {
            let lifetime = i64::try_from(self.config.cookie_lifetime).unwrap_or(i64::MAX);
            cookie = cookie.expires(
                OffsetDateTime::now_utc().saturating_add(time::Duration::seconds(lifetime)),
            );
        }
        cookie_jar.add(cookie);
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.stop_gc();
    }
}

/// Undo the percent-encoding of a session ID cookie
fn decode_id(value: &str) -> SessionResult<String> {
    RawStr::new(value)
        .percent_decode()
        .map(|id| id.into_owned())
        .map_err(|_| SessionError::InvalidId)
}
