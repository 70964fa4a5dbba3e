use std::sync::{Arc, Mutex, OnceLock};

use bon::Builder;
use rocket::{fairing::Fairing, Build, Data, Orbit, Request, Response, Rocket};

use crate::{
    guard::{start_session, RequestSession},
    ManagerConfig, ProviderRegistry, SessionManager,
};

/// Configuration of the session manager: either a JSON string (e.g. read from a config
/// file) or an already built [`ManagerConfig`].
#[derive(Clone, Debug)]
pub enum SessionConfig {
    Json(String),
    Options(ManagerConfig),
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::Options(ManagerConfig::default())
    }
}

impl From<&str> for SessionConfig {
    fn from(json: &str) -> Self {
        Self::Json(json.to_owned())
    }
}

impl From<String> for SessionConfig {
    fn from(json: String) -> Self {
        Self::Json(json)
    }
}

impl From<ManagerConfig> for SessionConfig {
    fn from(config: ManagerConfig) -> Self {
        Self::Options(config)
    }
}

/**
A Rocket fairing that enables sessions backed by a pluggable provider.

On ignite, the fairing builds the [`SessionManager`] from the registry, the
provider name and the configuration, and starts periodic garbage collection.
An unknown provider or invalid configuration aborts the launch.

# Example
```rust
use rocket_pluggable_session::{PluggableSession, ProviderRegistry};

#[rocket::launch]
fn rocket() -> _ {
    // In-memory sessions with default settings
    let session_fairing = PluggableSession::default();

    // Or customize settings with the builder
    let file_sessions = PluggableSession::builder()
        .provider("file")
        .config(r#"{"cookieName":"SID","gcLifetime":600,"providerConfig":"./sessions"}"#)
        .build();

    // Or customize the options via a closure
    let secure_sessions = PluggableSession::builder()
        .registry(ProviderRegistry::with_defaults())
        .with_options(|opt| {
            opt.cookie_name = "my_session".to_owned();
            opt.secure = true;
            opt.cookie_lifetime = 7 * 24 * 60 * 60; // 7 days
        })
        .build();

    rocket::build()
        .attach(session_fairing)
        // ... other configuration ...
}
```
*/
#[derive(Builder)]
pub struct PluggableSession {
    /// Name of the provider to use, as registered in the registry. The default is `memory`.
    #[builder(default = "memory".to_owned(), into)]
    pub(crate) provider: String,
    /// Set the configuration as a JSON string or a [`ManagerConfig`]. Alternatively, use
    /// `with_options` to customize the default options via a closure.
    #[builder(default, into)]
    pub(crate) config: SessionConfig,
    /// Set the registry of available providers. The default contains the built-in providers.
    #[builder(
        default = Mutex::new(Some(ProviderRegistry::with_defaults())),
        with = |registry: ProviderRegistry| Mutex::new(Some(registry))
    )]
    registry: Mutex<Option<ProviderRegistry>>,
    #[builder(skip)]
    manager: OnceLock<Arc<SessionManager>>,
}

impl Default for PluggableSession {
    /// Create a new instance with default options and in-memory sessions.
    fn default() -> Self {
        Self::builder().build()
    }
}

use pluggable_session_builder::{IsUnset, SetConfig, State};
impl<S: State> PluggableSessionBuilder<S> {
    /// Customize the [options](ManagerConfig) via a closure. Any options that are not set will retain their default values.
    pub fn with_options<OptionsFn>(self, options_fn: OptionsFn) -> PluggableSessionBuilder<SetConfig<S>>
    where
        S::Config: IsUnset,
        OptionsFn: FnOnce(&mut ManagerConfig),
    {
        let mut options = ManagerConfig::default();
        options_fn(&mut options);
        self.config(options)
    }
}

#[rocket::async_trait]
impl Fairing for PluggableSession {
    fn info(&self) -> rocket::fairing::Info {
        use rocket::fairing::Kind;
        rocket::fairing::Info {
            name: "Pluggable Session",
            kind: Kind::Ignite | Kind::Request | Kind::Response | Kind::Shutdown | Kind::Singleton,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> Result<Rocket<Build>, Rocket<Build>> {
        rocket::debug!("Setting up session manager with provider '{}'...", self.provider);
        let registry = self.registry.lock().unwrap_or_else(|e| e.into_inner()).take();
        let Some(registry) = registry else {
            rocket::error!("Session fairing was already ignited");
            return Err(rocket);
        };

        let manager = match &self.config {
            SessionConfig::Json(json) => SessionManager::new(registry, &self.provider, json).await,
            SessionConfig::Options(config) => {
                SessionManager::from_config(registry, &self.provider, config.clone()).await
            }
        };
        let manager = match manager {
            Ok(manager) => Arc::new(manager),
            Err(e) => {
                rocket::error!("Failed to set up sessions: {e}");
                return Err(rocket);
            }
        };

        manager.start_gc();
        let _ = self.manager.set(manager.clone());
        Ok(rocket.manage(manager))
    }

    async fn on_request(&self, req: &mut Request<'_>, _data: &mut Data<'_>) {
        let Some(manager) = self.manager.get() else {
            return;
        };
        let req: &Request<'_> = req;
        req.local_cache_async(start_session(manager, req)).await;
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let Some(manager) = self.manager.get() else {
            return;
        };
        let Some(store) = req.local_cache(RequestSession::empty).take() else {
            return;
        };

        rocket::debug!("Releasing session '{}'...", store.id());
        match manager.release(&store).await {
            // Jar changes are already applied to the response at this point
            Ok(Some(data_cookie)) => res.adjoin_header(data_cookie),
            Ok(None) => {}
            Err(e) => rocket::error!("Error while releasing session '{}': {e}", store.id()),
        }
    }

    async fn on_shutdown(&self, _rocket: &Rocket<Orbit>) {
        rocket::debug!("Shutting down session resources...");
        if let Some(manager) = self.manager.get() {
            if let Err(e) = manager.shutdown().await {
                rocket::warn!("Error during session provider shutdown: {e}");
            }
        }
    }
}
