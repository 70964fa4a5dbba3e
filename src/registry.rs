use std::collections::HashMap;

use crate::provider::{file::FileProvider, memory::MemoryProvider, SessionProvider};

/**
The set of session providers available to a [`SessionManager`](crate::SessionManager),
keyed by the name used in configuration.

The host application builds the registry once at startup and hands it to the
manager, which takes the configured provider out of it.

```
use rocket_pluggable_session::{provider::memory::MemoryProvider, ProviderRegistry};

let mut registry = ProviderRegistry::with_defaults();
registry.register("scratch", MemoryProvider::default());
assert!(registry.lookup("memory").is_some());
assert!(registry.lookup("scratch").is_some());
```
*/
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Box<dyn SessionProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in providers: `memory`, `file`, and
    /// `cookie` / `redis` when their features are enabled.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("memory", MemoryProvider::default());
        registry.register("file", FileProvider::default());
        #[cfg(feature = "cookie")]
        registry.register("cookie", crate::provider::cookie::CookieProvider::default());
        #[cfg(feature = "redis_fred")]
        registry.register("redis", crate::provider::redis::RedisProvider::default());
        registry
    }

    /// Make a provider available under the given name.
    ///
    /// # Panics
    /// Registering an empty name, or a name that is already taken, is a programming
    /// error and panics.
    pub fn register(&mut self, name: &str, provider: impl SessionProvider + 'static) -> &mut Self {
        if name.is_empty() {
            panic!("session: provider registered with an empty name");
        }
        if self.providers.contains_key(name) {
            panic!("session: provider {name:?} registered twice");
        }
        self.providers.insert(name.to_owned(), Box::new(provider));
        self
    }

    /// Look up a provider by name
    pub fn lookup(&self, name: &str) -> Option<&dyn SessionProvider> {
        self.providers.get(name).map(|provider| provider.as_ref())
    }

    /// Names of all registered providers
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub(crate) fn take(&mut self, name: &str) -> Option<Box<dyn SessionProvider>> {
        self.providers.remove(name)
    }
}
