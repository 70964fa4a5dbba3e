#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

/*!
# Overview
Server-side sessions for Rocket applications, backed by pluggable storage providers.

- A [`SessionManager`] owns one configured provider: it extracts or generates
  session IDs, starts, regenerates and destroys sessions, emits the session
  cookie, and periodically garbage-collects expired sessions.
- Providers are chosen by name from a [`ProviderRegistry`] built at startup, so
  the same application can switch between in-memory, file, cookie or Redis
  sessions with a configuration change.
- The [`PluggableSession`] fairing starts the session once per request using Rocket's
  request-local cache, and persists it once at the end of the request.
- Session IDs are generated from the operating system's CSPRNG and hex encoded.

# Usage

## Basic setup

```rust
use rocket::routes;
use rocket_pluggable_session::{PluggableSession, Session};

#[rocket::launch]
fn rocket() -> _ {
    rocket::build()
        // attach the `PluggableSession` fairing (in-memory sessions by default)
        .attach(PluggableSession::default())
        .mount("/", routes![login, profile])
}

// use the `Session` request guard in a route handler
#[rocket::post("/login")]
async fn login(session: Session<'_>) -> &'static str {
    session.regenerate().await.ok();
    session.set("user_id", "123").ok();
    "Logged in"
}

#[rocket::get("/profile")]
fn profile(session: Session) -> String {
    match session.get::<String>("user_id") {
        Some(user_id) => format!("Logged in as user {user_id}"),
        None => "Not logged in".to_owned(),
    }
}
```

## Configuration

The manager is configured with a JSON object, matching what you'd keep in a
configuration file:

| Key | Default | Description |
|-----|---------|-------------|
| `cookieName` | `"SessionId"` | Name of the session cookie, and of the query parameter fallback |
| `enableSetCookie` | `true` | Whether to send the session cookie |
| `gcLifetime` | `3600` | Seconds between garbage collection sweeps |
| `maxLifetime` | `gcLifetime` | Seconds of inactivity before a session expires |
| `secure` | `false` | Mark the cookie `Secure` on HTTPS requests |
| `cookieLifetime` | `0` | Cookie lifetime in seconds (0 = browser session) |
| `providerConfig` | `""` | Provider-specific configuration string |
| `domain` | none | Cookie domain |
| `sessionIDLength` | `16` | Random bytes in generated session IDs |

```rust
use rocket_pluggable_session::PluggableSession;

let fairing = PluggableSession::builder()
    .provider("file")
    .config(r#"{"cookieName":"SID","maxLifetime":1800,"providerConfig":"./sessions"}"#)
    .build();
```

# Providers

| Provider | Name | Feature Flag | Provider config |
|----------|------|--------------|-----------------|
| [`provider::memory::MemoryProvider`] | `memory` | Built-in | (ignored) |
| [`provider::file::FileProvider`] | `file` | Built-in | Directory path |
| [`provider::cookie::CookieProvider`] | `cookie` | `cookie` | JSON with `blockKey`, `hashKey`, `securityName`, `cookieName`, `secure`, `maxAge` |
| [`provider::redis::RedisProvider`] | `redis` | `redis_fred` | `address[,pool_size[,password[,db]]]` or a `redis://` URL |

## Custom providers

To plug in your own storage, implement the [`SessionProvider`](crate::provider::SessionProvider)
trait and register it:

```rust
use rocket::{async_trait, http::{Cookie, CookieJar}};
use rocket_pluggable_session::{
    error::SessionResult, provider::SessionProvider, PluggableSession, ProviderRegistry, SessionStore,
};

pub struct MyProvider {}

#[async_trait]
impl SessionProvider for MyProvider {
    async fn init(&mut self, max_lifetime: u64, config: &str) -> SessionResult<()> {
        // Connect to your storage
        todo!()
    }

    async fn read(&self, id: &str, cookie_jar: &CookieJar<'_>) -> SessionResult<SessionStore> {
        // Load the session, or create an empty one
        todo!()
    }

    async fn exists(&self, id: &str) -> bool { todo!() }

    async fn regenerate(&self, old_id: &str, new_id: &str, cookie_jar: &CookieJar<'_>) -> SessionResult<SessionStore> {
        todo!()
    }

    async fn destroy(&self, id: &str, cookie_jar: &CookieJar<'_>) -> SessionResult<()> { todo!() }

    async fn release(&self, store: &SessionStore) -> SessionResult<Option<Cookie<'static>>> {
        // Save store.snapshot() to your storage
        todo!()
    }

    async fn count(&self) -> SessionResult<usize> { todo!() }

    async fn gc(&self) -> usize { todo!() }
}

let mut registry = ProviderRegistry::with_defaults();
registry.register("mine", MyProvider {});
let fairing = PluggableSession::builder().registry(registry).provider("mine").build();
```

Use [`error::SessionError::Backend`] for errors from your storage backend.

# Feature flags

| Name    | Description    |
|---------|----------------|
| `cookie` | (default) A client-side provider: session data is serialized with serde_json, encrypted and signed into a cookie. |
| `redis_fred`  | A provider for Redis (and Redis-compatible databases), using the [fred.rs](https://docs.rs/crate/fred) crate. |
| `rocket_okapi`  | Enables support for the [rocket_okapi](https://docs.rs/crate/rocket_okapi) crate if needed. |
*/

mod fairing;
mod guard;
mod manager;
mod options;
mod registry;
mod session;
mod store;

pub mod error;
pub mod id;
pub mod provider;
pub use fairing::{PluggableSession, PluggableSessionBuilder, SessionConfig};
pub use guard::get_store;
pub use manager::{SessionManager, SessionRequest};
pub use options::ManagerConfig;
pub use registry::ProviderRegistry;
pub use session::Session;
pub use store::{SessionData, SessionStore};
