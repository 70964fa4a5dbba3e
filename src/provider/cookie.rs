//! Cookie-based session provider

mod codec;
pub use codec::CookieCodec;

use std::sync::Arc;

use rocket::{
    async_trait,
    http::{Cookie, CookieJar},
    time::{Duration, OffsetDateTime},
};
use serde::Deserialize;

use crate::{
    error::{SessionError, SessionResult},
    store::SessionStore,
};

use super::interface::SessionProvider;

/// Callback invoked when an inbound session cookie can't be decoded
type DecodeHook = Arc<dyn Fn(&SessionError) + Send + Sync>;

/**
Session provider that keeps the whole session on the client. All session data is
serialized to JSON, then encrypted and signed with [`CookieCodec`] into the value
of a data cookie. There is no server-side record: sessions always exist, can't be
counted, and are never garbage collected. Keep in mind that cookies are limited to
4KB in size, so session data should be kept as small as possible.

# Configuration
The provider configuration string is a JSON object:
- `blockKey` - encryption key. A random key is generated at startup if missing.
- `hashKey` (or `securityKey`) - authentication key. Random if missing.
- `securityName` - the name payloads are bound to. Random if missing.
- `cookieName` - name of the data cookie. **This should be a different name from
  the session ID cookie.** (default: `"session_data"`)
- `secure` - the data cookie's `Secure` attribute (default: `false`)
- `maxAge` - lifetime of the data cookie in seconds, 0 for a browser-session cookie

Randomly generated keys change on every restart, which makes cookies from a previous
process unreadable. Set both keys for sessions that should survive restarts.

An inbound cookie that fails authentication, or is older than the max lifetime,
silently results in an empty session. Use [`with_decode_hook`](CookieProvider::with_decode_hook)
to observe these failures.

```
use rocket_pluggable_session::{provider::cookie::CookieProvider, ProviderRegistry};

let provider = CookieProvider::default().with_decode_hook(|error| {
    eprintln!("rejected session cookie: {error}");
});
let mut registry = ProviderRegistry::new();
registry.register("cookie", provider);
```
*/
pub struct CookieProvider {
    max_lifetime: u64,
    options: CookieProviderOptions,
    codec: CookieCodec,
    decode_hook: Option<DecodeHook>,
}

/// Options for the data cookie, parsed from the provider configuration
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CookieProviderOptions {
    block_key: String,
    #[serde(alias = "securityKey")]
    hash_key: String,
    security_name: String,
    cookie_name: String,
    secure: bool,
    max_age: u64,
}

impl Default for CookieProviderOptions {
    fn default() -> Self {
        Self {
            block_key: String::new(),
            hash_key: String::new(),
            security_name: String::new(),
            cookie_name: "session_data".to_owned(),
            secure: false,
            max_age: 0,
        }
    }
}

impl Default for CookieProvider {
    fn default() -> Self {
        Self {
            max_lifetime: 0,
            options: CookieProviderOptions::default(),
            codec: CookieCodec::new(&random_key(), &random_key(), &hex::encode(random_key())),
            decode_hook: None,
        }
    }
}

fn random_key() -> [u8; 32] {
    rand::random()
}

fn key_or_random(configured: &str, field: &str) -> Vec<u8> {
    if configured.is_empty() {
        rocket::warn!("No cookie session `{field}` configured, generating a random one");
        random_key().to_vec()
    } else {
        configured.as_bytes().to_vec()
    }
}

impl CookieProvider {
    /// Set a callback that is invoked whenever an inbound data cookie is rejected
    /// (e.g. [`SessionError::Authentication`] or [`SessionError::Expired`]).
    pub fn with_decode_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&SessionError) + Send + Sync + 'static,
    {
        self.decode_hook = Some(Arc::new(hook));
        self
    }

    fn data_cookie(&self, value: String) -> Cookie<'static> {
        let mut cookie = Cookie::build((self.options.cookie_name.clone(), value))
            .path("/")
            .http_only(true)
            .secure(self.options.secure);
        if self.options.max_age > 0 {
            let max_age = i64::try_from(self.options.max_age).unwrap_or(i64::MAX);
            cookie = cookie
                .expires(OffsetDateTime::now_utc().saturating_add(Duration::seconds(max_age)));
        }
        cookie.build()
    }
}

#[async_trait]
impl SessionProvider for CookieProvider {
    async fn init(&mut self, max_lifetime: u64, config: &str) -> SessionResult<()> {
        let mut options: CookieProviderOptions = if config.trim().is_empty() {
            CookieProviderOptions::default()
        } else {
            serde_json::from_str(config)
                .map_err(|e| SessionError::Config(format!("cookie provider config: {e}")))?
        };
        if options.cookie_name.is_empty() {
            return Err(SessionError::Config(
                "cookie provider needs a non-empty `cookieName`".to_owned(),
            ));
        }

        let block_key = key_or_random(&options.block_key, "blockKey");
        let hash_key = key_or_random(&options.hash_key, "hashKey");
        if options.security_name.is_empty() {
            options.security_name = hex::encode(random_key());
        }

        self.codec = CookieCodec::new(&block_key, &hash_key, &options.security_name);
        self.max_lifetime = max_lifetime;
        self.options = options;
        Ok(())
    }

    async fn read(&self, id: &str, cookie_jar: &CookieJar<'_>) -> SessionResult<SessionStore> {
        let Some(cookie) = cookie_jar.get(&self.options.cookie_name) else {
            return Ok(SessionStore::new(id, Default::default()));
        };
        match self.codec.decode(cookie.value(), self.max_lifetime) {
            Ok(data) => Ok(SessionStore::new(id, data)),
            Err(e) => {
                rocket::warn!("Discarding session cookie data: {}", e);
                if let Some(hook) = &self.decode_hook {
                    hook(&e);
                }
                Ok(SessionStore::new(id, Default::default()))
            }
        }
    }

    async fn exists(&self, _id: &str) -> bool {
        true
    }

    async fn regenerate(
        &self,
        _old_id: &str,
        new_id: &str,
        cookie_jar: &CookieJar<'_>,
    ) -> SessionResult<SessionStore> {
        self.read(new_id, cookie_jar).await
    }

    async fn destroy(&self, _id: &str, cookie_jar: &CookieJar<'_>) -> SessionResult<()> {
        cookie_jar.remove(Cookie::build(self.options.cookie_name.clone()).path("/"));
        Ok(())
    }

    async fn release(&self, store: &SessionStore) -> SessionResult<Option<Cookie<'static>>> {
        let value = self.codec.encode(&store.snapshot())?;
        Ok(Some(self.data_cookie(value)))
    }

    async fn count(&self) -> SessionResult<usize> {
        Ok(0)
    }

    async fn gc(&self) -> usize {
        0
    }
}
