use std::{fmt::Display, sync::Arc};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{
    error::{SessionError, SessionResult},
    guard::RequestSession,
    manager::{SessionManager, SessionRequest},
    store::SessionStore,
};

/**
The session of the current request. The session is started once per request
by the [`PluggableSession`](crate::PluggableSession) fairing, so the guard can
be used any number of times during a request and every copy sees the same data.
Changes are persisted by the provider at the end of the request.

The guard only fails (with a 500 status) if the session couldn't be started,
e.g. when the provider backend is unreachable.

# Example
```rust
use rocket_pluggable_session::Session;

#[rocket::post("/visit")]
fn visit(session: Session) -> String {
    let visits = session.get::<u32>("visits").unwrap_or_default() + 1;
    session.set("visits", visits).ok();
    format!("Visit #{visits}")
}

#[rocket::post("/login")]
async fn login(session: Session<'_>) -> &'static str {
    // New ID after privilege changes
    if session.regenerate().await.is_err() {
        return "Login failed";
    }
    session.set("user_id", "123").ok();
    "Logged in"
}
```
*/
pub struct Session<'r> {
    state: &'r RequestSession,
    request: SessionRequest<'r>,
    manager: &'r SessionManager,
}

impl Display for Session<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Session(id: {:?})", self.id())
    }
}

impl<'r> Session<'r> {
    pub(crate) fn new(
        state: &'r RequestSession,
        request: SessionRequest<'r>,
        manager: &'r SessionManager,
    ) -> Self {
        Self {
            state,
            request,
            manager,
        }
    }

    /// Get the session ID. Will be `None` if the session was destroyed.
    pub fn id(&self) -> Option<String> {
        self.state.store().map(|store| store.id().to_owned())
    }

    /// Get a value from the session. Returns `None` if the key is missing, the
    /// value has a different type, or the session was destroyed.
    pub fn get<V: DeserializeOwned>(&self, key: &str) -> Option<V> {
        self.state.store()?.get(key)
    }

    /// Get the raw JSON value of a key
    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.state.store()?.get_value(key)
    }

    /// Set a key in the session
    pub fn set<V: Serialize>(&self, key: &str, value: V) -> SessionResult<()> {
        self.active_store()?.set(key, value)
    }

    /// Delete a key from the session, returning its previous value
    pub fn delete(&self, key: &str) -> Option<Value> {
        self.state.store()?.delete(key)
    }

    /// Remove all keys from the session, keeping the session itself
    pub fn flush(&self) {
        if let Some(store) = self.state.store() {
            store.flush();
        }
    }

    /// Move the session to a newly generated ID, keeping its current data. The new
    /// session cookie is sent with the response.
    pub async fn regenerate(&self) -> SessionResult<()> {
        let previous = self.state.store();
        let store = match &previous {
            Some(previous) => {
                self.manager
                    .regenerate_from(&self.request, Some(previous.id()))
                    .await?
            }
            None => self.manager.regenerate(&self.request).await?,
        };
        if let Some(previous) = previous {
            store.replace(previous.snapshot());
        }
        rocket::debug!("Session regenerated as '{}'", store.id());
        self.state.set_store(Some(Arc::new(store)));
        Ok(())
    }

    /// Destroy the session and expire the session cookie. Setting keys afterwards
    /// fails with [`SessionError::NoSession`].
    pub async fn destroy(&self) -> SessionResult<()> {
        match self.state.store() {
            Some(store) => self.manager.destroy_id(&self.request, store.id()).await?,
            None => self.manager.destroy(&self.request).await?,
        }
        self.state.set_store(None);
        Ok(())
    }

    /// Number of sessions tracked by the provider
    pub async fn count(&self) -> SessionResult<usize> {
        self.manager.count().await
    }

    /// The underlying session store, if the session is active
    pub fn store(&self) -> Option<Arc<SessionStore>> {
        self.state.store()
    }

    /// The error (if any) from starting the session
    pub fn error(&self) -> Option<&SessionError> {
        self.state.error()
    }

    fn active_store(&self) -> SessionResult<Arc<SessionStore>> {
        self.state.store().ok_or(SessionError::NoSession)
    }
}
