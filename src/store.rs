use std::{
    collections::HashMap,
    fmt::Display,
    sync::{Mutex, MutexGuard},
};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::SessionResult;

/// Key/value data held by a session
pub type SessionData = HashMap<String, Value>;

/**
The data handle for one session, obtained from a provider for the duration
of a request. Every operation takes the store's own lock, so a store shared
by concurrent requests with the same session ID stays consistent, but there
is no transaction spanning multiple keys.

Changes are only persisted once the store is released back to its provider
at the end of the request.

# Example
```
use rocket_pluggable_session::SessionStore;

let store = SessionStore::new("abc123", Default::default());
store.set("user_id", 42).unwrap();
assert_eq!(store.get::<u32>("user_id"), Some(42));
store.delete("user_id");
assert!(store.is_empty());
```
*/
#[derive(Debug)]
pub struct SessionStore {
    id: String,
    values: Mutex<SessionData>,
}

impl Display for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "SessionStore(id: {:?})", self.id)
    }
}

impl SessionStore {
    /// Create a store for the given session ID and data
    pub fn new(id: &str, data: SessionData) -> Self {
        Self {
            id: id.to_owned(),
            values: Mutex::new(data),
        }
    }

    /// The session ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get a value, deserialized into the requested type. Returns `None` if the key
    /// is missing or the value has a different shape.
    pub fn get<V: DeserializeOwned>(&self, key: &str) -> Option<V> {
        self.get_value(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Get the raw JSON value of a key
    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    /// Set a key. Fails only if the value can't be serialized.
    pub fn set<V: Serialize>(&self, key: &str, value: V) -> SessionResult<()> {
        let value = serde_json::to_value(value)?;
        self.lock().insert(key.to_owned(), value);
        Ok(())
    }

    /// Delete a key, returning its previous value
    pub fn delete(&self, key: &str) -> Option<Value> {
        self.lock().remove(key)
    }

    /// Remove all keys from the session
    pub fn flush(&self) {
        self.lock().clear();
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Clone of the current data, used by providers when persisting the session
    pub fn snapshot(&self) -> SessionData {
        self.lock().clone()
    }

    /// Replace all data of the session
    pub(crate) fn replace(&self, data: SessionData) {
        *self.lock() = data;
    }

    fn lock(&self) -> MutexGuard<'_, SessionData> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
