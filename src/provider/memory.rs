//! In-memory session provider

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use rocket::{
    async_trait,
    http::{Cookie, CookieJar},
    tokio::sync::RwLock,
};

use crate::{
    error::SessionResult,
    store::{SessionData, SessionStore},
};

use super::interface::SessionProvider;

/// A session entry along with the last time it was accessed
struct MemoryEntry {
    data: SessionData,
    last_access: Instant,
}

/// In-memory session provider. This is designed mostly for local development and
/// single-process deployments - sessions are lost on restart.
///
/// All sessions live in a single map guarded by one read/write lock. Garbage
/// collection walks the whole map and removes sessions that haven't been
/// accessed within the max lifetime. The provider configuration string is ignored.
#[derive(Default)]
pub struct MemoryProvider {
    max_lifetime: Duration,
    sessions: RwLock<HashMap<String, MemoryEntry>>,
}

impl MemoryProvider {
    fn is_expired(&self, entry: &MemoryEntry) -> bool {
        entry.last_access.elapsed() > self.max_lifetime
    }
}

#[async_trait]
impl SessionProvider for MemoryProvider {
    async fn init(&mut self, max_lifetime: u64, _config: &str) -> SessionResult<()> {
        self.max_lifetime = Duration::from_secs(max_lifetime);
        Ok(())
    }

    async fn read(&self, id: &str, _cookie_jar: &CookieJar<'_>) -> SessionResult<SessionStore> {
        let mut sessions = self.sessions.write().await;
        let max_lifetime = self.max_lifetime;
        let entry = sessions.entry(id.to_owned()).or_insert_with(|| MemoryEntry {
            data: SessionData::new(),
            last_access: Instant::now(),
        });
        if entry.last_access.elapsed() > max_lifetime {
            rocket::debug!("Session '{id}' expired before GC, starting over");
            entry.data.clear();
        }
        entry.last_access = Instant::now();
        Ok(SessionStore::new(id, entry.data.clone()))
    }

    async fn exists(&self, id: &str) -> bool {
        self.sessions
            .read()
            .await
            .get(id)
            .is_some_and(|entry| !self.is_expired(entry))
    }

    async fn regenerate(
        &self,
        old_id: &str,
        new_id: &str,
        cookie_jar: &CookieJar<'_>,
    ) -> SessionResult<SessionStore> {
        {
            let mut sessions = self.sessions.write().await;
            match sessions.remove(old_id) {
                Some(entry) if self.is_expired(&entry) => {
                    rocket::debug!("Session '{old_id}' expired, not carrying its data over");
                }
                Some(entry) => {
                    sessions.insert(
                        new_id.to_owned(),
                        MemoryEntry {
                            data: entry.data,
                            last_access: Instant::now(),
                        },
                    );
                }
                None => (),
            }
        }
        self.read(new_id, cookie_jar).await
    }

    async fn destroy(&self, id: &str, _cookie_jar: &CookieJar<'_>) -> SessionResult<()> {
        self.sessions.write().await.remove(id);
        Ok(())
    }

    async fn release(&self, store: &SessionStore) -> SessionResult<Option<Cookie<'static>>> {
        self.sessions.write().await.insert(
            store.id().to_owned(),
            MemoryEntry {
                data: store.snapshot(),
                last_access: Instant::now(),
            },
        );
        Ok(None)
    }

    async fn count(&self) -> SessionResult<usize> {
        Ok(self.sessions.read().await.len())
    }

    async fn gc(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_access.elapsed() <= self.max_lifetime);
        before - sessions.len()
    }
}
