//! File-based session provider

use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::{Duration, SystemTime},
};

use rocket::{
    async_trait,
    http::{Cookie, CookieJar},
    tokio::{fs, sync::Mutex as AsyncMutex},
};

use crate::{
    error::{SessionError, SessionResult},
    id::is_valid_id,
    store::{SessionData, SessionStore},
};

use super::interface::SessionProvider;

/**
Session provider that stores each session as a JSON file in a directory. The
provider configuration string is the path of the directory, which is created
if needed.

The file's modification time tracks the last access of the session, and is
compared against the max lifetime during garbage collection. Access to a single
session file is serialized with a per-session lock, while unrelated sessions
proceed in parallel.

```
use rocket_pluggable_session::{provider::file::FileProvider, ProviderRegistry};

let mut registry = ProviderRegistry::new();
registry.register("file", FileProvider::default());
// Manager config: {"cookieName":"SID","gcLifetime":3600,"providerConfig":"./data/session"}
```
*/
#[derive(Default)]
pub struct FileProvider {
    dir: PathBuf,
    max_lifetime: Duration,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl FileProvider {
    fn session_path(&self, id: &str) -> SessionResult<PathBuf> {
        if !is_valid_id(id) {
            return Err(SessionError::InvalidId);
        }
        Ok(self.dir.join(id))
    }

    fn session_lock(&self, id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(id.to_owned()).or_default().clone()
    }

    /// Drop the lock of a session from the table, unless another task still holds
    /// a handle to it. The caller must have dropped its own handle first.
    fn forget_lock(&self, id: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks.get(id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(id);
        }
    }

    fn is_expired(&self, modified: SystemTime) -> bool {
        modified.elapsed().unwrap_or_default() > self.max_lifetime
    }

    /// Modification time of a session file, or `None` if the file doesn't exist
    async fn modified(&self, path: &Path) -> SessionResult<Option<SystemTime>> {
        match fs::metadata(path).await {
            Ok(metadata) => Ok(Some(metadata.modified()?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a temp file left behind by an interrupted write. Holding the
    /// session's lock means no write is in progress.
    async fn remove_stale_write(&self, id: &str, path: &Path) {
        let lock = self.session_lock(id);
        let guard = lock.lock().await;
        match remove_if_exists(path).await {
            Ok(()) => rocket::debug!("Session GC removed stale temp file {:?}", path),
            Err(e) => rocket::warn!("Session GC failed to remove {:?}: {}", path, e),
        }
        drop(guard);
        drop(lock);
        self.forget_lock(id);
    }

    async fn write_session(&self, path: &Path, data: &SessionData) -> SessionResult<()> {
        let contents = serde_json::to_vec(data)?;
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, contents).await?;
        fs::rename(&tmp_path, path).await?;
        Ok(())
    }
}

/// Remove a file, treating a missing file as already removed
async fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path).await {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Update the modification time of a file to now
async fn touch(path: &Path) -> std::io::Result<()> {
    let file = fs::OpenOptions::new().write(true).open(path).await?;
    file.into_std().await.set_modified(SystemTime::now())
}

#[async_trait]
impl SessionProvider for FileProvider {
    async fn init(&mut self, max_lifetime: u64, config: &str) -> SessionResult<()> {
        let dir = config.trim();
        if dir.is_empty() {
            return Err(SessionError::Config(
                "file provider needs a directory in `providerConfig`".to_owned(),
            ));
        }
        fs::create_dir_all(dir).await?;
        self.dir = PathBuf::from(dir);
        self.max_lifetime = Duration::from_secs(max_lifetime);
        Ok(())
    }

    async fn read(&self, id: &str, _cookie_jar: &CookieJar<'_>) -> SessionResult<SessionStore> {
        let path = self.session_path(id)?;
        let lock = self.session_lock(id);
        let _guard = lock.lock().await;

        match self.modified(&path).await? {
            Some(modified) if !self.is_expired(modified) => {
                let contents = fs::read(&path).await?;
                let data: SessionData = if contents.is_empty() {
                    SessionData::new()
                } else {
                    serde_json::from_slice(&contents)?
                };
                touch(&path).await?;
                Ok(SessionStore::new(id, data))
            }
            _ => {
                let data = SessionData::new();
                self.write_session(&path, &data).await?;
                Ok(SessionStore::new(id, data))
            }
        }
    }

    async fn exists(&self, id: &str) -> bool {
        let Ok(path) = self.session_path(id) else {
            return false;
        };
        match self.modified(&path).await {
            Ok(Some(modified)) => !self.is_expired(modified),
            Ok(None) => false,
            Err(e) => {
                rocket::warn!("Error while checking session file {:?}: {}", path, e);
                false
            }
        }
    }

    async fn regenerate(
        &self,
        old_id: &str,
        new_id: &str,
        cookie_jar: &CookieJar<'_>,
    ) -> SessionResult<SessionStore> {
        let old_path = self.session_path(old_id)?;
        let new_path = self.session_path(new_id)?;
        {
            let lock = self.session_lock(old_id);
            let _guard = lock.lock().await;
            match self.modified(&old_path).await? {
                Some(modified) if self.is_expired(modified) => {
                    rocket::debug!("Session '{old_id}' expired, not carrying its data over");
                    remove_if_exists(&old_path).await?;
                }
                Some(_) => match fs::rename(&old_path, &new_path).await {
                    Ok(()) => touch(&new_path).await?,
                    Err(e) if e.kind() == ErrorKind::NotFound => (),
                    Err(e) => return Err(e.into()),
                },
                None => (),
            }
        }
        self.forget_lock(old_id);
        self.read(new_id, cookie_jar).await
    }

    async fn destroy(&self, id: &str, _cookie_jar: &CookieJar<'_>) -> SessionResult<()> {
        let Ok(path) = self.session_path(id) else {
            return Ok(());
        };
        {
            let lock = self.session_lock(id);
            let _guard = lock.lock().await;
            remove_if_exists(&path).await?;
        }
        self.forget_lock(id);
        Ok(())
    }

    async fn release(&self, store: &SessionStore) -> SessionResult<Option<Cookie<'static>>> {
        let path = self.session_path(store.id())?;
        let lock = self.session_lock(store.id());
        let _guard = lock.lock().await;
        self.write_session(&path, &store.snapshot()).await?;
        Ok(None)
    }

    async fn count(&self) -> SessionResult<usize> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut count = 0;
        while let Some(entry) = entries.next_entry().await? {
            let is_session = entry.file_name().to_str().is_some_and(is_valid_id);
            if is_session && entry.file_type().await?.is_file() {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn gc(&self) -> usize {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                rocket::error!("Session GC couldn't read directory {:?}: {}", self.dir, e);
                return 0;
            }
        };

        let mut evicted = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    rocket::warn!("Session GC failed to read directory entry: {}", e);
                    break;
                }
            };
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            let path = entry.path();
            if let Some(id) = name.strip_suffix(".tmp").filter(|id| is_valid_id(id)) {
                self.remove_stale_write(id, &path).await;
                continue;
            }
            let id = name;
            if !is_valid_id(&id) {
                continue;
            }

            let lock = self.session_lock(&id);
            let guard = lock.lock().await;
            let expired = match self.modified(&path).await {
                Ok(Some(modified)) => self.is_expired(modified),
                Ok(None) => false,
                Err(e) => {
                    rocket::warn!("Session GC failed to inspect {:?}: {}", path, e);
                    false
                }
            };
            if expired {
                match fs::remove_file(&path).await {
                    Ok(()) => evicted += 1,
                    Err(e) if e.kind() == ErrorKind::NotFound => (),
                    Err(e) => rocket::warn!("Session GC failed to remove {:?}: {}", path, e),
                }
            }
            drop(guard);
            drop(lock);
            self.forget_lock(&id);
        }
        evicted
    }
}
