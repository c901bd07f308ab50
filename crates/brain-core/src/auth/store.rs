use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use chrono::Duration;
use tracing::{debug, info, warn};

use super::session::{Session, SessionRecord};

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Somewhere to keep the serialized session record between runs.
///
/// Backends only move opaque documents around; parsing and the
/// partial-record rule live in [`SessionRecord::into_session`].
pub trait SessionStorage: Send + Sync {
    fn load(&self) -> Result<Option<String>>;
    fn save(&self, contents: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// JSON file in the cache directory.
pub struct FileStorage {
    cache_dir: PathBuf,
}

impl FileStorage {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    pub fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }
}

impl SessionStorage for FileStorage {
    fn load(&self) -> Result<Option<String>> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read session file")?;
        Ok(Some(contents))
    }

    fn save(&self, contents: &str) -> Result<()> {
        let path = self.session_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Rename over the old file so readers never see a torn record
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, contents).context("Failed to write session file")?;
        std::fs::rename(&tmp, &path).context("Failed to replace session file")?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// Process-local storage. Clones share the same slot.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw stored document, if any
    pub fn contents(&self) -> Option<String> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl SessionStorage for MemoryStorage {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.contents())
    }

    fn save(&self, contents: &str) -> Result<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(contents.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// The current session and its persisted mirror.
///
/// Reads are open to everyone; writes go through the session authority.
/// The lock is only ever held for synchronous work, never across an await.
pub struct TokenStore {
    session: Mutex<Session>,
    storage: Box<dyn SessionStorage>,
}

impl TokenStore {
    pub fn new(storage: Box<dyn SessionStorage>) -> Self {
        Self {
            session: Mutex::new(Session::default()),
            storage,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load the persisted record into memory.
    /// Returns true if a complete session was found.
    pub fn restore(&self) -> bool {
        let contents = match self.storage.load() {
            Ok(Some(contents)) => contents,
            Ok(None) => {
                debug!("No persisted session");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "Failed to load persisted session");
                return false;
            }
        };

        let record: SessionRecord = match serde_json::from_str(&contents) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Failed to parse persisted session");
                return false;
            }
        };

        match record.into_session() {
            Some(restored) => {
                let mut session = self.lock();
                let tab_active = session.tab_active;
                *session = Session {
                    tab_active,
                    ..restored
                };
                info!(
                    expires_at = ?session.expires_at,
                    remember = session.remember,
                    "Restored session from storage"
                );
                true
            }
            None => false,
        }
    }

    /// Copy of the current session
    pub fn snapshot(&self) -> Session {
        self.lock().clone()
    }

    /// Get the bearer token if a session exists
    pub fn access_token(&self) -> Option<String> {
        let session = self.lock();
        session.has_token().then(|| session.access_token.clone())
    }

    pub fn has_token(&self) -> bool {
        self.lock().has_token()
    }

    /// Check if session is valid (token present and not expired)
    pub fn is_authenticated(&self) -> bool {
        self.lock().is_authenticated()
    }

    pub fn time_until_expiry(&self) -> Duration {
        self.lock().time_until_expiry()
    }

    /// Replace the whole session and persist it.
    pub(crate) fn replace(&self, session: Session) {
        let mut current = self.lock();
        *current = session;
        self.persist(&*current);
    }

    /// Mutate the session in place and persist the result.
    pub(crate) fn update<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Session) -> R,
    {
        let mut current = self.lock();
        let result = f(&mut *current);
        self.persist(&*current);
        result
    }

    /// Flip the runtime-only foreground flag. Nothing is persisted.
    pub(crate) fn set_tab_active(&self, active: bool) {
        self.lock().tab_active = active;
    }

    /// Zero the session and remove the persisted record.
    pub(crate) fn clear(&self) {
        self.lock().reset();
        if let Err(e) = self.storage.clear() {
            warn!(error = %e, "Failed to clear persisted session");
        }
    }

    fn persist(&self, session: &Session) {
        if !session.has_token() {
            if let Err(e) = self.storage.clear() {
                warn!(error = %e, "Failed to clear persisted session");
            }
            return;
        }
        let record = SessionRecord::from_session(session);
        let result = serde_json::to_string_pretty(&record)
            .context("Failed to serialize session")
            .and_then(|contents| self.storage.save(&contents));
        if let Err(e) = result {
            warn!(error = %e, "Failed to save session");
        }
    }
}
