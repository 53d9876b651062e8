use crate::constants::{TOKEN_KEY, USER_KEY};
use crate::types::{Result, Session};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Key-value persistence used for session bootstrap. The chat core only
/// ever reads the token through this; it never inspects the user record.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// In-memory store for tests and one-shot invocations.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }
}

/// JSON-file-backed store; the terminal analogue of the web client's
/// localStorage. Every mutation is flushed to disk immediately.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!("session file {} is corrupt ({}); resetting", path.display(), e);
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn persist(&self, entries: &HashMap<String, String>) {
        let raw = match serde_json::to_string_pretty(entries) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("failed to serialize session store: {}", e);
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, raw) {
            tracing::warn!("failed to persist session store {}: {}", self.path.display(), e);
        }
    }
}

impl SessionStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
            self.persist(&entries);
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
            self.persist(&entries);
        }
    }
}

/// Restores a session saved by a previous run, if both keys are present
/// and the user record still parses.
pub fn load_session(store: &dyn SessionStore) -> Option<Session> {
    let token = store.get(TOKEN_KEY)?;
    let user = serde_json::from_str(&store.get(USER_KEY)?).ok()?;
    Some(Session { token, user })
}

pub fn save_session(store: &dyn SessionStore, session: &Session) -> Result<()> {
    store.set(TOKEN_KEY, &session.token);
    store.set(USER_KEY, &serde_json::to_string(&session.user)?);
    Ok(())
}

pub fn clear_session(store: &dyn SessionStore) {
    store.remove(TOKEN_KEY);
    store.remove(USER_KEY);
}
