use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use evernote_core::PREFERENCE_PREFIX;
use portfolio_logging::{portfolio_debug, portfolio_warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::persist::{AtomicFile, PersistError};

#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("failed to parse preferences in {path}: {message}")]
    Parse { path: String, message: String },
    #[error("failed to serialize preferences: {0}")]
    Serialize(String),
    #[error("preference store lock poisoned")]
    Poisoned,
}

/// Per-user key/value settings owned by the host. No transactions.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, user_id: &str, name: &str) -> Result<Option<String>, PreferenceError>;
    fn set(&self, user_id: &str, name: &str, value: &str) -> Result<(), PreferenceError>;
    fn clear(&self, user_id: &str, name: &str) -> Result<(), PreferenceError>;
}

/// Full preference name for one of this plugin's fields, e.g. `evernote_accesstoken`.
pub fn preference_name(field: &str) -> String {
    format!("{PREFERENCE_PREFIX}{field}")
}

type UserPreferences = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    users: Mutex<UserPreferences>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, user_id: &str, name: &str) -> Result<Option<String>, PreferenceError> {
        let users = self.users.lock().map_err(|_| PreferenceError::Poisoned)?;
        Ok(users.get(user_id).and_then(|prefs| prefs.get(name)).cloned())
    }

    fn set(&self, user_id: &str, name: &str, value: &str) -> Result<(), PreferenceError> {
        let mut users = self.users.lock().map_err(|_| PreferenceError::Poisoned)?;
        users
            .entry(user_id.to_string())
            .or_default()
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&self, user_id: &str, name: &str) -> Result<(), PreferenceError> {
        let mut users = self.users.lock().map_err(|_| PreferenceError::Poisoned)?;
        if let Some(prefs) = users.get_mut(user_id) {
            prefs.remove(name);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PersistedPreferences {
    users: UserPreferences,
}

/// Preferences kept in a single RON file, rewritten atomically on every change.
#[derive(Debug)]
pub struct RonFilePreferenceStore {
    file: AtomicFile,
    lock: Mutex<()>,
}

impl RonFilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: AtomicFile::new(path),
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<PersistedPreferences, PreferenceError> {
        let path = self.file.path();
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PersistedPreferences::default());
            }
            Err(err) => return Err(err.into()),
        };

        // A store that rewrites the whole file must not start over from an
        // unreadable one; other users' tokens live in it too.
        ron::from_str(&content).map_err(|err| {
            portfolio_warn!("Failed to parse preferences from {:?}: {}", path, err);
            PreferenceError::Parse {
                path: path.display().to_string(),
                message: err.to_string(),
            }
        })
    }

    fn save(&self, prefs: &PersistedPreferences) -> Result<(), PreferenceError> {
        let pretty = ron::ser::PrettyConfig::new();
        let content = ron::ser::to_string_pretty(prefs, pretty)
            .map_err(|err| PreferenceError::Serialize(err.to_string()))?;
        self.file.write(&content)?;
        portfolio_debug!("Saved preferences to {:?}", self.file.path());
        Ok(())
    }

    fn modify(
        &self,
        change: impl FnOnce(&mut UserPreferences),
    ) -> Result<(), PreferenceError> {
        let _guard = self.lock.lock().map_err(|_| PreferenceError::Poisoned)?;
        let mut prefs = self.load()?;
        change(&mut prefs.users);
        self.save(&prefs)
    }
}

impl PreferenceStore for RonFilePreferenceStore {
    fn get(&self, user_id: &str, name: &str) -> Result<Option<String>, PreferenceError> {
        let _guard = self.lock.lock().map_err(|_| PreferenceError::Poisoned)?;
        let prefs = self.load()?;
        Ok(prefs
            .users
            .get(user_id)
            .and_then(|user| user.get(name))
            .cloned())
    }

    fn set(&self, user_id: &str, name: &str, value: &str) -> Result<(), PreferenceError> {
        self.modify(|users| {
            users
                .entry(user_id.to_string())
                .or_default()
                .insert(name.to_string(), value.to_string());
        })
    }

    fn clear(&self, user_id: &str, name: &str) -> Result<(), PreferenceError> {
        self.modify(|users| {
            if let Some(user) = users.get_mut(user_id) {
                user.remove(name);
                if user.is_empty() {
                    users.remove(user_id);
                }
            }
        })
    }
}
