//! # Durable Key/Value Stores
//!
//! Client-side key space that survives restarts, the equivalent of browser
//! local storage. Slots hold whole string values and are never patched in place.
//!
//! - [`MemoryStore`]: process-local, used in tests and for ephemeral sessions
//! - [`FileStore`]: one JSON object on disk, rewritten atomically on every change

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use lib_core::{AppError, Result};
use parking_lot::{Mutex, RwLock};

/// Whole-value string slots keyed by name.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;

    /// Apply several changes as one write; `None` removes the slot.
    ///
    /// Persistent stores override this so that related slots never land on
    /// disk half-updated.
    fn apply(&self, changes: &[(&str, Option<&str>)]) -> Result<()> {
        for (key, value) in changes {
            match value {
                Some(value) => self.set(key, value)?,
                None => self.remove(key)?,
            }
        }
        Ok(())
    }
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.slots.read().contains_key(key)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.slots.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.slots.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.slots.write().remove(key);
        Ok(())
    }
}

/// File-backed store holding every slot in a single JSON object.
///
/// The file is read once on open. Each mutation rewrites it through a
/// sibling temp file and a rename, so a crash leaves either the old or the
/// new contents on disk, never a torn file. A failed write leaves the
/// in-memory slots as they were.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    slots: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// A missing file is an empty store. A file that does not parse is
    /// logged and treated as empty; it is replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let slots = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<HashMap<String, String>>(&raw) {
                Ok(slots) => slots,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Discarding unreadable key/value store file"
                    );
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(AppError::Storage(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        tracing::debug!(path = %path.display(), slots = slots.len(), "Opened key/value store");

        Ok(Self {
            path,
            slots: Mutex::new(slots),
        })
    }

    fn persist(&self, slots: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, serde_json::to_vec_pretty(slots)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.slots.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.apply(&[(key, Some(value))])
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.apply(&[(key, None)])
    }

    fn apply(&self, changes: &[(&str, Option<&str>)]) -> Result<()> {
        let mut slots = self.slots.lock();
        let previous = slots.clone();

        for (key, value) in changes {
            match value {
                Some(value) => {
                    slots.insert(key.to_string(), value.to_string());
                }
                None => {
                    slots.remove(*key);
                }
            }
        }
        if *slots == previous {
            return Ok(());
        }

        if let Err(e) = self.persist(&slots) {
            *slots = previous;
            return Err(e);
        }
        Ok(())
    }
}
