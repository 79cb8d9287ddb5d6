//! Persistent session slot for resumption across restarts.
//!
//! Each client installation keeps exactly one stored session as a JSON file.
//! The slot is overwritten on every successful connect, cleared on explicit
//! logout or a confirmed-stale resume, and ignored once it is older than the
//! validity window.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use protocol::Pin;

/// How long a stored session stays eligible for auto-resume.
pub const SESSION_VALIDITY: Duration = Duration::from_secs(15 * 24 * 60 * 60);

/// Errors from reading or writing the session slot.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure around the slot file.
    #[error("session store IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The slot could not be serialized.
    #[error("session store encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The persisted session slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    /// The session PIN.
    pub pin: Pin,
    /// The shared root; present on host installations only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_path: Option<PathBuf>,
    /// When the slot was written, as Unix epoch milliseconds.
    pub saved_at_ms: u64,
}

impl StoredSession {
    /// Builds a slot stamped with the current time.
    pub fn new(pin: Pin, root_path: Option<PathBuf>) -> Self {
        Self {
            pin,
            root_path,
            saved_at_ms: now_epoch_ms(),
        }
    }

    /// Whether the slot has outlived the validity window at `now_ms`.
    ///
    /// A slot saved exactly at the boundary is expired; one millisecond
    /// short of it is still valid.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        let age_ms = now_ms.saturating_sub(self.saved_at_ms);
        age_ms >= SESSION_VALIDITY.as_millis() as u64
    }
}

/// Versioned on-disk wrapper, for future format changes.
#[derive(Debug, Serialize, Deserialize)]
struct StoreData {
    version: u32,
    session: StoredSession,
}

/// Single-slot JSON persistence for one client installation.
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Creates a store persisting at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Creates a store at the default per-role location,
    /// `~/.config/pinport/{role}_session.json`.
    pub fn with_default_path(role: &str) -> Self {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(base.join("pinport").join(format!("{role}_session.json")))
    }

    /// The slot file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the raw slot, ignoring the validity window.
    ///
    /// A missing or unreadable slot is treated as absent; a corrupt slot is
    /// logged and treated as absent rather than failing startup.
    pub fn load(&self) -> Option<StoredSession> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read session slot");
                return None;
            }
        };

        match serde_json::from_str::<StoreData>(&contents) {
            Ok(data) => Some(data.session),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring corrupt session slot");
                None
            }
        }
    }

    /// Reads the slot, applying the 15-day validity window.
    ///
    /// Expired slots are treated as absent.
    pub fn load_valid(&self) -> Option<StoredSession> {
        let session = self.load()?;
        if session.is_expired_at(now_epoch_ms()) {
            debug!(pin = %session.pin, "stored session expired");
            return None;
        }
        Some(session)
    }

    /// Writes the slot, overwriting any previous one.
    pub fn save(&self, session: &StoredSession) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let data = StoreData {
            version: 1,
            session: session.clone(),
        };
        let contents = serde_json::to_string_pretty(&data)?;
        fs::write(&self.path, contents).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;

        debug!(path = %self.path.display(), pin = %session.pin, "saved session slot");
        Ok(())
    }

    /// Removes the slot. Removing an absent slot is not an error.
    pub fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "cleared session slot");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> SessionStore {
        SessionStore::new(dir.path().join("session.json"))
    }

    fn pin() -> Pin {
        Pin::parse("482913").unwrap()
    }

    #[test]
    fn test_load_absent_slot() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(store.load().is_none());
        assert!(store.load_valid().is_none());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let session = StoredSession::new(pin(), Some(PathBuf::from("/share")));
        store.save(&session).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, session);
        assert!(store.load_valid().is_some());
    }

    #[test]
    fn test_save_overwrites_previous_slot() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store
            .save(&StoredSession::new(pin(), Some(PathBuf::from("/old"))))
            .unwrap();
        store
            .save(&StoredSession::new(
                Pin::parse("111111").unwrap(),
                Some(PathBuf::from("/new")),
            ))
            .unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.pin.as_str(), "111111");
        assert_eq!(loaded.root_path.as_deref(), Some(Path::new("/new")));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.save(&StoredSession::new(pin(), None)).unwrap();
        store.clear().unwrap();
        assert!(store.load().is_none());
        // Clearing an absent slot succeeds.
        store.clear().unwrap();
    }

    #[test]
    fn test_corrupt_slot_treated_as_absent() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        fs::write(store.path(), "{definitely not json").unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn test_validity_boundary() {
        let validity_ms = SESSION_VALIDITY.as_millis() as u64;
        let now = now_epoch_ms();

        // One millisecond short of the window: still valid.
        let fresh = StoredSession {
            pin: pin(),
            root_path: None,
            saved_at_ms: now - (validity_ms - 1),
        };
        assert!(!fresh.is_expired_at(now));

        // Exactly at the window: expired.
        let boundary = StoredSession {
            pin: pin(),
            root_path: None,
            saved_at_ms: now - validity_ms,
        };
        assert!(boundary.is_expired_at(now));

        // Well past the window: expired.
        let stale = StoredSession {
            pin: pin(),
            root_path: None,
            saved_at_ms: now - validity_ms * 2,
        };
        assert!(stale.is_expired_at(now));
    }

    #[test]
    fn test_expired_slot_not_loaded() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let mut session = StoredSession::new(pin(), None);
        session.saved_at_ms = now_epoch_ms() - SESSION_VALIDITY.as_millis() as u64 - 1;
        store.save(&session).unwrap();

        // Raw load still sees it; validity-checked load does not.
        assert!(store.load().is_some());
        assert!(store.load_valid().is_none());
    }

    #[test]
    fn test_viewer_slot_has_no_root() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.save(&StoredSession::new(pin(), None)).unwrap();
        let loaded = store.load().unwrap();
        assert!(loaded.root_path.is_none());
    }
}
