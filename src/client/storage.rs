//! Local mirror of the active session.
//!
//! The mirror holds the same JSON as the `session` field of the endpoint's
//! responses, under one well-known key. It is never authoritative.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::{client::error::ClientError, models::access_session::SessionView};

/// Key the session is stored under.
pub const SESSION_STORAGE_KEY: &str = "partner_access_session";

pub trait SessionStorage: Send + Sync {
    fn load(&self) -> Result<Option<SessionView>, ClientError>;

    fn save(&self, session: &SessionView) -> Result<(), ClientError>;

    fn clear(&self) -> Result<(), ClientError>;
}

/// Stores the mirror as `<dir>/partner_access_session.json`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{SESSION_STORAGE_KEY}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStorage for FileStorage {
    fn load(&self) -> Result<Option<SessionView>, ClientError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn save(&self, session: &SessionView) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write-then-rename so a crash never leaves half a session behind
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(session)?)?;
        fs::rename(&tmp, &self.path)?;

        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Process-local mirror, kept as serialized JSON like the file version.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    raw: Mutex<Option<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw JSON currently stored, if any.
    pub fn raw(&self) -> Option<String> {
        self.raw.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl SessionStorage for MemoryStorage {
    fn load(&self) -> Result<Option<SessionView>, ClientError> {
        match self.raw() {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn save(&self, session: &SessionView) -> Result<(), ClientError> {
        let raw = serde_json::to_string(session)?;
        *self.raw.lock().unwrap_or_else(PoisonError::into_inner) = Some(raw);
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        *self.raw.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
