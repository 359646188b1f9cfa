//! Durable key/value store with file locking.
//!
//! One JSON file per key under the data directory. Writes replace the
//! whole value atomically (temp file, sync, rename) so a concurrently
//! starting reader never observes a partial value; reads take shared
//! locks and degrade to "absent" on corruption.

use crate::{Error, Result};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Store key for the user's medication set.
pub const MEDICATIONS_KEY: &str = "medications";
/// Store key for the taken-dose history log.
pub const HISTORY_KEY: &str = "history";
/// Store key for the notification scheduler's medication-set mirror.
pub const NOTIFY_MIRROR_KEY: &str = "notify-medications";

/// An opaque durable store keyed by string.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;
}

/// Deserialize a stored JSON value, treating corruption as absence.
pub fn get_json<T, S>(store: &S, key: &str) -> Result<Option<T>>
where
    T: DeserializeOwned,
    S: KeyValueStore + ?Sized,
{
    let Some(bytes) = store.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::warn!(key, error = %e, "corrupt stored value, treating as absent");
            Ok(None)
        }
    }
}

/// Serialize and store a value as JSON under `key`.
pub fn set_json<T, S>(store: &S, key: &str, value: &T) -> Result<()>
where
    T: Serialize,
    S: KeyValueStore + ?Sized,
{
    store.set(key, &serde_json::to_vec(value)?)
}

/// File-backed store: `<dir>/<key>.json` per key.
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStore for FileStore {
    /// Read a value with a shared lock.
    ///
    /// An unreadable file is logged and reported as absent rather than
    /// failing the caller; "no data" is never an error here.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(key, error = %e, "unable to open store file, treating as absent");
                return Ok(None);
            }
        };

        if let Err(e) = file.lock_shared() {
            tracing::warn!(key, error = %e, "unable to lock store file, treating as absent");
            return Ok(None);
        }

        let mut contents = Vec::new();
        let mut reader = std::io::BufReader::new(&file);
        let read = reader.read_to_end(&mut contents);
        let _ = file.unlock();

        match read {
            Ok(_) => Ok(Some(contents)),
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to read store file, treating as absent");
                Ok(None)
            }
        }
    }

    /// Replace a value wholesale.
    ///
    /// Writes to a locked temp file in the same directory, syncs, then
    /// renames over the old value so readers see either the old or the
    /// new bytes, never a mix.
    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        let temp = NamedTempFile::new_in(&self.dir)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            writer.write_all(value)?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;
        temp.persist(self.key_path(key)).map_err(|e| Error::Io(e.error))?;

        tracing::debug!(key, bytes = value.len(), "stored value");
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        match std::fs::remove_file(self.key_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
