//! FileKvStore - one file per key inside a directory.
//!
//! Writes go to a temporary file that is renamed over the target, so a crash
//! mid-write leaves the previous value intact.
//!
//! File names are the key with every byte outside `[A-Za-z0-9._-]`
//! percent-encoded, so distinct keys never share a file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::domain::StorageError;
use crate::ports::KeyValueStore;

#[derive(Debug, Clone)]
pub struct FileKvStore {
    dir: PathBuf,
}

impl FileKvStore {
    /// Open (and create if needed) the directory backing the store.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let mut file_name = String::with_capacity(key.len() + 5);
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.') {
                file_name.push(char::from(byte));
            } else {
                file_name.push_str(&format!("%{byte:02X}"));
            }
        }
        file_name.push_str(".json");
        self.dir.join(file_name)
    }
}

fn map_write_error(key: &str, error: io::Error) -> StorageError {
    if error.kind() == io::ErrorKind::StorageFull {
        StorageError::QuotaExceeded {
            key: key.to_string(),
        }
    } else {
        StorageError::Io(error)
    }
}

impl KeyValueStore for FileKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let written = fs::write(&tmp, value).and_then(|()| fs::rename(&tmp, &path));
        if let Err(error) = written {
            // best effort; the write error is the one worth reporting
            let _ = fs::remove_file(&tmp);
            return Err(map_write_error(key, error));
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}
