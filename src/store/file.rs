use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use uuid::Uuid;

use super::{JobStore, StoreError};
use crate::scheduler::Job;

/// Stores the job collection as a pretty-printed JSON array.
///
/// Writes go to a temp file in the target directory which is fsynced and then
/// renamed over the snapshot, so a crash mid-write leaves the previous
/// snapshot intact.
#[derive(Debug)]
pub struct FileJobStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileJobStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(path: &Path, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn write_atomically(&self, bytes: &[u8]) -> Result<(), StoreError> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(|e| Self::io_error(&parent, e))?;

        let file_name = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("jobs.json");
        let temp_path = parent.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

        let result = (|| {
            let mut temp_file =
                std::fs::File::create(&temp_path).map_err(|e| Self::io_error(&temp_path, e))?;
            temp_file
                .write_all(bytes)
                .map_err(|e| Self::io_error(&temp_path, e))?;
            temp_file
                .sync_all()
                .map_err(|e| Self::io_error(&temp_path, e))?;
            std::fs::rename(&temp_path, &self.path).map_err(|e| Self::io_error(&self.path, e))
        })();

        if result.is_err() {
            let _ = std::fs::remove_file(&temp_path);
        }
        result
    }
}

impl JobStore for FileJobStore {
    fn load(&self) -> Result<Vec<Job>, StoreError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "No snapshot found, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(Self::io_error(&self.path, e)),
        };

        // A zero-length file is what a first-run touch leaves behind
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Vec::new());
        }

        serde_json::from_slice(&bytes).map_err(StoreError::Decode)
    }

    fn save(&self, jobs: &[Job]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(jobs).map_err(StoreError::Encode)?;
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.write_atomically(&bytes)?;
        tracing::trace!(path = %self.path.display(), jobs = jobs.len(), "Snapshot written");
        Ok(())
    }
}
