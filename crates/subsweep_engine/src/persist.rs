use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use subsweep_core::PersistedState;
use tempfile::NamedTempFile;
use thiserror::Error;

/// File name of the job record inside the state directory.
pub const STATE_FILE: &str = "subsweep_state.ron";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("directory missing or not writable: {0}")]
    Dir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode state: {0}")]
    Encode(String),
    #[error("state file is corrupt: {0}")]
    Decode(String),
}

/// Ensure a directory exists; create if missing.
pub fn ensure_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::Dir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::Dir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::Dir(e.to_string()))?;
    }
    Ok(())
}

/// Writes `{dir}/{filename}` through a temp file and a rename, so readers see
/// either the old or the new content.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write(&self, filename: &str, content: &str) -> Result<PathBuf, PersistError> {
        ensure_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

/// Durable home of the job record. Every save replaces the whole record.
pub trait StateStore: Send + Sync {
    fn load(&self) -> Result<Option<PersistedState>, PersistError>;
    fn save(&self, state: &PersistedState) -> Result<(), PersistError>;
}

pub struct RonStateStore {
    writer: AtomicFileWriter,
}

impl RonStateStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.writer.dir().join(STATE_FILE)
    }
}

impl StateStore for RonStateStore {
    fn load(&self) -> Result<Option<PersistedState>, PersistError> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)?;
        ron::from_str(&text)
            .map(Some)
            .map_err(|err| PersistError::Decode(err.to_string()))
    }

    fn save(&self, state: &PersistedState) -> Result<(), PersistError> {
        let text = ron::ser::to_string_pretty(state, ron::ser::PrettyConfig::new())
            .map_err(|err| PersistError::Encode(err.to_string()))?;
        self.writer.write(STATE_FILE, &text)?;
        Ok(())
    }
}

/// Keeps the record in memory and remembers every save.
#[derive(Default)]
pub struct MemoryStateStore {
    saves: Mutex<Vec<PersistedState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: PersistedState) -> Self {
        Self {
            saves: Mutex::new(vec![state]),
        }
    }

    /// Every record saved so far, oldest first.
    pub fn history(&self) -> Vec<PersistedState> {
        self.saves
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<Option<PersistedState>, PersistError> {
        Ok(self
            .saves
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned())
    }

    fn save(&self, state: &PersistedState) -> Result<(), PersistError> {
        self.saves
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(state.clone());
        Ok(())
    }
}
