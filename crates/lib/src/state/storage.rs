//! State storage on disk.
//!
//! # Storage Layout
//!
//! ```text
//! {state_dir}/
//! ├── course-<id>.json    # StateFile for one course
//! └── course-<id>.lock    # advisory lock held while a run is active
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::paths::state_dir;

use super::lock::{LockError, LockMode, StateLock};
use super::types::{StateError, StateFile, StateStore};

/// Reads and writes the state file of one course.
#[derive(Debug, Clone)]
pub struct StateStorage {
  base_path: PathBuf,
  course_id: u64,
}

impl StateStorage {
  pub fn new(base_path: PathBuf, course_id: u64) -> Self {
    Self { base_path, course_id }
  }

  /// Storage in the default state directory (see [`state_dir`]).
  pub fn default_location(course_id: u64) -> Self {
    Self::new(state_dir(), course_id)
  }

  pub fn base_path(&self) -> &Path {
    &self.base_path
  }

  pub fn course_id(&self) -> u64 {
    self.course_id
  }

  pub fn path(&self) -> PathBuf {
    self.base_path.join(format!("course-{}.json", self.course_id))
  }

  pub fn lock_path(&self) -> PathBuf {
    self.base_path.join(format!("course-{}.lock", self.course_id))
  }

  fn ensure_dir(&self) -> Result<(), StateError> {
    fs::create_dir_all(&self.base_path).map_err(StateError::CreateDir)
  }

  /// Take the course lock for the duration of a run.
  pub fn lock(&self, mode: LockMode, command: &str) -> Result<StateLock, LockError> {
    StateLock::acquire(&self.lock_path(), mode, command)
  }

  /// Load the course state.
  ///
  /// Returns an empty store if the file doesn't exist.
  pub fn load(&self) -> Result<StateStore, StateError> {
    let path = self.path();
    let content = match fs::read_to_string(&path) {
      Ok(content) => content,
      Err(err) if err.kind() == io::ErrorKind::NotFound => {
        debug!(path = %path.display(), "no state file, starting empty");
        return Ok(StateStore::new());
      }
      Err(err) => return Err(StateError::Read(err)),
    };
    let file: StateFile = serde_json::from_str(&content).map_err(StateError::Parse)?;
    Ok(file.into())
  }

  /// Save the course state.
  ///
  /// Uses atomic write (write to temp, then rename) to prevent corruption.
  pub fn save(&self, state: &StateStore) -> Result<(), StateError> {
    self.ensure_dir()?;
    let path = self.path();
    let content = serde_json::to_string_pretty(&StateFile::from(state)).map_err(StateError::Serialize)?;
    let temp_path = self.base_path.join(format!("course-{}.json.tmp", self.course_id));
    fs::write(&temp_path, content).map_err(StateError::Write)?;
    fs::rename(&temp_path, &path).map_err(StateError::Write)?;
    Ok(())
  }
}
