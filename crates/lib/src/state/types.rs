//! State store types.

use std::collections::BTreeMap;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resource::{ResourceInfo, ResourceKey};

/// What is known about one deployed resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
  /// Checksum of the deployed payload; empty while only a shell exists.
  pub checksum: String,
  pub canvas_info: ResourceInfo,
}

/// Deployment state of one course.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateStore {
  version: Option<String>,
  entries: BTreeMap<ResourceKey, StateEntry>,
}

impl StateStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Engine version that last wrote this state, if recorded.
  pub fn version(&self) -> Option<&str> {
    self.version.as_deref()
  }

  pub fn set_version(&mut self, version: impl Into<String>) {
    self.version = Some(version.into());
  }

  pub fn get(&self, key: &ResourceKey) -> Option<&StateEntry> {
    self.entries.get(key)
  }

  pub fn get_mut(&mut self, key: &ResourceKey) -> Option<&mut StateEntry> {
    self.entries.get_mut(key)
  }

  pub fn contains(&self, key: &ResourceKey) -> bool {
    self.entries.contains_key(key)
  }

  pub fn checksum(&self, key: &ResourceKey) -> Option<&str> {
    self.entries.get(key).map(|e| e.checksum.as_str())
  }

  pub fn canvas_info(&self, key: &ResourceKey) -> Option<&ResourceInfo> {
    self.entries.get(key).map(|e| &e.canvas_info)
  }

  /// Record a successful deploy.
  pub fn record(&mut self, key: ResourceKey, checksum: impl Into<String>, canvas_info: ResourceInfo) {
    self.entries.insert(
      key,
      StateEntry {
        checksum: checksum.into(),
        canvas_info,
      },
    );
  }

  pub fn remove(&mut self, key: &ResourceKey) -> Option<StateEntry> {
    self.entries.remove(key)
  }

  /// Keys in sorted order.
  pub fn keys(&self) -> impl Iterator<Item = &ResourceKey> {
    self.entries.keys()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&ResourceKey, &StateEntry)> {
    self.entries.iter()
  }

  pub fn iter_mut(&mut self) -> impl Iterator<Item = (&ResourceKey, &mut StateEntry)> {
    self.entries.iter_mut()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

/// On-disk layout of a state file.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct StateFile {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
  #[serde(default)]
  pub entries: Vec<StateFileEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct StateFileEntry {
  #[serde(rename = "type")]
  pub rtype: String,
  pub id: String,
  #[serde(default)]
  pub checksum: String,
  #[serde(default)]
  pub canvas_info: ResourceInfo,
}

impl From<&StateStore> for StateFile {
  fn from(store: &StateStore) -> Self {
    Self {
      version: store.version.clone(),
      entries: store
        .entries
        .iter()
        .map(|(key, entry)| StateFileEntry {
          rtype: key.rtype.clone(),
          id: key.id.clone(),
          checksum: entry.checksum.clone(),
          canvas_info: entry.canvas_info.clone(),
        })
        .collect(),
    }
  }
}

impl From<StateFile> for StateStore {
  fn from(file: StateFile) -> Self {
    Self {
      version: file.version,
      entries: file
        .entries
        .into_iter()
        .map(|e| {
          (
            ResourceKey::new(e.rtype, e.id),
            StateEntry {
              checksum: e.checksum,
              canvas_info: e.canvas_info,
            },
          )
        })
        .collect(),
    }
  }
}

/// Errors that can occur while reading or writing state.
#[derive(Debug, Error)]
pub enum StateError {
  #[error("failed to create state directory: {0}")]
  CreateDir(#[source] io::Error),

  #[error("failed to read state file: {0}")]
  Read(#[source] io::Error),

  #[error("failed to write state file: {0}")]
  Write(#[source] io::Error),

  #[error("failed to parse state file: {0}")]
  Parse(#[source] serde_json::Error),

  #[error("failed to serialize state: {0}")]
  Serialize(#[source] serde_json::Error),
}
