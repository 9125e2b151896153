//! Change detection against persisted state.
//!
//! A resource is selected for deployment when it is new, when its checksum
//! differs from the recorded one, or when it refers to a content-bearing
//! resource (an uploaded file or archive) selected earlier in the same run.
//! The last rule exists because a re-uploaded file gets a new remote id, so
//! every resource embedding its link must be rewritten even though its own
//! payload text did not change.

use std::collections::HashMap;

use crate::resource::{ResourceKey, ResourceStore};
use crate::state::StateStore;
use crate::util::hash::checksum;

use super::PlanError;
use super::graph::DependencyGraph;
use super::schedule::ScheduledResource;

/// Resource types whose redeployment changes what other resources embed.
pub const CONTENT_BEARING_TYPES: &[&str] = &["file", "zip"];

/// Why a resource was selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeReason {
  New,
  Modified,
  /// A content-bearing dependency was selected in the same run.
  DependencyChanged(ResourceKey),
}

impl std::fmt::Display for ChangeReason {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ChangeReason::New => write!(f, "new"),
      ChangeReason::Modified => write!(f, "modified"),
      ChangeReason::DependencyChanged(key) => write!(f, "dependency {key} changed"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedResource {
  pub key: ResourceKey,
  pub checksum: String,
  pub reason: ChangeReason,
}

/// Result of comparing the scheduled resources with persisted state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceDiff {
  /// Selected resources, non-shell entries in schedule order first, then breakers.
  pub selected: Vec<SelectedResource>,
  /// New breakers that need a shell deployed before everything else.
  pub shells: Vec<ResourceKey>,
  /// Declared resources whose recorded state is current.
  pub unchanged: Vec<ResourceKey>,
}

impl ResourceDiff {
  pub fn is_selected(&self, key: &ResourceKey) -> bool {
    self.selected.iter().any(|s| &s.key == key)
  }

  pub fn get(&self, key: &ResourceKey) -> Option<&SelectedResource> {
    self.selected.iter().find(|s| &s.key == key)
  }

  pub fn is_empty(&self) -> bool {
    self.selected.is_empty()
  }
}

/// Compare the declared resources in `schedule` with `state`.
///
/// `dependencies` must be the graph as built from the payloads, before any
/// cycle was broken, so that a breaker referring to a changed file is still
/// marked dirty.
pub fn compute_diff(
  store: &ResourceStore,
  dependencies: &DependencyGraph,
  schedule: &[ScheduledResource],
  state: &StateStore,
) -> Result<ResourceDiff, PlanError> {
  let mut diff = ResourceDiff::default();
  let mut selected_types: HashMap<ResourceKey, bool> = HashMap::new();

  let ordered = schedule
    .iter()
    .filter(|s| !s.is_shell)
    .chain(schedule.iter().filter(|s| s.is_shell));

  for entry in ordered {
    let Some(resource) = store.get(&entry.key) else {
      continue;
    };
    let Some(data) = &resource.data else {
      continue;
    };
    let key = &entry.key;
    let sum = checksum(data).map_err(|source| PlanError::Serialize {
      key: key.clone(),
      source,
    })?;

    let reason = match state.checksum(key) {
      None => Some(ChangeReason::New),
      Some(recorded) if recorded != sum => Some(ChangeReason::Modified),
      Some(_) => dependencies
        .dependencies(key)
        .into_iter()
        .find(|dep| selected_types.get(dep).copied().unwrap_or(false))
        .map(ChangeReason::DependencyChanged),
    };

    match reason {
      Some(reason) => {
        if entry.is_shell && reason == ChangeReason::New {
          diff.shells.push(key.clone());
        }
        selected_types.insert(key.clone(), CONTENT_BEARING_TYPES.contains(&key.rtype.as_str()));
        diff.selected.push(SelectedResource {
          key: key.clone(),
          checksum: sum,
          reason,
        });
      }
      None => diff.unchanged.push(key.clone()),
    }
  }

  Ok(diff)
}
