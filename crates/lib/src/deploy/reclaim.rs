//! Removal of remote objects the document no longer declares.
//!
//! Children are deleted before their containers (questions before quizzes,
//! items before modules, overrides before assignments) since the platform
//! may refuse to delete a container that still has content.

use tracing::{info, warn};

use crate::api::CourseApi;
use crate::resource::{ResourceKey, ResourceStore};
use crate::state::{StateStorage, StateStore};

use super::registry::DeployerRegistry;
use super::types::EngineError;

/// Singleton types that exist for the lifetime of the course.
pub const NON_DELETABLE_TYPES: &[&str] = &["syllabus", "course_settings"];

/// Deletion order of a type; lower goes first.
pub fn deletion_priority(rtype: &str) -> u8 {
  match rtype {
    "quiz_question" | "module_item" | "override" => 0,
    "module" | "assignment_group" => 2,
    _ => 1,
  }
}

/// Recorded resources absent from the store, in deletion order.
///
/// Placeholders count as present: the document still refers to them.
pub fn stale_keys(store: &ResourceStore, state: &StateStore) -> Vec<ResourceKey> {
  let mut stale: Vec<ResourceKey> = state
    .keys()
    .filter(|key| !store.contains(key) && !NON_DELETABLE_TYPES.contains(&key.rtype.as_str()))
    .cloned()
    .collect();
  stale.sort_by(|a, b| (deletion_priority(&a.rtype), a).cmp(&(deletion_priority(&b.rtype), b)));
  stale
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReclaimSummary {
  pub deleted: Vec<ResourceKey>,
  /// Already missing remotely; removed from state all the same.
  pub already_gone: Vec<ResourceKey>,
  /// Deletions that failed, with the error message. Their entries are kept.
  pub failed: Vec<(ResourceKey, String)>,
  /// Entries of types no deployer handles, dropped from state untouched.
  pub dropped: Vec<ResourceKey>,
}

/// Delete every stale resource.
///
/// Individual failures are logged and collected, never fatal; only a failed
/// state checkpoint aborts.
pub async fn reclaim(
  api: &dyn CourseApi,
  registry: &DeployerRegistry,
  state: &mut StateStore,
  store: &ResourceStore,
  checkpoint: Option<&StateStorage>,
) -> Result<ReclaimSummary, EngineError> {
  let mut summary = ReclaimSummary::default();

  for key in stale_keys(store, state) {
    let Some(info) = state.canvas_info(&key).cloned() else {
      continue;
    };

    let Some(deployer) = registry.get(&key.rtype) else {
      warn!(resource = %key, "no deployer for stale resource type; forgetting it");
      summary.dropped.push(key.clone());
      state.remove(&key);
      if let Some(storage) = checkpoint {
        storage.save(state)?;
      }
      continue;
    };

    match deployer.delete(api, &info).await {
      Ok(()) => {
        info!(resource = %key, "deleted stale resource");
        summary.deleted.push(key.clone());
      }
      Err(err) if err.is_not_found() => {
        info!(resource = %key, "stale resource already gone");
        summary.already_gone.push(key.clone());
      }
      Err(err) => {
        warn!(resource = %key, error = %err, "failed to delete stale resource");
        summary.failed.push((key, err.to_string()));
        continue;
      }
    }

    state.remove(&key);
    if let Some(storage) = checkpoint {
      storage.save(state)?;
    }
  }

  Ok(summary)
}
