//! Version-gated upgrades of persisted state.
//!
//! State written by an older engine may lack fields newer code relies on.
//! Each step backfills such fields by asking the remote platform, runs at
//! most once per state file, and is safe to repeat.

use std::collections::HashMap;

use semver::Version;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{ApiError, CourseApi};
use crate::consts::ENGINE_VERSION;
use crate::resource::ResourceInfo;

use super::types::StateStore;

#[derive(Debug, Error)]
pub enum MigrationError {
  #[error("invalid state version '{version}': {source}")]
  InvalidVersion {
    version: String,
    #[source]
    source: semver::Error,
  },

  #[error("migration '{step}' failed: {source}")]
  Step {
    step: &'static str,
    #[source]
    source: ApiError,
  },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
  UpToDate,
  Migrated {
    from: Version,
    to: Version,
    steps: Vec<&'static str>,
  },
  /// State was written by a newer engine; left untouched.
  NewerState { stored: Version, engine: Version },
}

#[derive(Debug, Clone, Copy)]
enum Step {
  BackfillTitles,
  BackfillParentIds,
}

impl Step {
  const ALL: [Step; 2] = [Step::BackfillTitles, Step::BackfillParentIds];

  fn since(self) -> Version {
    match self {
      Step::BackfillTitles => Version::new(0, 2, 0),
      Step::BackfillParentIds => Version::new(0, 3, 0),
    }
  }

  fn name(self) -> &'static str {
    match self {
      Step::BackfillTitles => "backfill titles",
      Step::BackfillParentIds => "backfill parent ids",
    }
  }

  async fn apply(self, api: &dyn CourseApi, state: &mut StateStore) -> Result<(), ApiError> {
    match self {
      Step::BackfillTitles => backfill_titles(api, state).await,
      Step::BackfillParentIds => backfill_parent_ids(api, state).await,
    }
  }
}

fn parse_version(version: &str) -> Result<Version, MigrationError> {
  Version::parse(version).map_err(|source| MigrationError::InvalidVersion {
    version: version.to_string(),
    source,
  })
}

/// Bring `state` up to the running engine's version.
///
/// State without a recorded version gets every step.
pub async fn migrate(api: &dyn CourseApi, state: &mut StateStore) -> Result<MigrationOutcome, MigrationError> {
  let engine = parse_version(ENGINE_VERSION)?;
  let stored = match state.version() {
    Some(version) => parse_version(version)?,
    None => Version::new(0, 0, 0),
  };

  if stored == engine {
    return Ok(MigrationOutcome::UpToDate);
  }
  if stored > engine {
    warn!(
      stored = %stored,
      engine = %engine,
      "state was written by a newer coursesync; skipping migrations"
    );
    return Ok(MigrationOutcome::NewerState { stored, engine });
  }

  let mut applied = Vec::new();
  for step in Step::ALL {
    if step.since() <= stored {
      continue;
    }
    info!(step = step.name(), since = %step.since(), "migrating state");
    step
      .apply(api, state)
      .await
      .map_err(|source| MigrationError::Step {
        step: step.name(),
        source,
      })?;
    applied.push(step.name());
  }

  state.set_version(engine.to_string());
  Ok(MigrationOutcome::Migrated {
    from: stored,
    to: engine,
    steps: applied,
  })
}

fn title_path(rtype: &str, id: &str) -> Option<String> {
  match rtype {
    "assignment" => Some(format!("assignments/{id}")),
    "file" => Some(format!("/files/{id}")),
    "module" => Some(format!("modules/{id}")),
    "page" => Some(format!("pages/{id}")),
    "quiz" => Some(format!("quizzes/{id}")),
    _ => None,
  }
}

fn title_of(object: &Value) -> Option<&str> {
  ["title", "name", "display_name"]
    .iter()
    .find_map(|field| object.get(field).and_then(Value::as_str))
}

async fn backfill_titles(api: &dyn CourseApi, state: &mut StateStore) -> Result<(), ApiError> {
  let missing: Vec<_> = state
    .iter()
    .filter(|(key, entry)| {
      !entry.canvas_info.contains("title") && (key.rtype == "syllabus" || title_path(&key.rtype, "").is_some())
    })
    .map(|(key, _)| key.clone())
    .collect();

  for key in missing {
    let title = if key.rtype == "syllabus" {
      Some("Syllabus".to_string())
    } else {
      let remote_id = state.canvas_info(&key).and_then(ResourceInfo::id_string);
      match remote_id.and_then(|id| title_path(&key.rtype, &id)) {
        Some(path) => api
          .get(&path)
          .await?
          .as_ref()
          .and_then(title_of)
          .map(str::to_string),
        None => None,
      }
    };

    match (title, state.get_mut(&key)) {
      (Some(title), Some(entry)) => {
        debug!(resource = %key, title = %title, "backfilled title");
        entry.canvas_info.insert("title", title);
      }
      _ => debug!(resource = %key, "no remote title found"),
    }
  }

  Ok(())
}

/// Map each child id to its parent id by listing `parents` and, for each,
/// `<parents>/<parent>/<children>`.
async fn child_parents(api: &dyn CourseApi, parents: &str, children: &str) -> Result<HashMap<String, Value>, ApiError> {
  let mut map = HashMap::new();
  for parent in api.list(parents).await? {
    let Some(parent_id) = parent.get("id").cloned() else {
      continue;
    };
    let parent_path = match &parent_id {
      Value::String(s) => s.clone(),
      other => other.to_string(),
    };
    for child in api.list(&format!("{parents}/{parent_path}/{children}")).await? {
      if let Some(child_id) = child.get("id") {
        let child_key = match child_id {
          Value::String(s) => s.clone(),
          other => other.to_string(),
        };
        map.insert(child_key, parent_id.clone());
      }
    }
  }
  Ok(map)
}

async fn backfill_parent_ids(api: &dyn CourseApi, state: &mut StateStore) -> Result<(), ApiError> {
  let targets = [
    ("module_item", "module_id", "modules", "items"),
    ("override", "assignment_id", "assignments", "overrides"),
  ];

  for (rtype, field, parents, children) in targets {
    let needs: Vec<_> = state
      .iter()
      .filter(|(key, entry)| key.rtype == rtype && !entry.canvas_info.contains(field))
      .map(|(key, _)| key.clone())
      .collect();
    if needs.is_empty() {
      continue;
    }

    let parent_of = child_parents(api, parents, children).await?;
    for key in needs {
      let Some(entry) = state.get_mut(&key) else {
        continue;
      };
      let parent = entry.canvas_info.id_string().and_then(|id| parent_of.get(&id).cloned());
      match parent {
        Some(parent) => {
          debug!(resource = %key, field = field, "backfilled parent id");
          entry.canvas_info.insert(field, parent);
        }
        None => warn!(resource = %key, field = field, "could not find parent of deployed resource"),
      }
    }
  }

  Ok(())
}
