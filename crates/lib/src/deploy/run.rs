//! A complete deployment run: lock, load, migrate, plan, deploy, reclaim, save.

use thiserror::Error;
use tracing::{error, info};

use crate::api::CourseApi;
use crate::plan::{self, DeployPlan};
use crate::resource::{ResourceKey, ResourceStore};
use crate::state::{
  LockError, LockMode, MigrationError, MigrationOutcome, StateError, StateStorage, StateStore, migrate,
};

use super::driver::{Driver, ExecutionSummary};
use super::predeploy::{ContentHasher, DateNormalizer, predeploy_all};
use super::reclaim::{ReclaimSummary, reclaim, stale_keys};
use super::registry::DeployerRegistry;
use super::report::DeploymentReport;
use super::types::EngineError;

#[derive(Debug, Clone)]
pub struct RunOptions {
  /// Plan only: no remote writes, no state changes.
  pub dry_run: bool,
  /// Delete recorded resources the document no longer declares.
  pub cleanup: bool,
  /// Course time zone for date normalization (`UTC`, `+HH:MM` or a zone name).
  pub time_zone: String,
}

impl Default for RunOptions {
  fn default() -> Self {
    Self {
      dry_run: false,
      cleanup: false,
      time_zone: "UTC".to_string(),
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
  pub migration: Option<MigrationOutcome>,
  /// Resources selected for deployment, in deployment order.
  pub planned: Vec<ResourceKey>,
  pub breakers: Vec<ResourceKey>,
  /// Recorded resources the document no longer declares.
  pub stale: Vec<ResourceKey>,
  pub execution: ExecutionSummary,
  pub reclaim: Option<ReclaimSummary>,
}

#[derive(Debug, Error)]
pub enum RunError {
  #[error(transparent)]
  Lock(#[from] LockError),

  #[error(transparent)]
  State(#[from] StateError),

  #[error(transparent)]
  Migration(#[from] MigrationError),

  #[error(transparent)]
  Engine(#[from] EngineError),
}

/// Normalize payloads and plan a deployment against `state`.
pub fn prepare(
  store: &mut ResourceStore,
  state: &StateStore,
  registry: &DeployerRegistry,
  time_zone: &str,
) -> Result<DeployPlan, EngineError> {
  let normalizer = DateNormalizer::from_time_zone(time_zone)?;
  predeploy_all(store, &normalizer)?;
  predeploy_all(store, &ContentHasher)?;
  Ok(plan::plan(store, state, |rtype| registry.supports_shell(rtype))?)
}

/// Run a deployment of `store` to the course behind `api`.
///
/// On failure the error message is also stored in `report`, which keeps
/// everything deployed before the failure.
pub async fn run(
  api: &dyn CourseApi,
  registry: &DeployerRegistry,
  storage: &StateStorage,
  store: ResourceStore,
  options: &RunOptions,
  report: &mut DeploymentReport,
) -> Result<RunSummary, RunError> {
  let result = run_locked(api, registry, storage, store, options, report).await;
  if let Err(err) = &result {
    report.set_error(err);
  }
  result
}

async fn run_locked(
  api: &dyn CourseApi,
  registry: &DeployerRegistry,
  storage: &StateStorage,
  mut store: ResourceStore,
  options: &RunOptions,
  report: &mut DeploymentReport,
) -> Result<RunSummary, RunError> {
  let (mode, command) = if options.dry_run {
    (LockMode::Shared, "deploy --dry-run")
  } else {
    (LockMode::Exclusive, "deploy")
  };
  let _lock = storage.lock(mode, command)?;
  let mut state = storage.load()?;
  let mut summary = RunSummary::default();

  if !options.dry_run {
    let outcome = migrate(api, &mut state).await?;
    if matches!(outcome, MigrationOutcome::Migrated { .. }) {
      storage.save(&state)?;
    }
    summary.migration = Some(outcome);
  }

  let plan = prepare(&mut store, &state, registry, &options.time_zone)?;
  summary.planned = plan.to_deploy();
  summary.breakers = plan.breakers().to_vec();
  summary.stale = stale_keys(&store, &state);
  for selected in &plan.diff.selected {
    info!(resource = %selected.key, reason = %selected.reason, "selected for deployment");
  }

  if options.dry_run {
    for key in &summary.planned {
      report.add_deployed(key, None);
    }
    info!(
      planned = summary.planned.len(),
      stale = summary.stale.len(),
      "dry run, nothing deployed"
    );
    return Ok(summary);
  }

  let executed = Driver::new(api, registry, &mut state, report)
    .with_checkpoint(storage)
    .execute(&plan, &store)
    .await;
  summary.execution = match executed {
    Ok(execution) => execution,
    Err(err) => {
      if let Err(save_err) = storage.save(&state) {
        error!(error = %save_err, "failed to save state after deployment failure");
      }
      return Err(err.into());
    }
  };

  if options.cleanup {
    summary.reclaim = Some(reclaim(api, registry, &mut state, &store, Some(storage)).await?);
  }

  storage.save(&state)?;
  Ok(summary)
}
