//! Three-phase deployment driver.
//!
//! 1. Shells: new cycle breakers are created from a minimal payload so they
//!    have a remote id before anything refers to them.
//! 2. Deploy: every other selected resource, in schedule order, with its
//!    tokens resolved.
//! 3. Fill: every selected breaker is updated with its full content.
//!
//! State is checkpointed after each successful deploy so an interrupted run
//! leaves exactly the completed resources recorded.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::api::CourseApi;
use crate::consts::SHELL_CHECKSUM;
use crate::plan::DeployPlan;
use crate::resource::{Payload, ResourceInfo, ResourceKey, ResourceStore};
use crate::state::{StateStorage, StateStore};

use super::links::{LinkResolver, resolve_links};
use super::registry::DeployerRegistry;
use super::report::DeploymentReport;
use super::types::{DeployError, DeployOutcome, DeployRequest, Deployer, EngineError, Phase};

/// Keys deployed in each phase, in call order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
  pub shells: Vec<ResourceKey>,
  pub deployed: Vec<ResourceKey>,
  pub filled: Vec<ResourceKey>,
}

impl ExecutionSummary {
  pub fn total(&self) -> usize {
    self.shells.len() + self.deployed.len() + self.filled.len()
  }
}

pub struct Driver<'a> {
  api: &'a dyn CourseApi,
  registry: &'a DeployerRegistry,
  state: &'a mut StateStore,
  report: &'a mut DeploymentReport,
  checkpoint: Option<&'a StateStorage>,
  /// Remote descriptions obtained during this run.
  resolved: HashMap<ResourceKey, ResourceInfo>,
}

impl<'a> Driver<'a> {
  pub fn new(
    api: &'a dyn CourseApi,
    registry: &'a DeployerRegistry,
    state: &'a mut StateStore,
    report: &'a mut DeploymentReport,
  ) -> Self {
    Self {
      api,
      registry,
      state,
      report,
      checkpoint: None,
      resolved: HashMap::new(),
    }
  }

  /// Save state to `storage` after every successful deploy.
  pub fn with_checkpoint(mut self, storage: &'a StateStorage) -> Self {
    self.checkpoint = Some(storage);
    self
  }

  fn location(store: &ResourceStore, key: &ResourceKey) -> String {
    store.get(key).map(|r| r.content_path.clone()).unwrap_or_default()
  }

  fn deployer(&self, key: &ResourceKey, store: &ResourceStore, phase: Phase) -> Result<&'a dyn Deployer, EngineError> {
    let registry: &'a DeployerRegistry = self.registry;
    registry.get(&key.rtype).ok_or_else(|| EngineError::Deploy {
      key: key.clone(),
      location: Self::location(store, key),
      phase,
      source: DeployError::UnsupportedType(key.rtype.clone()),
    })
  }

  fn payload<'s>(store: &'s ResourceStore, key: &ResourceKey, phase: Phase) -> Result<&'s Payload, EngineError> {
    store
      .get(key)
      .and_then(|r| r.data.as_ref())
      .ok_or_else(|| EngineError::Invalid {
        key: key.clone(),
        location: Self::location(store, key),
        phase,
        message: "resource has no content to deploy".to_string(),
      })
  }

  /// Execute every phase of `plan`.
  pub async fn execute(&mut self, plan: &DeployPlan, store: &ResourceStore) -> Result<ExecutionSummary, EngineError> {
    // Fail on unknown types before the first remote write.
    for selected in &plan.diff.selected {
      self.deployer(&selected.key, store, Phase::Deploy)?;
    }

    let mut summary = ExecutionSummary::default();

    for key in &plan.diff.shells {
      self.deploy_shell(key, store).await?;
      summary.shells.push(key.clone());
    }

    for entry in plan.schedule.iter().filter(|e| !e.is_shell) {
      if let Some(selected) = plan.diff.get(&entry.key) {
        self.deploy_full(&entry.key, &selected.checksum, store, Phase::Deploy).await?;
        summary.deployed.push(entry.key.clone());
      }
    }

    for key in plan.breakers() {
      if let Some(selected) = plan.diff.get(key) {
        self.deploy_full(key, &selected.checksum, store, Phase::Fill).await?;
        summary.filled.push(key.clone());
      }
    }

    info!(
      shells = summary.shells.len(),
      deployed = summary.deployed.len(),
      filled = summary.filled.len(),
      "deployment complete"
    );
    Ok(summary)
  }

  async fn deploy_shell(&mut self, key: &ResourceKey, store: &ResourceStore) -> Result<(), EngineError> {
    let phase = Phase::Shell;
    let deployer = self.deployer(key, store, phase)?;
    let data = Self::payload(store, key, phase)?;
    let Some(shell) = deployer.shell(data) else {
      return Err(EngineError::Invalid {
        key: key.clone(),
        location: Self::location(store, key),
        phase,
        message: format!("type '{}' cannot be deployed as a shell", key.rtype),
      });
    };

    info!(resource = %key, phase = %phase, "deploying");
    let request = DeployRequest {
      key,
      payload: shell,
      existing: None,
    };
    let outcome = self.call(deployer, request, store, phase).await?;
    self.record(key, SHELL_CHECKSUM, outcome)
  }

  async fn deploy_full(
    &mut self,
    key: &ResourceKey,
    checksum: &str,
    store: &ResourceStore,
    phase: Phase,
  ) -> Result<(), EngineError> {
    let deployer = self.deployer(key, store, phase)?;
    let data = Self::payload(store, key, phase)?;

    let existing = self
      .resolved
      .get(key)
      .or_else(|| self.state.canvas_info(key))
      .cloned();
    if phase == Phase::Fill && existing.is_none() {
      return Err(EngineError::Invalid {
        key: key.clone(),
        location: Self::location(store, key),
        phase,
        message: "no remote id from the shell deploy".to_string(),
      });
    }

    let resolver = LinkResolver::new(&self.resolved, self.state);
    let payload = resolve_links(data, &resolver).map_err(|source| EngineError::Link {
      key: key.clone(),
      location: Self::location(store, key),
      phase,
      source,
    })?;

    info!(resource = %key, phase = %phase, update = existing.is_some(), "deploying");
    let request = DeployRequest {
      key,
      payload,
      existing: existing.as_ref(),
    };
    let outcome = self.call(deployer, request, store, phase).await?;
    self.record(key, checksum, outcome)
  }

  async fn call(
    &self,
    deployer: &dyn Deployer,
    request: DeployRequest<'_>,
    store: &ResourceStore,
    phase: Phase,
  ) -> Result<DeployOutcome, EngineError> {
    let key = request.key.clone();
    deployer
      .deploy(self.api, request)
      .await
      .map_err(|source| EngineError::Deploy {
        location: Self::location(store, &key),
        key,
        phase,
        source,
      })
  }

  fn record(&mut self, key: &ResourceKey, checksum: &str, outcome: DeployOutcome) -> Result<(), EngineError> {
    let DeployOutcome { info, review } = outcome;
    debug!(resource = %key, remote_id = ?info.id(), "recorded");

    self.report.add_deployed(key, info.url());
    if let Some(review) = review {
      info!(resource = %key, name = %review.name, link = %review.link, "change needs review");
      self.report.add_review(review);
    }

    self.resolved.insert(key.clone(), info.clone());
    self.state.record(key.clone(), checksum, info);
    if let Some(storage) = self.checkpoint {
      storage.save(self.state)?;
    }
    Ok(())
  }
}
