//! Deployment planning: dependency graph, cycle breaking, scheduling and
//! change detection.
//!
//! [`plan`] turns a resource store and the persisted state into a
//! [`DeployPlan`] without touching the remote platform.

pub mod cycles;
pub mod diff;
pub mod graph;
pub mod schedule;

use thiserror::Error;
use tracing::{debug, info};

use crate::resource::{ResourceError, ResourceKey, ResourceStore};
use crate::state::StateStore;

pub use cycles::{CycleResolution, break_cycles, find_cycles, select_breaker, type_priority};
pub use diff::{CONTENT_BEARING_TYPES, ChangeReason, ResourceDiff, SelectedResource, compute_diff};
pub use graph::DependencyGraph;
pub use schedule::{ScheduledResource, schedule, topological_order};

fn join_keys(keys: &[ResourceKey]) -> String {
  keys.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

#[derive(Debug, Error)]
pub enum PlanError {
  #[error("failed to serialize payload of {key}: {source}")]
  Serialize {
    key: ResourceKey,
    #[source]
    source: serde_json::Error,
  },

  #[error(transparent)]
  Resource(#[from] ResourceError),

  #[error("{referrer} ({location}) refers to {target}, which is neither declared nor previously deployed")]
  UnresolvedReference {
    referrer: ResourceKey,
    location: String,
    target: ResourceKey,
  },

  #[error("cannot break reference cycle among {}: no member can be deployed as a shell", join_keys(.members))]
  UnbreakableCycle { members: Vec<ResourceKey> },

  #[error("resources left unscheduled after breaking cycles: {}", join_keys(.remaining))]
  ResidualCycle { remaining: Vec<ResourceKey> },
}

/// Everything needed to execute a deployment.
#[derive(Debug, Clone)]
pub struct DeployPlan {
  /// Dependencies as written in the payloads, before cycle breaking.
  pub graph: DependencyGraph,
  /// Referenced but undeclared resources.
  pub placeholders: Vec<ResourceKey>,
  pub cycles: CycleResolution,
  pub schedule: Vec<ScheduledResource>,
  pub diff: ResourceDiff,
}

impl DeployPlan {
  pub fn breakers(&self) -> &[ResourceKey] {
    &self.cycles.breakers
  }

  /// Keys that will be deployed, in deployment order.
  pub fn to_deploy(&self) -> Vec<ResourceKey> {
    self.diff.selected.iter().map(|s| s.key.clone()).collect()
  }
}

/// Plan a deployment of `store` against `state`.
///
/// Placeholders for undeclared references are added to `store`. Every such
/// placeholder must already be recorded in `state`, since nothing in this run
/// can create it. A cycle member may break its cycle when `can_shell` accepts
/// its type or when it is already deployed.
pub fn plan(
  store: &mut ResourceStore,
  state: &StateStore,
  can_shell: impl Fn(&str) -> bool,
) -> Result<DeployPlan, PlanError> {
  let (graph, placeholders) = DependencyGraph::build(store)?;
  debug!(
    resources = graph.node_count(),
    edges = graph.edge_count(),
    placeholders = placeholders.len(),
    "built dependency graph"
  );

  for target in &placeholders {
    if state.contains(target) {
      continue;
    }
    let referrer = graph.dependents(target).into_iter().next().unwrap_or_else(|| target.clone());
    let location = store.get(&referrer).map(|r| r.content_path.clone()).unwrap_or_default();
    return Err(PlanError::UnresolvedReference {
      referrer,
      location,
      target: target.clone(),
    });
  }

  let mut acyclic = graph.clone();
  let cycles = break_cycles(&mut acyclic, |key| can_shell(&key.rtype) || state.contains(key))?;
  for breaker in &cycles.breakers {
    info!(resource = %breaker, "breaking reference cycle");
  }

  let schedule = schedule(&acyclic, &cycles.breakers)?;
  let diff = compute_diff(store, &graph, &schedule, state)?;
  debug!(
    selected = diff.selected.len(),
    unchanged = diff.unchanged.len(),
    shells = diff.shells.len(),
    "computed changes"
  );

  Ok(DeployPlan {
    graph,
    placeholders,
    cycles,
    schedule,
    diff,
  })
}
