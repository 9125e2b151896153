//! Deployment order.
//!
//! Uses Kahn's algorithm with a FIFO queue seeded in node order, so
//! independent resources deploy in the order the document declares them.

use std::collections::VecDeque;

use petgraph::Direction;
use petgraph::graph::NodeIndex;
use serde::Serialize;

use crate::resource::ResourceKey;

use super::PlanError;
use super::graph::DependencyGraph;

/// One entry of the deployment schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledResource {
  pub key: ResourceKey,
  /// Breakers are listed first with `is_shell` set; they are deployed as
  /// shells and filled in at the end of the run.
  pub is_shell: bool,
}

/// Order the keys of an acyclic graph dependencies-first.
///
/// # Errors
///
/// Returns [`PlanError::ResidualCycle`] naming the nodes that never became
/// ready. Cycles are broken before scheduling, so this signals a bug in the
/// planner rather than a document error.
pub fn topological_order(graph: &DependencyGraph) -> Result<Vec<ResourceKey>, PlanError> {
  let inner = graph.inner();
  let mut in_degree: Vec<usize> = inner
    .node_indices()
    .map(|idx| inner.neighbors_directed(idx, Direction::Incoming).count())
    .collect();

  let mut queue: VecDeque<NodeIndex> = inner.node_indices().filter(|idx| in_degree[idx.index()] == 0).collect();
  let mut order = Vec::with_capacity(inner.node_count());

  while let Some(idx) = queue.pop_front() {
    order.push(idx);

    let mut dependents: Vec<NodeIndex> = inner.neighbors_directed(idx, Direction::Outgoing).collect();
    dependents.sort();
    for dependent in dependents {
      let degree = &mut in_degree[dependent.index()];
      *degree = degree.saturating_sub(1);
      if *degree == 0 {
        queue.push_back(dependent);
      }
    }
  }

  if order.len() < inner.node_count() {
    let remaining = inner
      .node_indices()
      .filter(|idx| in_degree[idx.index()] > 0)
      .map(|idx| inner[idx].clone())
      .collect();
    return Err(PlanError::ResidualCycle { remaining });
  }

  Ok(order.into_iter().map(|idx| inner[idx].clone()).collect())
}

/// Full schedule: every breaker flagged as a shell, then every key in
/// dependency order. Breakers appear only once, among the shells.
pub fn schedule(graph: &DependencyGraph, breakers: &[ResourceKey]) -> Result<Vec<ScheduledResource>, PlanError> {
  let order = topological_order(graph)?;

  let mut schedule: Vec<ScheduledResource> = breakers
    .iter()
    .map(|key| ScheduledResource {
      key: key.clone(),
      is_shell: true,
    })
    .collect();
  schedule.extend(
    order
      .into_iter()
      .filter(|key| !breakers.contains(key))
      .map(|key| ScheduledResource { key, is_shell: false }),
  );

  Ok(schedule)
}
