//! Reference cycle detection and breaking.
//!
//! Resources may legitimately refer to each other in a loop (a page linking
//! to a quiz whose description links back to the page). Such a loop cannot be
//! deployed in dependency order, so one member of every strongly connected
//! set is chosen as a breaker: it is first deployed as a minimal shell to
//! obtain a remote id, and redeployed with full content at the end of the
//! run. Removing the breaker's in-set dependencies makes the graph acyclic.

use std::collections::HashSet;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use crate::resource::ResourceKey;

use super::PlanError;
use super::graph::DependencyGraph;

/// Outcome of breaking every cycle in a graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleResolution {
  /// Breakers, in the order they were chosen.
  pub breakers: Vec<ResourceKey>,
  /// Removed `(dependent, dependency)` pairs.
  pub removed: Vec<(ResourceKey, ResourceKey)>,
}

/// Shell priority of a resource type; lower is preferred as a breaker.
pub fn type_priority(rtype: &str) -> u8 {
  match rtype {
    "page" => 0,
    "assignment" => 1,
    "quiz" => 2,
    _ => 3,
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
  Unvisited,
  OnStack,
  Done,
}

/// Strongly connected components, computed with Tarjan's algorithm on an
/// explicit stack.
///
/// Components are returned in completion order; members within a component
/// are sorted by node index.
fn strongly_connected(graph: &DiGraph<ResourceKey, ()>) -> Vec<Vec<NodeIndex>> {
  let count = graph.node_count();
  let successors: Vec<Vec<NodeIndex>> = graph
    .node_indices()
    .map(|idx| {
      let mut next: Vec<NodeIndex> = graph.neighbors_directed(idx, Direction::Outgoing).collect();
      next.sort();
      next.dedup();
      next
    })
    .collect();

  let mut state = vec![Visit::Unvisited; count];
  let mut index = vec![0usize; count];
  let mut lowlink = vec![0usize; count];
  let mut next_index = 0;
  let mut stack: Vec<NodeIndex> = Vec::new();
  let mut components = Vec::new();

  for root in graph.node_indices() {
    if state[root.index()] != Visit::Unvisited {
      continue;
    }

    // (node, position in its successor list)
    let mut frames: Vec<(NodeIndex, usize)> = vec![(root, 0)];
    state[root.index()] = Visit::OnStack;
    index[root.index()] = next_index;
    lowlink[root.index()] = next_index;
    next_index += 1;
    stack.push(root);

    while let Some(&(node, pos)) = frames.last() {
      let node_succ = &successors[node.index()];
      if pos < node_succ.len() {
        if let Some(top) = frames.last_mut() {
          top.1 += 1;
        }
        let next = node_succ[pos];
        match state[next.index()] {
          Visit::Unvisited => {
            state[next.index()] = Visit::OnStack;
            index[next.index()] = next_index;
            lowlink[next.index()] = next_index;
            next_index += 1;
            stack.push(next);
            frames.push((next, 0));
          }
          Visit::OnStack => {
            lowlink[node.index()] = lowlink[node.index()].min(index[next.index()]);
          }
          Visit::Done => {}
        }
        continue;
      }

      frames.pop();
      if let Some(&(parent, _)) = frames.last() {
        lowlink[parent.index()] = lowlink[parent.index()].min(lowlink[node.index()]);
      }

      if lowlink[node.index()] == index[node.index()] {
        let mut component = Vec::new();
        while let Some(member) = stack.pop() {
          state[member.index()] = Visit::Done;
          component.push(member);
          if member == node {
            break;
          }
        }
        component.sort();
        components.push(component);
      }
    }
  }

  components
}

/// Node sets that form at least one cycle: components with more than one
/// member, or a single member referring to itself.
fn cycle_sets(graph: &DiGraph<ResourceKey, ()>) -> Vec<Vec<NodeIndex>> {
  let mut sets: Vec<Vec<NodeIndex>> = strongly_connected(graph)
    .into_iter()
    .filter(|c| c.len() > 1 || graph.contains_edge(c[0], c[0]))
    .collect();
  sets.sort_by_key(|c| c[0]);
  sets
}

/// Every set of mutually dependent resources, each sorted by node order.
pub fn find_cycles(graph: &DependencyGraph) -> Vec<Vec<ResourceKey>> {
  let inner = graph.inner();
  cycle_sets(inner)
    .into_iter()
    .map(|set| set.into_iter().map(|idx| inner[idx].clone()).collect())
    .collect()
}

/// Pick the breaker of a cycle set among the members `can_break` accepts:
/// lowest type priority, then type name, then id.
pub fn select_breaker<'a>(
  members: &'a [ResourceKey],
  can_break: &impl Fn(&ResourceKey) -> bool,
) -> Option<&'a ResourceKey> {
  members
    .iter()
    .filter(|key| can_break(key))
    .min_by(|a, b| (type_priority(&a.rtype), a).cmp(&(type_priority(&b.rtype), b)))
}

/// Break every cycle in `graph`.
///
/// Each round picks one breaker per cycle set and removes the edges from
/// the breaker to the other members of its set (including a self-loop),
/// never edges leaving the set. Rounds repeat until the graph is acyclic,
/// since one set may contain several independent cycles.
///
/// # Errors
///
/// Returns [`PlanError::UnbreakableCycle`] when no member of a set is
/// accepted by `can_break`.
pub fn break_cycles(
  graph: &mut DependencyGraph,
  can_break: impl Fn(&ResourceKey) -> bool,
) -> Result<CycleResolution, PlanError> {
  let mut resolution = CycleResolution::default();

  loop {
    let sets = cycle_sets(graph.inner());
    if sets.is_empty() {
      return Ok(resolution);
    }

    for set in sets {
      let inner = graph.inner_mut();
      let members: Vec<ResourceKey> = set.iter().map(|&idx| inner[idx].clone()).collect();
      let Some(breaker) = select_breaker(&members, &can_break).cloned() else {
        return Err(PlanError::UnbreakableCycle { members });
      };
      let breaker_idx = set[members.iter().position(|m| *m == breaker).unwrap_or_default()];
      let in_set: HashSet<NodeIndex> = set.iter().copied().collect();

      let mut removed = Vec::new();
      inner.retain_edges(|g, edge| match g.edge_endpoints(edge) {
        Some((from, to)) if to == breaker_idx && in_set.contains(&from) => {
          removed.push(from);
          false
        }
        _ => true,
      });

      removed.sort();
      for dependency in removed {
        debug!(breaker = %breaker, dependency = %inner[dependency], "removed cycle edge");
        resolution.removed.push((breaker.clone(), inner[dependency].clone()));
      }
      if !resolution.breakers.contains(&breaker) {
        resolution.breakers.push(breaker);
      }
    }
  }
}
