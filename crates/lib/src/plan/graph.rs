//! Dependency graph among the resources of one run.
//!
//! Nodes are created in resource-store order and edges point from a
//! dependency to its dependent, so a topological walk yields dependencies
//! first. The graph is rebuilt from payload tokens on every run.

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::resource::{Resource, ResourceKey, ResourceStore};
use crate::token;

use super::PlanError;

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
  graph: DiGraph<ResourceKey, ()>,
  nodes: HashMap<ResourceKey, NodeIndex>,
}

impl DependencyGraph {
  /// Build the graph from every resource in the store.
  ///
  /// Keys referenced but never declared are inserted into the store as
  /// placeholders and returned alongside the graph, in order of first
  /// reference.
  pub fn build(store: &mut ResourceStore) -> Result<(Self, Vec<ResourceKey>), PlanError> {
    let mut edges = Vec::new();
    for resource in store.iter() {
      let Some(data) = &resource.data else {
        continue;
      };
      let text = serde_json::to_string(data).map_err(|source| PlanError::Serialize {
        key: resource.key(),
        source,
      })?;
      for target in token::references(&text) {
        edges.push((resource.key(), target));
      }
    }

    let mut placeholders = Vec::new();
    for (_, target) in &edges {
      if !store.contains(target) {
        store.insert(Resource::placeholder(target))?;
        placeholders.push(target.clone());
      }
    }

    let graph = Self::from_edges(store.keys().cloned(), edges);
    Ok((graph, placeholders))
  }

  /// Build a graph from explicit `(dependent, dependency)` pairs.
  ///
  /// Nodes are created in the order of `keys`; endpoints missing from `keys`
  /// are appended.
  pub fn from_edges(
    keys: impl IntoIterator<Item = ResourceKey>,
    edges: impl IntoIterator<Item = (ResourceKey, ResourceKey)>,
  ) -> Self {
    let mut dag = Self::default();
    for key in keys {
      dag.add_node(key);
    }
    for (dependent, dependency) in edges {
      let from = dag.add_node(dependency);
      let to = dag.add_node(dependent);
      dag.graph.update_edge(from, to, ());
    }
    dag
  }

  fn add_node(&mut self, key: ResourceKey) -> NodeIndex {
    if let Some(&idx) = self.nodes.get(&key) {
      return idx;
    }
    let idx = self.graph.add_node(key.clone());
    self.nodes.insert(key, idx);
    idx
  }

  /// Keys in node order (the order resources were added to the store).
  pub fn keys(&self) -> impl Iterator<Item = &ResourceKey> {
    self.graph.node_indices().map(|idx| &self.graph[idx])
  }

  pub fn contains(&self, key: &ResourceKey) -> bool {
    self.nodes.contains_key(key)
  }

  /// Resources `key` refers to.
  pub fn dependencies(&self, key: &ResourceKey) -> Vec<ResourceKey> {
    self.neighbors(key, Direction::Incoming)
  }

  /// Resources referring to `key`.
  pub fn dependents(&self, key: &ResourceKey) -> Vec<ResourceKey> {
    self.neighbors(key, Direction::Outgoing)
  }

  /// Returns true if `dependent` refers to `dependency`.
  pub fn depends_on(&self, dependent: &ResourceKey, dependency: &ResourceKey) -> bool {
    match (self.nodes.get(dependency), self.nodes.get(dependent)) {
      (Some(&from), Some(&to)) => self.graph.contains_edge(from, to),
      _ => false,
    }
  }

  fn neighbors(&self, key: &ResourceKey, direction: Direction) -> Vec<ResourceKey> {
    let Some(&idx) = self.nodes.get(key) else {
      return Vec::new();
    };
    let mut neighbors: Vec<NodeIndex> = self.graph.neighbors_directed(idx, direction).collect();
    neighbors.sort();
    neighbors.into_iter().map(|n| self.graph[n].clone()).collect()
  }

  pub fn node_count(&self) -> usize {
    self.graph.node_count()
  }

  pub fn edge_count(&self) -> usize {
    self.graph.edge_count()
  }

  pub(crate) fn inner(&self) -> &DiGraph<ResourceKey, ()> {
    &self.graph
  }

  pub(crate) fn inner_mut(&mut self) -> &mut DiGraph<ResourceKey, ()> {
    &mut self.graph
  }
}
