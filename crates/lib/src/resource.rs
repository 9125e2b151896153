//! Resource model: keys, declared resources and the per-run resource store.
//!
//! A [`ResourceStore`] holds every resource of one course document in
//! document order. That order is the deterministic tie-break for scheduling,
//! so the store never reorders entries.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// JSON object carried by a resource and sent to the remote platform.
pub type Payload = Map<String, Value>;

/// Identifies a resource within one course: its type and document-local id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
  #[serde(rename = "type")]
  pub rtype: String,
  pub id: String,
}

impl ResourceKey {
  pub fn new(rtype: impl Into<String>, id: impl Into<String>) -> Self {
    Self {
      rtype: rtype.into(),
      id: id.into(),
    }
  }
}

impl fmt::Display for ResourceKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.rtype, self.id)
  }
}

/// A resource declared by the course document.
///
/// `data` is `None` for a placeholder: a resource that is only referenced by
/// other resources and is expected to exist remotely already.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
  #[serde(rename = "type")]
  pub rtype: String,
  pub id: String,
  #[serde(default)]
  pub data: Option<Payload>,
  /// Source location in the authoring document, for diagnostics.
  #[serde(default)]
  pub content_path: String,
}

impl Resource {
  pub fn new(rtype: impl Into<String>, id: impl Into<String>, data: Payload) -> Self {
    Self {
      rtype: rtype.into(),
      id: id.into(),
      data: Some(data),
      content_path: String::new(),
    }
  }

  pub fn placeholder(key: &ResourceKey) -> Self {
    Self {
      rtype: key.rtype.clone(),
      id: key.id.clone(),
      data: None,
      content_path: String::new(),
    }
  }

  pub fn with_content_path(mut self, content_path: impl Into<String>) -> Self {
    self.content_path = content_path.into();
    self
  }

  pub fn key(&self) -> ResourceKey {
    ResourceKey::new(&self.rtype, &self.id)
  }

  pub fn is_declared(&self) -> bool {
    self.data.is_some()
  }
}

/// Remote description of a deployed resource.
///
/// Always carries the remote `id` once deployed, plus whatever fields other
/// resources may reference (`url`, `uri`, `title`, `page_url`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceInfo(pub Map<String, Value>);

impl ResourceInfo {
  pub fn new() -> Self {
    Self::default()
  }

  /// Builder-style insert. Null values are skipped.
  pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
    self.insert(field, value);
    self
  }

  /// Insert a field. Null values are skipped.
  pub fn insert(&mut self, field: &str, value: impl Into<Value>) {
    let value = value.into();
    if !value.is_null() {
      self.0.insert(field.to_string(), value);
    }
  }

  pub fn get(&self, field: &str) -> Option<&Value> {
    self.0.get(field).filter(|v| !v.is_null())
  }

  pub fn contains(&self, field: &str) -> bool {
    self.get(field).is_some()
  }

  pub fn id(&self) -> Option<&Value> {
    self.get("id")
  }

  /// The remote id rendered for use in request paths.
  pub fn id_string(&self) -> Option<String> {
    self.field_text("id")
  }

  pub fn url(&self) -> Option<&str> {
    self.get("url").and_then(Value::as_str)
  }

  /// Render a field as text the way it is spliced into documents: strings
  /// verbatim, numbers and booleans in their JSON form.
  pub fn field_text(&self, field: &str) -> Option<String> {
    match self.get(field)? {
      Value::String(s) => Some(s.clone()),
      other => Some(other.to_string()),
    }
  }
}

#[derive(Debug, Error)]
pub enum ResourceError {
  #[error("duplicate resource {key}: declared in '{first}' and '{second}'")]
  Duplicate {
    key: ResourceKey,
    first: String,
    second: String,
  },

  #[error("failed to parse resource document: {0}")]
  Parse(#[from] serde_json::Error),
}

/// Insertion-ordered collection of the resources of one run.
#[derive(Debug, Clone, Default)]
pub struct ResourceStore {
  order: Vec<ResourceKey>,
  resources: HashMap<ResourceKey, Resource>,
}

impl ResourceStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Load a store from a JSON array of resource records.
  pub fn from_json(text: &str) -> Result<Self, ResourceError> {
    let records: Vec<Resource> = serde_json::from_str(text)?;
    let mut store = Self::new();
    for record in records {
      store.insert(record)?;
    }
    Ok(store)
  }

  /// Insert a resource.
  ///
  /// A placeholder never overrides anything, and a declaration replaces an
  /// earlier placeholder in place (keeping its position). Declaring the same
  /// key twice is an error.
  pub fn insert(&mut self, resource: Resource) -> Result<(), ResourceError> {
    let key = resource.key();
    match self.resources.get_mut(&key) {
      None => {
        self.order.push(key.clone());
        self.resources.insert(key, resource);
      }
      Some(_) if !resource.is_declared() => {}
      Some(existing) if !existing.is_declared() => *existing = resource,
      Some(existing) => {
        return Err(ResourceError::Duplicate {
          key,
          first: existing.content_path.clone(),
          second: resource.content_path,
        });
      }
    }
    Ok(())
  }

  pub fn get(&self, key: &ResourceKey) -> Option<&Resource> {
    self.resources.get(key)
  }

  pub fn get_mut(&mut self, key: &ResourceKey) -> Option<&mut Resource> {
    self.resources.get_mut(key)
  }

  pub fn contains(&self, key: &ResourceKey) -> bool {
    self.resources.contains_key(key)
  }

  /// Keys in insertion order.
  pub fn keys(&self) -> impl Iterator<Item = &ResourceKey> {
    self.order.iter()
  }

  /// Resources in insertion order.
  pub fn iter(&self) -> impl Iterator<Item = &Resource> {
    self.order.iter().filter_map(|key| self.resources.get(key))
  }

  /// Resources that carry data, in insertion order.
  pub fn declared(&self) -> impl Iterator<Item = &Resource> {
    self.iter().filter(|r| r.is_declared())
  }

  pub fn len(&self) -> usize {
    self.order.len()
  }

  pub fn is_empty(&self) -> bool {
    self.order.is_empty()
  }
}
