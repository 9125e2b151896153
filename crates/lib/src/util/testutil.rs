//! Fixtures shared by the unit tests of this crate.

use serde_json::Value;

use crate::resource::{Payload, Resource, ResourceStore};

/// Build a declared resource from a JSON object literal.
pub fn resource(rtype: &str, id: &str, data: Value) -> Resource {
  let data = match data {
    Value::Object(map) => map,
    other => panic!("test payload must be an object, got {other}"),
  };
  Resource::new(rtype, id, data).with_content_path(format!("{id}.md"))
}

/// Build a store from resources, in the given order.
pub fn store(resources: impl IntoIterator<Item = Resource>) -> ResourceStore {
  let mut store = ResourceStore::new();
  for resource in resources {
    store.insert(resource).unwrap();
  }
  store
}

/// Payload from a JSON object literal.
pub fn payload(value: Value) -> Payload {
  match value {
    Value::Object(map) => map,
    other => panic!("test payload must be an object, got {other}"),
  }
}
