//! Link resolution: replacing reference tokens with remote values.
//!
//! Substitution is textual. The payload is encoded as JSON, every token in
//! the text is replaced by the raw field value (no quoting or escaping), and
//! the result is parsed back. A token inside a JSON string thus becomes part
//! of that string, which is how links end up inside HTML bodies.

use std::collections::HashMap;

use thiserror::Error;

use crate::resource::{Payload, ResourceInfo, ResourceKey};
use crate::state::StateStore;
use crate::token::{self, Resolver, TokenError};

#[derive(Debug, Error)]
pub enum LinkError {
  #[error(transparent)]
  Token(#[from] TokenError),

  #[error("failed to encode payload: {0}")]
  Encode(#[source] serde_json::Error),

  #[error("payload is not valid JSON after substitution: {0}")]
  Decode(#[source] serde_json::Error),
}

/// Looks up token targets among resources deployed in this run, then in
/// persisted state.
pub struct LinkResolver<'a> {
  resolved: &'a HashMap<ResourceKey, ResourceInfo>,
  state: &'a StateStore,
}

impl<'a> LinkResolver<'a> {
  pub fn new(resolved: &'a HashMap<ResourceKey, ResourceInfo>, state: &'a StateStore) -> Self {
    Self { resolved, state }
  }

  fn info(&self, key: &ResourceKey) -> Option<&ResourceInfo> {
    self.resolved.get(key).or_else(|| self.state.canvas_info(key))
  }
}

impl Resolver for LinkResolver<'_> {
  fn resolve(&self, rtype: &str, id: &str, field: &str) -> Result<String, TokenError> {
    let key = ResourceKey::new(rtype, id);
    let info = self.info(&key).ok_or_else(|| TokenError::UnknownTarget {
      rtype: rtype.to_string(),
      id: id.to_string(),
    })?;
    info.field_text(field).ok_or_else(|| TokenError::MissingField {
      rtype: rtype.to_string(),
      id: id.to_string(),
      field: field.to_string(),
    })
  }
}

/// Resolve every token in `payload`.
pub fn resolve_links(payload: &Payload, resolver: &impl Resolver) -> Result<Payload, LinkError> {
  let text = serde_json::to_string(payload).map_err(LinkError::Encode)?;
  if token::scan(&text).is_empty() {
    return Ok(payload.clone());
  }
  let substituted = token::substitute(&text, resolver)?;
  serde_json::from_str(&substituted).map_err(LinkError::Decode)
}
