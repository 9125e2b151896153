//! Run report.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::resource::ResourceKey;

use super::types::ReviewNotice;

/// A resource deployed during the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedContent {
  #[serde(rename = "type")]
  pub rtype: String,
  pub id: String,
  pub url: Option<String>,
}

/// Summary handed back to whoever started the run.
///
/// `error` is empty on success and holds the fatal error message otherwise;
/// everything deployed before the failure is still listed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentReport {
  pub deployed_content: Vec<DeployedContent>,
  pub content_to_review: Vec<ReviewNotice>,
  pub error: String,
}

impl DeploymentReport {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record a deployed resource. A resource deployed twice in one run
  /// (shell, then content) is listed once.
  pub fn add_deployed(&mut self, key: &ResourceKey, url: Option<&str>) {
    let url = url.map(str::to_string);
    if let Some(existing) = self
      .deployed_content
      .iter_mut()
      .find(|c| c.rtype == key.rtype && c.id == key.id)
    {
      existing.url = url.or(existing.url.take());
      return;
    }
    self.deployed_content.push(DeployedContent {
      rtype: key.rtype.clone(),
      id: key.id.clone(),
      url,
    });
  }

  pub fn add_review(&mut self, notice: ReviewNotice) {
    self.content_to_review.push(notice);
  }

  pub fn set_error(&mut self, error: &dyn std::error::Error) {
    self.error = error.to_string();
  }

  pub fn is_success(&self) -> bool {
    self.error.is_empty()
  }

  pub fn to_json(&self) -> serde_json::Result<String> {
    serde_json::to_string_pretty(self)
  }

  /// Write the report as JSON.
  pub fn write_to(&self, path: &Path) -> io::Result<()> {
    let json = self.to_json().map_err(io::Error::other)?;
    fs::write(path, json)
  }
}
