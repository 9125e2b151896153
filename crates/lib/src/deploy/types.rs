//! Types shared by the deployment driver and the per-type deployers.

use std::fmt;
use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::{ApiError, CourseApi};
use crate::plan::PlanError;
use crate::resource::{Payload, ResourceInfo, ResourceKey};
use crate::state::StateError;
use crate::util::archive::ArchiveError;

use super::links::LinkError;
use super::predeploy::PredeployError;

/// A change the engine applied but a person should confirm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewNotice {
  pub name: String,
  pub link: String,
}

/// One deploy call for a deployer.
#[derive(Debug, Clone)]
pub struct DeployRequest<'a> {
  pub key: &'a ResourceKey,
  /// Payload with every token already resolved.
  pub payload: Payload,
  /// Remote description from an earlier deploy; `Some` means update.
  pub existing: Option<&'a ResourceInfo>,
}

impl DeployRequest<'_> {
  /// Remote id of the object to update, if it already exists.
  pub fn remote_id(&self) -> Option<String> {
    self.existing.and_then(ResourceInfo::id_string)
  }

  /// String field of the payload.
  pub fn str_field(&self, field: &str) -> Option<&str> {
    self.payload.get(field).and_then(serde_json::Value::as_str)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeployOutcome {
  pub info: ResourceInfo,
  pub review: Option<ReviewNotice>,
}

impl DeployOutcome {
  pub fn new(info: ResourceInfo) -> Self {
    Self { info, review: None }
  }

  pub fn with_review(mut self, review: ReviewNotice) -> Self {
    self.review = Some(review);
    self
  }
}

/// Errors from a single deployer call.
#[derive(Debug, Error)]
pub enum DeployError {
  #[error(transparent)]
  Api(#[from] ApiError),

  #[error("missing required field '{0}'")]
  MissingField(String),

  #[error("invalid field '{field}': {message}")]
  InvalidField { field: String, message: String },

  #[error("failed to read {path}: {source}")]
  ReadFile {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error(transparent)]
  Archive(#[from] ArchiveError),

  #[error("no deployer registered for resource type '{0}'")]
  UnsupportedType(String),

  #[error("resource type '{0}' cannot be deleted")]
  NotDeletable(String),
}

impl DeployError {
  pub fn is_not_found(&self) -> bool {
    matches!(self, DeployError::Api(err) if err.is_not_found())
  }
}

/// Creates, updates and deletes one type of remote object.
#[async_trait]
pub trait Deployer: Send + Sync {
  /// Create the object, or update it when `request.existing` is set.
  async fn deploy(&self, api: &dyn CourseApi, request: DeployRequest<'_>) -> Result<DeployOutcome, DeployError>;

  /// Minimal stand-in payload used to break reference cycles.
  ///
  /// Types returning `None` cannot be shells.
  fn shell(&self, _data: &Payload) -> Option<Payload> {
    None
  }

  /// Delete the remote object described by `info`.
  async fn delete(&self, api: &dyn CourseApi, info: &ResourceInfo) -> Result<(), DeployError>;
}

/// Stage of a run in which a resource was being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  Predeploy,
  Shell,
  Deploy,
  Fill,
  Reclaim,
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Phase::Predeploy => "predeploy",
      Phase::Shell => "shell deploy",
      Phase::Deploy => "deploy",
      Phase::Fill => "shell fill-in",
      Phase::Reclaim => "reclaim",
    };
    f.write_str(name)
  }
}

/// Fatal errors of a deployment run.
#[derive(Debug, Error)]
pub enum EngineError {
  #[error(transparent)]
  Plan(#[from] PlanError),

  #[error(transparent)]
  Predeploy(#[from] PredeployError),

  #[error("{phase} of {key} ({location}): cannot resolve links: {source}")]
  Link {
    key: ResourceKey,
    location: String,
    phase: Phase,
    #[source]
    source: LinkError,
  },

  #[error("{phase} of {key} ({location}) failed: {source}")]
  Deploy {
    key: ResourceKey,
    location: String,
    phase: Phase,
    #[source]
    source: DeployError,
  },

  #[error("{phase} of {key} ({location}): {message}")]
  Invalid {
    key: ResourceKey,
    location: String,
    phase: Phase,
    message: String,
  },

  #[error("failed to checkpoint state: {0}")]
  Checkpoint(#[from] StateError),
}
