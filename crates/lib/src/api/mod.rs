//! Remote course platform client.
//!
//! [`CourseApi`] is the narrow surface the engine needs from the platform:
//! JSON CRUD on course-relative paths plus file upload. [`CanvasClient`]
//! talks to a real Canvas instance; [`MemoryCourse`] keeps objects in memory
//! for tests and offline runs.
//!
//! Paths are relative to the course (`pages/12`, `quizzes/3/questions`); an
//! empty path is the course itself. Paths starting with `/` address
//! platform-wide endpoints (`/files/9`).

pub mod canvas;
pub mod memory;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use canvas::CanvasClient;
pub use memory::{ApiCall, MemoryCourse};

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {path}")]
  NotFound { path: String },

  #[error("request to {path} failed with status {status}: {body}")]
  Status { path: String, status: u16, body: String },

  #[error("request to {path} failed: {source}")]
  Transport {
    path: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("unexpected response from {path}: {message}")]
  Unexpected { path: String, message: String },
}

impl ApiError {
  pub fn is_not_found(&self) -> bool {
    matches!(self, ApiError::NotFound { .. })
  }
}

#[async_trait]
pub trait CourseApi: Send + Sync {
  fn course_id(&self) -> u64;

  /// Platform root, e.g. `https://school.instructure.com`.
  fn base_url(&self) -> &str;

  /// Course path as used in platform links, e.g. `/courses/42`.
  fn course_uri(&self) -> String {
    format!("/courses/{}", self.course_id())
  }

  /// Fetch one object. A missing object is `Ok(None)`.
  async fn get(&self, path: &str) -> Result<Option<Value>, ApiError>;

  /// Fetch every object of a collection, following pagination.
  async fn list(&self, path: &str) -> Result<Vec<Value>, ApiError>;

  async fn create(&self, path: &str, body: Value) -> Result<Value, ApiError>;

  async fn update(&self, path: &str, body: Value) -> Result<Value, ApiError>;

  /// Delete one object. A missing object is [`ApiError::NotFound`].
  async fn delete(&self, path: &str) -> Result<(), ApiError>;

  /// Upload a file into the course folder `folder`, returning the file object.
  async fn upload(&self, folder: &str, name: &str, bytes: Vec<u8>) -> Result<Value, ApiError>;
}
