//! Course connection settings.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};

use coursesync_lib::consts::API_TOKEN_ENV;

/// Contents of the course info file. Unknown keys are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct CourseInfo {
  #[serde(rename = "CANVAS_API_URL")]
  pub api_url: String,
  #[serde(rename = "CANVAS_COURSE_ID", deserialize_with = "course_id")]
  pub course_id: u64,
  #[serde(rename = "LOCAL_TIME_ZONE", default = "default_time_zone")]
  pub time_zone: String,
  #[serde(rename = "COURSE_NAME", default)]
  pub course_name: Option<String>,
  #[serde(rename = "COURSE_CODE", default)]
  pub course_code: Option<String>,
}

fn default_time_zone() -> String {
  "UTC".to_string()
}

/// Course ids appear both as numbers and as strings in existing files.
fn course_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Id {
    Number(u64),
    Text(String),
  }

  match Id::deserialize(deserializer)? {
    Id::Number(id) => Ok(id),
    Id::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
  }
}

impl CourseInfo {
  pub fn load(path: &Path) -> Result<Self> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read course info: {}", path.display()))?;
    Self::parse(&text).with_context(|| format!("Invalid course info: {}", path.display()))
  }

  fn parse(text: &str) -> Result<Self> {
    Ok(serde_json::from_str(text)?)
  }

  /// Name shown in output: course name, else code, else id.
  pub fn display_name(&self) -> String {
    self
      .course_name
      .clone()
      .or_else(|| self.course_code.clone())
      .unwrap_or_else(|| format!("course {}", self.course_id))
  }
}

/// API token from the environment.
pub fn api_token() -> Result<String> {
  std::env::var(API_TOKEN_ENV).with_context(|| format!("{API_TOKEN_ENV} is not set"))
}
