use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::api::CourseApi;
use crate::deploy::{DeployError, DeployOutcome, DeployRequest, Deployer};
use crate::resource::ResourceInfo;

/// The course syllabus, stored on the course object itself.
pub struct SyllabusDeployer;

#[async_trait]
impl Deployer for SyllabusDeployer {
  async fn deploy(&self, api: &dyn CourseApi, request: DeployRequest<'_>) -> Result<DeployOutcome, DeployError> {
    let content = request
      .payload
      .get("content")
      .cloned()
      .ok_or_else(|| DeployError::MissingField("content".to_string()))?;
    api.update("", json!({"course": {"syllabus_body": content}})).await?;

    let uri = format!("{}/assignments/syllabus", api.course_uri());
    let info = ResourceInfo::new()
      .with("id", api.course_id().to_string())
      .with("title", "Syllabus")
      .with("url", format!("{}{}", api.base_url(), uri))
      .with("uri", uri);
    Ok(DeployOutcome::new(info))
  }

  async fn delete(&self, _api: &dyn CourseApi, _info: &ResourceInfo) -> Result<(), DeployError> {
    Err(DeployError::NotDeletable("syllabus".to_string()))
  }
}

/// Course-level settings: name, code, image and the nested `settings` object.
pub struct CourseSettingsDeployer;

#[async_trait]
impl Deployer for CourseSettingsDeployer {
  async fn deploy(&self, api: &dyn CourseApi, request: DeployRequest<'_>) -> Result<DeployOutcome, DeployError> {
    let mut course_fields = request.payload;
    if let Some(settings) = course_fields.remove("settings") {
      if !settings.is_object() {
        return Err(DeployError::InvalidField {
          field: "settings".to_string(),
          message: "expected an object".to_string(),
        });
      }
      api.update("settings", settings).await?;
    }

    let mut course = api.get("").await?.unwrap_or(Value::Null);
    if !course_fields.is_empty() {
      let mut body = Map::new();
      body.insert("course".to_string(), Value::Object(course_fields));
      course = api.update("", Value::Object(body)).await?;
    }

    let uri = api.course_uri();
    let info = ResourceInfo::new()
      .with("id", api.course_id().to_string())
      .with("title", course.get("name").cloned().unwrap_or(Value::Null))
      .with("url", format!("{}{}", api.base_url(), uri))
      .with("uri", uri);
    Ok(DeployOutcome::new(info))
  }

  async fn delete(&self, _api: &dyn CourseApi, _info: &ResourceInfo) -> Result<(), DeployError> {
    Err(DeployError::NotDeletable("course_settings".to_string()))
  }
}
