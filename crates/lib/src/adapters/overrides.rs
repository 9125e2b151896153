use async_trait::async_trait;
use serde_json::Value;

use crate::api::CourseApi;
use crate::deploy::{DeployError, DeployOutcome, DeployRequest, Deployer};
use crate::resource::{Payload, ResourceInfo};

use super::{id_text, info_id, object_id, required_id, upsert};

/// Due-date overrides for a section or a set of students.
///
/// Overrides hang off an assignment. A quiz override names its quiz through
/// `quiz_id` and is attached to the quiz's backing assignment.
pub struct OverrideDeployer;

impl OverrideDeployer {
  async fn assignment_id(api: &dyn CourseApi, payload: &mut Payload) -> Result<String, DeployError> {
    if let Some(quiz_id) = payload.remove("quiz_id") {
      let quiz_id = id_text(&quiz_id).ok_or_else(|| DeployError::MissingField("quiz_id".to_string()))?;
      let quiz = api.get(&format!("quizzes/{quiz_id}")).await?;
      payload.remove("assignment_id");
      return quiz
        .as_ref()
        .and_then(|q| q.get("assignment_id"))
        .and_then(id_text)
        .ok_or_else(|| DeployError::InvalidField {
          field: "quiz_id".to_string(),
          message: format!("quiz {quiz_id} has no assignment"),
        });
    }

    let id = required_id(payload, "assignment_id")?;
    payload.remove("assignment_id");
    Ok(id)
  }
}

#[async_trait]
impl Deployer for OverrideDeployer {
  async fn deploy(&self, api: &dyn CourseApi, request: DeployRequest<'_>) -> Result<DeployOutcome, DeployError> {
    let remote_id = request.remote_id();
    let mut payload = request.payload;
    let assignment_id = Self::assignment_id(api, &mut payload).await?;

    let collection = format!("assignments/{assignment_id}/overrides");
    let over = upsert(api, &collection, Some("assignment_override"), payload, remote_id).await?;
    object_id(&over)?;

    let uri = format!("{}/assignments/{}", api.course_uri(), assignment_id);
    let info = ResourceInfo::new()
      .with("id", over.get("id").cloned().unwrap_or(Value::Null))
      .with("assignment_id", assignment_id)
      .with("title", over.get("title").cloned().unwrap_or(Value::Null))
      .with("url", format!("{}{}", api.base_url(), uri))
      .with("uri", uri);
    Ok(DeployOutcome::new(info))
  }

  async fn delete(&self, api: &dyn CourseApi, info: &ResourceInfo) -> Result<(), DeployError> {
    let assignment_id = info_id(info, "assignment_id")?;
    let id = info_id(info, "id")?;
    api
      .delete(&format!("assignments/{assignment_id}/overrides/{id}"))
      .await?;
    Ok(())
  }
}
