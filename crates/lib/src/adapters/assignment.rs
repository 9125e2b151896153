use async_trait::async_trait;
use serde_json::{Value, json};

use crate::api::CourseApi;
use crate::deploy::{DeployError, DeployOutcome, DeployRequest, Deployer};
use crate::resource::{Payload, ResourceInfo};

use super::{base_info, info_id, object_id, resolve_assignment_group, shell_with_title, upsert};

const SHELL_DESCRIPTION: &str = "<p>Loading...</p>";

pub struct AssignmentDeployer;

#[async_trait]
impl Deployer for AssignmentDeployer {
  async fn deploy(&self, api: &dyn CourseApi, request: DeployRequest<'_>) -> Result<DeployOutcome, DeployError> {
    let remote_id = request.remote_id();
    let mut payload = request.payload;
    resolve_assignment_group(api, &mut payload).await?;
    let assignment = upsert(api, "assignments", Some("assignment"), payload, remote_id).await?;
    let id = object_id(&assignment)?;
    let uri = format!("{}/assignments/{}", api.course_uri(), id);
    Ok(DeployOutcome::new(base_info(&assignment, "name", uri, api.base_url())))
  }

  fn shell(&self, data: &Payload) -> Option<Payload> {
    let mut shell = shell_with_title(data, "name");
    shell.insert("description".to_string(), Value::String(SHELL_DESCRIPTION.to_string()));
    shell.insert(
      "points_possible".to_string(),
      data.get("points_possible").cloned().unwrap_or(json!(0)),
    );
    shell.insert("submission_types".to_string(), json!(["none"]));
    Some(shell)
  }

  async fn delete(&self, api: &dyn CourseApi, info: &ResourceInfo) -> Result<(), DeployError> {
    let id = info_id(info, "id")?;
    api.delete(&format!("assignments/{id}")).await?;
    Ok(())
  }
}

/// Assignment groups take their fields unwrapped.
pub struct AssignmentGroupDeployer;

#[async_trait]
impl Deployer for AssignmentGroupDeployer {
  async fn deploy(&self, api: &dyn CourseApi, request: DeployRequest<'_>) -> Result<DeployOutcome, DeployError> {
    let remote_id = request.remote_id();
    let group = upsert(api, "assignment_groups", None, request.payload, remote_id).await?;
    let id = object_id(&group)?;
    let uri = format!("{}/assignments#assignment_group_{}", api.course_uri(), id);
    let info = ResourceInfo::new()
      .with("id", group.get("id").cloned().unwrap_or(Value::Null))
      .with("title", group.get("name").cloned().unwrap_or(Value::Null))
      .with("url", format!("{}{}", api.base_url(), uri))
      .with("uri", uri);
    Ok(DeployOutcome::new(info))
  }

  async fn delete(&self, api: &dyn CourseApi, info: &ResourceInfo) -> Result<(), DeployError> {
    let id = info_id(info, "id")?;
    api.delete(&format!("assignment_groups/{id}")).await?;
    Ok(())
  }
}
