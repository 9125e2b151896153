use async_trait::async_trait;
use serde_json::Value;

use crate::api::CourseApi;
use crate::deploy::{DeployError, DeployOutcome, DeployRequest, Deployer};
use crate::resource::ResourceInfo;

use super::{base_info, info_id, object_id, upsert};

/// Announcements are discussion topics flagged `is_announcement`.
pub struct AnnouncementDeployer;

#[async_trait]
impl Deployer for AnnouncementDeployer {
  async fn deploy(&self, api: &dyn CourseApi, request: DeployRequest<'_>) -> Result<DeployOutcome, DeployError> {
    let remote_id = request.remote_id();
    let mut payload = request.payload;
    payload.insert("is_announcement".to_string(), Value::Bool(true));

    let topic = upsert(api, "discussion_topics", None, payload, remote_id).await?;
    let id = object_id(&topic)?;
    let uri = format!("{}/discussion_topics/{}", api.course_uri(), id);
    Ok(DeployOutcome::new(base_info(&topic, "title", uri, api.base_url())))
  }

  async fn delete(&self, api: &dyn CourseApi, info: &ResourceInfo) -> Result<(), DeployError> {
    let id = info_id(info, "id")?;
    api.delete(&format!("discussion_topics/{id}")).await?;
    Ok(())
  }
}
