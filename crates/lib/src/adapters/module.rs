use async_trait::async_trait;
use serde_json::Value;

use crate::api::CourseApi;
use crate::deploy::{DeployError, DeployOutcome, DeployRequest, Deployer};
use crate::resource::ResourceInfo;

use super::{info_id, object_id, required_id, upsert};

/// Course modules. Modules have no page of their own; links point at the
/// anchor on the modules index.
pub struct ModuleDeployer;

#[async_trait]
impl Deployer for ModuleDeployer {
  async fn deploy(&self, api: &dyn CourseApi, request: DeployRequest<'_>) -> Result<DeployOutcome, DeployError> {
    let remote_id = request.remote_id();
    let module = upsert(api, "modules", Some("module"), request.payload, remote_id).await?;
    let id = object_id(&module)?;
    let uri = format!("{}/modules#module_{}", api.course_uri(), id);

    let info = ResourceInfo::new()
      .with("id", module.get("id").cloned().unwrap_or(Value::Null))
      .with("title", module.get("name").cloned().unwrap_or(Value::Null))
      .with("url", format!("{}{}", api.base_url(), uri))
      .with("uri", uri);
    Ok(DeployOutcome::new(info))
  }

  async fn delete(&self, api: &dyn CourseApi, info: &ResourceInfo) -> Result<(), DeployError> {
    let id = info_id(info, "id")?;
    api.delete(&format!("modules/{id}")).await?;
    Ok(())
  }
}

/// Entries of a module, named by `module_id` in the payload.
pub struct ModuleItemDeployer;

#[async_trait]
impl Deployer for ModuleItemDeployer {
  async fn deploy(&self, api: &dyn CourseApi, request: DeployRequest<'_>) -> Result<DeployOutcome, DeployError> {
    let module_id = required_id(&request.payload, "module_id")?;
    let remote_id = request.remote_id();
    let collection = format!("modules/{module_id}/items");
    let item = upsert(api, &collection, Some("module_item"), request.payload, remote_id).await?;
    object_id(&item)?;

    let uri = format!("{}/modules#module_{}", api.course_uri(), module_id);
    let info = ResourceInfo::new()
      .with("id", item.get("id").cloned().unwrap_or(Value::Null))
      .with("module_id", module_id)
      .with("title", item.get("title").cloned().unwrap_or(Value::Null))
      .with("url", format!("{}{}", api.base_url(), uri))
      .with("uri", uri);
    Ok(DeployOutcome::new(info))
  }

  async fn delete(&self, api: &dyn CourseApi, info: &ResourceInfo) -> Result<(), DeployError> {
    let module_id = info_id(info, "module_id")?;
    let id = info_id(info, "id")?;
    api.delete(&format!("modules/{module_id}/items/{id}")).await?;
    Ok(())
  }
}
