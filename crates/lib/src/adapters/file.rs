use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::api::CourseApi;
use crate::deploy::{DeployError, DeployOutcome, DeployRequest, Deployer};
use crate::resource::ResourceInfo;

use super::{info_id, object_id};

/// Folder uploads land in unless the payload names `canvas_folder`.
pub const DEFAULT_FOLDER: &str = "deployed_files";

/// Uploaded files. The payload carries the local `path`; the bytes are read
/// at deploy time. Re-uploading under the same name replaces the file.
///
/// Only the bytes, name and folder reach the platform; other payload fields
/// such as `content_hash` exist for change detection.
pub struct FileDeployer;

fn file_name(path: &Path, payload_name: Option<&str>) -> Result<String, DeployError> {
  if let Some(name) = payload_name.filter(|n| !n.is_empty()) {
    return Ok(name.to_string());
  }
  path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .ok_or_else(|| DeployError::InvalidField {
      field: "path".to_string(),
      message: format!("{} has no file name", path.display()),
    })
}

/// Upload `bytes` as `name` into `folder` and describe the resulting file.
pub(super) async fn upload_bytes(
  api: &dyn CourseApi,
  folder: &str,
  name: String,
  bytes: Vec<u8>,
) -> Result<ResourceInfo, DeployError> {
  let file = api.upload(folder, &name, bytes).await?;
  let id = object_id(&file)?;
  let uri = format!("{}/files/{}", api.course_uri(), id);

  Ok(
    ResourceInfo::new()
      .with("id", file.get("id").cloned().unwrap_or(Value::Null))
      .with("title", file.get("display_name").cloned().unwrap_or(Value::String(name)))
      .with("url", format!("{}{}", api.base_url(), uri))
      .with("uri", uri),
  )
}

/// Delete an uploaded file by its recorded id.
pub(super) async fn delete_file(api: &dyn CourseApi, info: &ResourceInfo) -> Result<(), DeployError> {
  let id = info_id(info, "id")?;
  api.delete(&format!("/files/{id}")).await?;
  Ok(())
}

#[async_trait]
impl Deployer for FileDeployer {
  async fn deploy(&self, api: &dyn CourseApi, request: DeployRequest<'_>) -> Result<DeployOutcome, DeployError> {
    let path = request
      .str_field("path")
      .map(PathBuf::from)
      .ok_or_else(|| DeployError::MissingField("path".to_string()))?;
    let name = file_name(&path, request.str_field("name"))?;
    let folder = request.str_field("canvas_folder").unwrap_or(DEFAULT_FOLDER).to_string();

    let bytes = tokio::fs::read(&path).await.map_err(|source| DeployError::ReadFile {
      path: path.clone(),
      source,
    })?;
    debug!(path = %path.display(), folder = %folder, size = bytes.len(), "uploading file");

    Ok(DeployOutcome::new(upload_bytes(api, &folder, name, bytes).await?))
  }

  async fn delete(&self, api: &dyn CourseApi, info: &ResourceInfo) -> Result<(), DeployError> {
    delete_file(api, info).await
  }
}
