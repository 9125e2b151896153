use async_trait::async_trait;
use tracing::debug;

use crate::api::CourseApi;
use crate::deploy::{DeployError, DeployOutcome, DeployRequest, Deployer};
use crate::resource::ResourceInfo;
use crate::util::archive::ArchiveSpec;

use super::file::{DEFAULT_FOLDER, delete_file, upload_bytes};

/// Folders packed into a zip archive and uploaded as a file.
///
/// The archive is rebuilt from disk on every deploy; its bytes only depend on
/// the files it contains, so unchanged folders upload identical archives.
pub struct ZipDeployer;

#[async_trait]
impl Deployer for ZipDeployer {
  async fn deploy(&self, api: &dyn CourseApi, request: DeployRequest<'_>) -> Result<DeployOutcome, DeployError> {
    let spec = ArchiveSpec::from_payload(&request.payload)?;
    let folder = request.str_field("canvas_folder").unwrap_or(DEFAULT_FOLDER).to_string();
    let bytes = spec.build()?;
    debug!(archive = %spec.file_name, folder = %folder, size = bytes.len(), "uploading archive");

    Ok(DeployOutcome::new(upload_bytes(api, &folder, spec.file_name, bytes).await?))
  }

  async fn delete(&self, api: &dyn CourseApi, info: &ResourceInfo) -> Result<(), DeployError> {
    delete_file(api, info).await
  }
}
