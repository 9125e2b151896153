mod deploy;
mod plan;
mod status;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use coursesync_lib::ResourceStore;

pub use deploy::{DeployArgs, cmd_deploy};
pub use plan::cmd_plan;
pub use status::cmd_status;

/// Read the resource file produced by the content parser.
fn load_resources(path: &Path) -> Result<ResourceStore> {
  let text = fs::read_to_string(path).with_context(|| format!("Failed to read resources: {}", path.display()))?;
  ResourceStore::from_json(&text).with_context(|| format!("Invalid resource file: {}", path.display()))
}
