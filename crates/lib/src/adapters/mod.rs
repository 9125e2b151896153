//! Canvas deployers, one per resource type.
//!
//! Each deployer maps a resolved payload onto the platform's endpoints and
//! returns the [`ResourceInfo`] other resources may link to.

mod announcement;
mod archive;
mod assignment;
mod course;
mod file;
mod module;
mod overrides;
mod page;
mod quiz;

pub use announcement::AnnouncementDeployer;
pub use archive::ZipDeployer;
pub use assignment::{AssignmentDeployer, AssignmentGroupDeployer};
pub use course::{CourseSettingsDeployer, SyllabusDeployer};
pub use file::FileDeployer;
pub use module::{ModuleDeployer, ModuleItemDeployer};
pub use overrides::OverrideDeployer;
pub use page::PageDeployer;
pub use quiz::{QuizDeployer, QuizQuestionDeployer};

use serde_json::{Map, Value};
use tracing::debug;

use crate::api::CourseApi;
use crate::deploy::DeployError;
use crate::resource::{Payload, ResourceInfo};

/// Body shape the platform expects: `{"<wrapper>": payload}` or the bare payload.
fn body(wrapper: Option<&str>, payload: Payload) -> Value {
  match wrapper {
    Some(wrapper) => {
      let mut map = Map::new();
      map.insert(wrapper.to_string(), Value::Object(payload));
      Value::Object(map)
    }
    None => Value::Object(payload),
  }
}

/// Create under `collection`, or update `collection/<id>` when `remote_id` is set.
async fn upsert(
  api: &dyn CourseApi,
  collection: &str,
  wrapper: Option<&str>,
  payload: Payload,
  remote_id: Option<String>,
) -> Result<Value, DeployError> {
  let body = body(wrapper, payload);
  let object = match remote_id {
    Some(id) => api.update(&format!("{collection}/{id}"), body).await?,
    None => api.create(collection, body).await?,
  };
  Ok(object)
}

/// Render an id given as a JSON string or number.
fn id_text(value: &Value) -> Option<String> {
  match value {
    Value::String(s) if !s.is_empty() => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

/// Id of the object the platform returned.
fn object_id(object: &Value) -> Result<String, DeployError> {
  object
    .get("id")
    .and_then(id_text)
    .ok_or_else(|| DeployError::InvalidField {
      field: "id".to_string(),
      message: "platform response has no id".to_string(),
    })
}

/// An id field every payload of a type must carry, such as a parent id.
fn required_id(payload: &Payload, field: &str) -> Result<String, DeployError> {
  payload
    .get(field)
    .and_then(id_text)
    .ok_or_else(|| DeployError::MissingField(field.to_string()))
}

/// An id recorded in a previous deploy's info.
fn info_id(info: &ResourceInfo, field: &str) -> Result<String, DeployError> {
  info
    .field_text(field)
    .ok_or_else(|| DeployError::MissingField(field.to_string()))
}

/// Swap a group given by name in `assignment_group` for the
/// `assignment_group_id` the platform expects. Numeric values are ids already.
async fn resolve_assignment_group(api: &dyn CourseApi, payload: &mut Payload) -> Result<(), DeployError> {
  let Some(group) = payload.remove("assignment_group") else {
    return Ok(());
  };
  let name = match group {
    Value::Null => return Ok(()),
    Value::Number(_) => {
      payload.insert("assignment_group_id".to_string(), group);
      return Ok(());
    }
    Value::String(text) if text.parse::<u64>().is_ok() => {
      payload.insert("assignment_group_id".to_string(), Value::String(text));
      return Ok(());
    }
    Value::String(text) => text,
    other => {
      return Err(DeployError::InvalidField {
        field: "assignment_group".to_string(),
        message: format!("expected a group name or id, got {other}"),
      });
    }
  };

  let groups = api.list("assignment_groups").await?;
  let id = groups
    .iter()
    .find(|g| g.get("name").and_then(Value::as_str) == Some(name.as_str()))
    .and_then(|g| g.get("id").cloned())
    .ok_or_else(|| DeployError::InvalidField {
      field: "assignment_group".to_string(),
      message: format!("no assignment group named '{name}'"),
    })?;
  debug!(group = %name, id = %id, "resolved assignment group");
  payload.insert("assignment_group_id".to_string(), id);
  Ok(())
}

/// Common info fields: id, title, link.
fn base_info(object: &Value, title_field: &str, uri: String, base_url: &str) -> ResourceInfo {
  let url = object
    .get("html_url")
    .and_then(Value::as_str)
    .map(str::to_string)
    .unwrap_or_else(|| format!("{base_url}{uri}"));
  ResourceInfo::new()
    .with("id", object.get("id").cloned().unwrap_or(Value::Null))
    .with("title", object.get(title_field).cloned().unwrap_or(Value::Null))
    .with("uri", uri)
    .with("url", url)
}

/// Start a shell payload, keeping the author's title when present.
fn shell_with_title(data: &Payload, title_field: &str) -> Payload {
  let mut shell = Payload::new();
  let title = data
    .get(title_field)
    .and_then(Value::as_str)
    .filter(|t| !t.is_empty())
    .unwrap_or("Placeholder");
  shell.insert(title_field.to_string(), Value::String(title.to_string()));
  shell.insert("published".to_string(), Value::Bool(false));
  shell
}
