use async_trait::async_trait;
use serde_json::Value;

use crate::api::CourseApi;
use crate::deploy::{DeployError, DeployOutcome, DeployRequest, Deployer};
use crate::resource::{Payload, ResourceInfo};

use super::{id_text, info_id, object_id, upsert};

const SHELL_BODY: &str = "<p>Loading...</p>";

/// Wiki pages. Linked by slug, so the info carries `page_url` as well.
pub struct PageDeployer;

#[async_trait]
impl Deployer for PageDeployer {
  async fn deploy(&self, api: &dyn CourseApi, request: DeployRequest<'_>) -> Result<DeployOutcome, DeployError> {
    let remote_id = request.remote_id();
    let page = upsert(api, "pages", Some("wiki_page"), request.payload, remote_id).await?;

    object_id(&page)?;
    let id = page
      .get("page_id")
      .filter(|v| !v.is_null())
      .or_else(|| page.get("id"))
      .cloned()
      .unwrap_or(Value::Null);
    let slug = match page.get("url").and_then(Value::as_str) {
      Some(slug) => slug.to_string(),
      None => id_text(&id).unwrap_or_default(),
    };
    let uri = format!("{}/pages/{}", api.course_uri(), slug);

    let info = ResourceInfo::new()
      .with("id", id)
      .with("title", page.get("title").cloned().unwrap_or(Value::Null))
      .with("page_url", slug)
      .with("url", format!("{}{}", api.base_url(), uri))
      .with("uri", uri);
    Ok(DeployOutcome::new(info))
  }

  fn shell(&self, data: &Payload) -> Option<Payload> {
    let mut shell = super::shell_with_title(data, "title");
    shell.insert("body".to_string(), Value::String(SHELL_BODY.to_string()));
    Some(shell)
  }

  async fn delete(&self, api: &dyn CourseApi, info: &ResourceInfo) -> Result<(), DeployError> {
    let id = info_id(info, "id")?;
    api.delete(&format!("pages/{id}")).await?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::{ApiCall, MemoryCourse};
  use crate::resource::ResourceKey;
  use crate::util::testutil::payload;
  use serde_json::json;

  #[tokio::test]
  async fn create_then_update_same_page() {
    let course = MemoryCourse::new(7);
    let key = ResourceKey::new("page", "intro");

    let created = PageDeployer
      .deploy(
        &course,
        DeployRequest {
          key: &key,
          payload: payload(json!({"title": "Intro", "body": "<p>hi</p>"})),
          existing: None,
        },
      )
      .await
      .unwrap();
    assert_eq!(created.info.id_string().as_deref(), Some("1"));
    assert_eq!(created.info.url(), Some("https://canvas.test/courses/7/pages/1"));
    assert_eq!(created.info.field_text("uri").as_deref(), Some("/courses/7/pages/1"));

    let updated = PageDeployer
      .deploy(
        &course,
        DeployRequest {
          key: &key,
          payload: payload(json!({"title": "Intro", "body": "<p>hello</p>"})),
          existing: Some(&created.info),
        },
      )
      .await
      .unwrap();

    assert_eq!(updated.info.id_string(), created.info.id_string());
    assert_eq!(course.object("pages/1").unwrap()["body"], "<p>hello</p>");
    assert_eq!(
      course.writes(),
      vec![ApiCall::Create("pages".into()), ApiCall::Update("pages/1".into())]
    );
  }

  #[test]
  fn shell_keeps_title_only() {
    let shell = PageDeployer
      .shell(&payload(json!({"title": "Notes", "body": "__@@quiz||q||url@@__"})))
      .unwrap();
    assert_eq!(
      Value::Object(shell),
      json!({"title": "Notes", "body": "<p>Loading...</p>", "published": false})
    );
  }

  #[test]
  fn shell_title_defaults_to_placeholder() {
    let shell = PageDeployer.shell(&Payload::new()).unwrap();
    assert_eq!(shell["title"], "Placeholder");
  }
}
