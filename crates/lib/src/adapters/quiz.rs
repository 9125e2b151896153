use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::api::CourseApi;
use crate::deploy::{DeployError, DeployOutcome, DeployRequest, Deployer, ReviewNotice};
use crate::resource::{Payload, ResourceInfo};

use super::{
  base_info, id_text, info_id, object_id, required_id, resolve_assignment_group, shell_with_title, upsert,
};

const SHELL_DESCRIPTION: &str = "<p>Shell quiz for dependency cycle.</p>";

/// Classic quizzes. Questions are deployed separately as `quiz_question`.
///
/// Editing a quiz students have already taken can invalidate their
/// submissions, so such edits are flagged for review. Quizzes without
/// submissions are unpublished around the edit.
pub struct QuizDeployer;

impl QuizDeployer {
  async fn submission_count(api: &dyn CourseApi, id: &str) -> Result<usize, DeployError> {
    let submissions = api.get(&format!("quizzes/{id}/submissions")).await?;
    Ok(
      submissions
        .as_ref()
        .and_then(|s| s.get("quiz_submissions"))
        .and_then(Value::as_array)
        .map_or(0, Vec::len),
    )
  }

  async fn set_published(api: &dyn CourseApi, id: &str, published: bool) -> Result<Value, DeployError> {
    let quiz = api
      .update(&format!("quizzes/{id}"), json!({"quiz": {"published": published}}))
      .await?;
    Ok(quiz)
  }

  async fn update(api: &dyn CourseApi, id: String, mut payload: Payload) -> Result<(Value, Option<ReviewNotice>), DeployError> {
    let submissions = Self::submission_count(api, &id).await?;
    if submissions > 0 {
      info!(quiz = %id, submissions, "editing quiz with submissions");
      let quiz = upsert(api, "quizzes", Some("quiz"), payload, Some(id)).await?;
      let review = ReviewNotice {
        name: quiz
          .get("title")
          .and_then(Value::as_str)
          .unwrap_or("Untitled quiz")
          .to_string(),
        link: quiz.get("html_url").and_then(Value::as_str).unwrap_or_default().to_string(),
      };
      return Ok((quiz, Some(review)));
    }

    let current = api.get(&format!("quizzes/{id}")).await?;
    let was_published = current
      .as_ref()
      .and_then(|q| q.get("published"))
      .and_then(Value::as_bool)
      .unwrap_or(false);
    let publish = payload.get("published").and_then(Value::as_bool).unwrap_or(was_published);

    if was_published {
      debug!(quiz = %id, "unpublishing quiz for edit");
      Self::set_published(api, &id, false).await?;
    }
    payload.insert("published".to_string(), Value::Bool(false));
    let mut quiz = upsert(api, "quizzes", Some("quiz"), payload, Some(id.clone())).await?;
    if publish {
      debug!(quiz = %id, "republishing quiz");
      quiz = Self::set_published(api, &id, true).await?;
    }
    Ok((quiz, None))
  }
}

#[async_trait]
impl Deployer for QuizDeployer {
  async fn deploy(&self, api: &dyn CourseApi, request: DeployRequest<'_>) -> Result<DeployOutcome, DeployError> {
    let remote_id = request.remote_id();
    let mut payload = request.payload;
    resolve_assignment_group(api, &mut payload).await?;
    let (quiz, review) = match remote_id {
      Some(id) => Self::update(api, id, payload).await?,
      None => (upsert(api, "quizzes", Some("quiz"), payload, None).await?, None),
    };

    let id = object_id(&quiz)?;
    let uri = format!("{}/quizzes/{}", api.course_uri(), id);
    let mut info = base_info(&quiz, "title", uri, api.base_url());
    if let Some(assignment_id) = quiz.get("assignment_id").filter(|v| !v.is_null()) {
      info.insert("assignment_id", assignment_id.clone());
    }

    let outcome = DeployOutcome::new(info);
    Ok(match review {
      Some(review) => outcome.with_review(review),
      None => outcome,
    })
  }

  fn shell(&self, data: &Payload) -> Option<Payload> {
    let mut shell = shell_with_title(data, "title");
    shell.insert("description".to_string(), Value::String(SHELL_DESCRIPTION.to_string()));
    if let Some(quiz_type) = data.get("quiz_type") {
      shell.insert("quiz_type".to_string(), quiz_type.clone());
    }
    Some(shell)
  }

  async fn delete(&self, api: &dyn CourseApi, info: &ResourceInfo) -> Result<(), DeployError> {
    let id = info_id(info, "id")?;
    api.delete(&format!("quizzes/{id}")).await?;
    Ok(())
  }
}

/// Questions of a quiz. The payload names its quiz through `quiz_id`.
pub struct QuizQuestionDeployer;

#[async_trait]
impl Deployer for QuizQuestionDeployer {
  async fn deploy(&self, api: &dyn CourseApi, request: DeployRequest<'_>) -> Result<DeployOutcome, DeployError> {
    let quiz_id = required_id(&request.payload, "quiz_id")?;
    let quiz = api
      .get(&format!("quizzes/{quiz_id}"))
      .await?
      .ok_or_else(|| DeployError::InvalidField {
        field: "quiz_id".to_string(),
        message: format!("quiz {quiz_id} does not exist"),
      })?;

    let position = request.payload.get("position").cloned().unwrap_or(json!(0));
    let remote_id = request.remote_id();
    let collection = format!("quizzes/{quiz_id}/questions");
    let question = upsert(api, &collection, Some("question"), request.payload, remote_id).await?;
    let id = object_id(&question)?;
    debug!(quiz = %quiz_id, question = %id, "deployed quiz question");

    let uri = format!("{}/quizzes/{}", api.course_uri(), quiz_id);
    let url = quiz
      .get("html_url")
      .and_then(Value::as_str)
      .map(str::to_string)
      .unwrap_or_else(|| format!("{}{}", api.base_url(), uri));
    let info = ResourceInfo::new()
      .with("id", question.get("id").cloned().unwrap_or(Value::Null))
      .with("quiz_id", quiz.get("id").and_then(id_text).unwrap_or(quiz_id))
      .with("position", position)
      .with("uri", uri)
      .with("url", url);
    Ok(DeployOutcome::new(info))
  }

  async fn delete(&self, api: &dyn CourseApi, info: &ResourceInfo) -> Result<(), DeployError> {
    let quiz_id = info_id(info, "quiz_id")?;
    let id = info_id(info, "id")?;
    api.delete(&format!("quizzes/{quiz_id}/questions/{id}")).await?;
    Ok(())
  }
}
