//! Reference cycles broken with shells.

use async_trait::async_trait;
use coursesync_lib::api::{ApiCall, CourseApi};
use coursesync_lib::consts::SHELL_CHECKSUM;
use coursesync_lib::deploy::{
  DeployError, DeployOutcome, DeployRequest, Deployer, DeployerRegistry, EngineError, RunError,
};
use coursesync_lib::{ResourceInfo, ResourceKey};
use coursesync_lib::plan::PlanError;
use serde_json::json;

use super::common::{TestEnv, resource, store, token};

fn key(rtype: &str, id: &str) -> ResourceKey {
  ResourceKey::new(rtype, id)
}

fn triangle(page_title: &str) -> coursesync_lib::ResourceStore {
  store([
    resource("assignment", "a", json!({"name": "A", "description": token("page", "b", "url")})),
    resource("page", "b", json!({"title": page_title, "body": token("quiz", "c", "url")})),
    resource("quiz", "c", json!({"title": "C", "description": token("assignment", "a", "url")})),
  ])
}

#[tokio::test]
async fn three_cycle_is_broken_at_the_page() {
  let env = TestEnv::new();

  let (result, report) = env.deploy(triangle("B")).await;
  let summary = result.unwrap();

  assert_eq!(summary.breakers, vec![key("page", "b")]);
  assert_eq!(summary.execution.shells, vec![key("page", "b")]);
  assert_eq!(summary.execution.deployed, vec![key("assignment", "a"), key("quiz", "c")]);
  assert_eq!(summary.execution.filled, vec![key("page", "b")]);
  assert_eq!(
    env.course.writes(),
    vec![
      ApiCall::Create("pages".into()),
      ApiCall::Create("assignments".into()),
      ApiCall::Create("quizzes".into()),
      ApiCall::Update("pages/1".into()),
    ]
  );

  assert_eq!(
    env.course.object("assignments/2").unwrap()["description"],
    "https://canvas.test/courses/9/pages/1"
  );
  assert_eq!(
    env.course.object("quizzes/3").unwrap()["description"],
    "https://canvas.test/courses/9/assignments/2"
  );
  let page = env.course.object("pages/1").unwrap();
  assert_eq!(page["body"], "https://canvas.test/courses/9/quizzes/3");
  assert_eq!(page["title"], "B");

  // The page is reported once even though it was deployed twice.
  assert_eq!(report.deployed_content.len(), 3);
  let recorded = env.state();
  assert_ne!(recorded.checksum(&key("page", "b")), Some(SHELL_CHECKSUM));
}

#[tokio::test]
async fn redeploying_an_unchanged_cycle_writes_nothing() {
  let env = TestEnv::new();
  env.deploy(triangle("B")).await.0.unwrap();
  env.course.clear_calls();

  let (result, _) = env.deploy(triangle("B")).await;
  let summary = result.unwrap();

  assert!(summary.planned.is_empty());
  assert!(env.course.writes().is_empty());
}

#[tokio::test]
async fn deployed_breaker_is_updated_without_a_shell() {
  let env = TestEnv::new();
  env.deploy(triangle("B")).await.0.unwrap();
  env.course.clear_calls();

  let (result, _) = env.deploy(triangle("B, revised")).await;
  let summary = result.unwrap();

  assert!(summary.execution.shells.is_empty());
  assert!(summary.execution.deployed.is_empty());
  assert_eq!(summary.execution.filled, vec![key("page", "b")]);
  assert_eq!(env.course.writes(), vec![ApiCall::Update("pages/1".into())]);
  assert_eq!(env.course.object("pages/1").unwrap()["title"], "B, revised");
}

struct Offline;

#[async_trait]
impl Deployer for Offline {
  async fn deploy(&self, _api: &dyn CourseApi, _request: DeployRequest<'_>) -> Result<DeployOutcome, DeployError> {
    Err(DeployError::InvalidField {
      field: "title".to_string(),
      message: "quiz service unavailable".to_string(),
    })
  }

  async fn delete(&self, _api: &dyn CourseApi, _info: &ResourceInfo) -> Result<(), DeployError> {
    Ok(())
  }
}

#[tokio::test]
async fn run_interrupted_after_shells_resumes_without_reshelling() {
  let mut env = TestEnv::new();
  env.registry.register("quiz", Offline);

  let (result, _) = env.deploy(triangle("B")).await;
  assert!(result.unwrap_err().to_string().contains("quiz:c"));
  let state = env.state();
  assert_eq!(state.checksum(&key("page", "b")), Some(SHELL_CHECKSUM));
  assert!(state.contains(&key("assignment", "a")));
  assert!(!state.contains(&key("quiz", "c")));
  assert_eq!(env.course.object("pages/1").unwrap()["body"], "<p>Loading...</p>");

  env.registry = DeployerRegistry::canvas();
  env.course.clear_calls();
  let (result, report) = env.deploy(triangle("B")).await;
  let summary = result.unwrap();

  assert_eq!(summary.breakers, vec![key("page", "b")]);
  assert!(summary.execution.shells.is_empty());
  assert_eq!(summary.execution.deployed, vec![key("quiz", "c")]);
  assert_eq!(summary.execution.filled, vec![key("page", "b")]);
  assert_eq!(
    env.course.writes(),
    vec![ApiCall::Create("quizzes".into()), ApiCall::Update("pages/1".into())]
  );
  assert!(report.is_success());

  let page = env.course.object("pages/1").unwrap();
  assert_eq!(page["body"], "https://canvas.test/courses/9/quizzes/3");
  assert_ne!(env.state().checksum(&key("page", "b")), Some(SHELL_CHECKSUM));
}

#[tokio::test]
async fn self_reference_resolves_to_its_own_link() {
  let env = TestEnv::new();
  let (result, _) = env
    .deploy(store([resource(
      "page",
      "home",
      json!({"title": "Home", "body": format!("<a href=\"{}\">top</a>", token("page", "home", "url"))}),
    )]))
    .await;
  let summary = result.unwrap();

  assert_eq!(summary.execution.shells, vec![key("page", "home")]);
  assert_eq!(summary.execution.filled, vec![key("page", "home")]);
  assert_eq!(
    env.course.object("pages/1").unwrap()["body"],
    "<a href=\"https://canvas.test/courses/9/pages/1\">top</a>"
  );
}

#[tokio::test]
async fn cycle_without_shell_support_is_fatal() {
  let env = TestEnv::new();
  let (result, report) = env
    .deploy(store([
      resource("module", "m1", json!({"name": "One", "prerequisite_module_ids": [token("module", "m2", "id")]})),
      resource("module", "m2", json!({"name": "Two", "prerequisite_module_ids": [token("module", "m1", "id")]})),
    ]))
    .await;

  assert!(matches!(
    result.unwrap_err(),
    RunError::Engine(EngineError::Plan(PlanError::UnbreakableCycle { .. }))
  ));
  assert!(!report.is_success());
  assert!(env.course.writes().is_empty());
}
