//! Scheduling, change detection and failure handling of full runs.

use async_trait::async_trait;
use coursesync_lib::ResourceKey;
use coursesync_lib::api::{ApiCall, CourseApi};
use coursesync_lib::deploy::{
  DeployError, DeployOutcome, DeployRequest, Deployer, EngineError, ReviewNotice, RunError, RunOptions,
};
use coursesync_lib::plan::PlanError;
use coursesync_lib::ResourceInfo;
use serde_json::json;

use super::common::{TestEnv, resource, store, token};

fn key(rtype: &str, id: &str) -> ResourceKey {
  ResourceKey::new(rtype, id)
}

#[tokio::test]
async fn linear_chain_deploys_dependencies_first() {
  let env = TestEnv::new();
  let resources = store([
    resource("page", "a", json!({"title": "A", "body": token("page", "b", "url")})),
    resource("page", "b", json!({"title": "B", "body": token("page", "c", "url")})),
    resource("page", "c", json!({"title": "C", "body": "end"})),
  ]);

  let (result, report) = env.deploy(resources).await;
  let summary = result.unwrap();

  assert_eq!(summary.execution.deployed, vec![key("page", "c"), key("page", "b"), key("page", "a")]);
  assert!(summary.execution.shells.is_empty());
  assert!(report.is_success());

  let c_url = env.state().canvas_info(&key("page", "c")).unwrap().url().unwrap().to_string();
  let b = env.course.object("pages/2").unwrap();
  assert_eq!(b["body"], c_url.as_str());
}

#[tokio::test]
async fn second_run_is_a_no_op() {
  let env = TestEnv::new();
  let resources = || {
    store([
      resource("assignment", "hw1", json!({"name": "HW 1", "description": token("page", "notes", "url")})),
      resource("page", "notes", json!({"title": "Notes", "body": "<p>notes</p>"})),
    ])
  };

  let (first, _) = env.deploy(resources()).await;
  assert_eq!(first.unwrap().execution.total(), 2);
  env.course.clear_calls();

  let (second, report) = env.deploy(resources()).await;
  let summary = second.unwrap();

  assert!(summary.planned.is_empty());
  assert_eq!(summary.execution.total(), 0);
  assert!(env.course.writes().is_empty());
  assert!(report.deployed_content.is_empty());
}

#[tokio::test]
async fn edited_resource_is_redeployed_alone() {
  let env = TestEnv::new();
  let (first, _) = env
    .deploy(store([
      resource("page", "a", json!({"title": "A", "body": token("page", "b", "url")})),
      resource("page", "b", json!({"title": "B"})),
    ]))
    .await;
  first.unwrap();
  env.course.clear_calls();

  let (second, _) = env
    .deploy(store([
      resource("page", "a", json!({"title": "A", "body": token("page", "b", "url")})),
      resource("page", "b", json!({"title": "B, revised"})),
    ]))
    .await;

  assert_eq!(second.unwrap().planned, vec![key("page", "b")]);
  assert_eq!(env.course.writes(), vec![ApiCall::Update("pages/1".into())]);
}

#[tokio::test]
async fn edited_file_bytes_redeploy_the_file_and_pages_linking_to_it() {
  let env = TestEnv::new();
  let path = env.temp.path().join("handout.pdf");
  std::fs::write(&path, b"v1").unwrap();
  let path = path.to_string_lossy().to_string();

  let resources = || {
    store([
      resource("file", "handout.pdf", json!({"path": path, "canvas_folder": "handouts"})),
      resource("page", "unit", json!({"title": "Unit", "body": token("file", "handout.pdf", "url")})),
      resource("page", "other", json!({"title": "Other"})),
    ])
  };

  env.deploy(resources()).await.0.unwrap();
  env.course.clear_calls();

  // Same document; only the bytes on disk change.
  let (result, _) = env.deploy(resources()).await;
  assert!(result.unwrap().planned.is_empty());
  assert!(env.course.writes().is_empty());

  std::fs::write(env.temp.path().join("handout.pdf"), b"v2 changed content").unwrap();
  let (result, _) = env.deploy(resources()).await;
  let summary = result.unwrap();

  assert_eq!(summary.planned, vec![key("file", "handout.pdf"), key("page", "unit")]);
  assert_eq!(env.course.writes()[0], ApiCall::Upload("handout.pdf".into()));
  let uploaded = env.state().canvas_info(&key("file", "handout.pdf")).cloned().unwrap();
  let stored = env
    .course
    .object(&format!("files/{}", uploaded.id_string().unwrap()))
    .unwrap();
  assert_eq!(stored["size"], 18);

  let unit = env.state().canvas_info(&key("page", "unit")).cloned().unwrap();
  let page = env.course.object(&format!("pages/{}", unit.id_string().unwrap())).unwrap();
  assert_eq!(page["body"], uploaded.url().unwrap());
}

#[tokio::test]
async fn zip_resource_is_archived_and_uploaded() {
  let env = TestEnv::new();
  let folder = env.temp.path().join("starter");
  std::fs::create_dir_all(&folder).unwrap();
  std::fs::write(folder.join("main.py"), "print('v1')").unwrap();
  let folder = folder.to_string_lossy().to_string();

  let resources = || {
    store([
      resource("zip", "hw1.zip", json!({"zip_file_name": "hw1.zip", "content_folder": folder})),
      resource(
        "assignment",
        "hw1",
        json!({"name": "HW 1", "description": token("zip", "hw1.zip", "url")}),
      ),
    ])
  };

  let (result, _) = env.deploy(resources()).await;
  assert_eq!(result.unwrap().planned, vec![key("zip", "hw1.zip"), key("assignment", "hw1")]);
  assert_eq!(env.course.writes()[0], ApiCall::Upload("hw1.zip".into()));
  env.course.clear_calls();

  let (result, _) = env.deploy(resources()).await;
  assert!(result.unwrap().planned.is_empty());
  assert!(env.course.writes().is_empty());

  std::fs::write(env.temp.path().join("starter").join("main.py"), "print('v2')").unwrap();
  let (result, _) = env.deploy(resources()).await;
  assert_eq!(result.unwrap().planned, vec![key("zip", "hw1.zip"), key("assignment", "hw1")]);
}

#[tokio::test]
async fn review_notice_is_reported_and_the_run_continues() {
  let env = TestEnv::new();
  let resources = |title: &str| {
    store([
      resource("quiz", "q", json!({"title": title})),
      resource("page", "after", json!({"title": format!("After {title}")})),
    ])
  };
  env.deploy(resources("Quiz 1")).await.0.unwrap();
  env
    .course
    .insert("quizzes/1/submissions", json!({"quiz_submissions": [{"id": 1}]}));

  let (result, report) = env.deploy(resources("Quiz 2")).await;
  let summary = result.unwrap();

  assert_eq!(summary.execution.deployed, vec![key("quiz", "q"), key("page", "after")]);
  assert!(report.is_success());
  assert_eq!(
    report.content_to_review,
    vec![ReviewNotice {
      name: "Quiz 2".to_string(),
      link: "https://canvas.test/courses/9/quizzes/1".to_string(),
    }]
  );
  assert_eq!(env.course.object("pages/2").unwrap()["title"], "After Quiz 2");
}

#[tokio::test]
async fn reference_to_recorded_resource_resolves_from_state() {
  let env = TestEnv::new();
  env
    .deploy(store([resource("page", "shared", json!({"title": "Shared"}))]))
    .await
    .0
    .unwrap();

  // `shared` is no longer declared but is still referenced, so it stays a placeholder.
  let (result, _) = env
    .deploy(store([resource("page", "new", json!({"title": "New", "body": token("page", "shared", "url")}))]))
    .await;
  result.unwrap();

  let shared_url = env.state().canvas_info(&key("page", "shared")).unwrap().url().unwrap().to_string();
  assert_eq!(env.course.object("pages/2").unwrap()["body"], shared_url.as_str());
}

#[tokio::test]
async fn reference_to_unknown_resource_fails_before_any_write() {
  let env = TestEnv::new();
  let (result, report) = env
    .deploy(store([resource("page", "a", json!({"body": token("page", "ghost", "url")}))]))
    .await;

  let err = result.unwrap_err();
  assert!(matches!(
    err,
    RunError::Engine(EngineError::Plan(PlanError::UnresolvedReference { .. }))
  ));
  assert!(!report.error.is_empty());
  assert!(env.course.writes().is_empty());
}

#[tokio::test]
async fn unknown_type_fails_before_any_write() {
  let env = TestEnv::new();
  let (result, _) = env
    .deploy(store([
      resource("page", "a", json!({"title": "A"})),
      resource("widget", "w", json!({"size": 3})),
    ]))
    .await;

  let err = result.unwrap_err();
  assert!(err.to_string().contains("widget"));
  assert!(env.course.writes().is_empty());
  assert!(env.state().is_empty());
}

struct Broken;

#[async_trait]
impl Deployer for Broken {
  async fn deploy(&self, _api: &dyn CourseApi, _request: DeployRequest<'_>) -> Result<DeployOutcome, DeployError> {
    Err(DeployError::MissingField("everything".to_string()))
  }

  async fn delete(&self, _api: &dyn CourseApi, _info: &ResourceInfo) -> Result<(), DeployError> {
    Ok(())
  }
}

#[tokio::test]
async fn failure_stops_the_run_and_keeps_earlier_records() {
  let mut env = TestEnv::new();
  env.registry.register("broken", Broken);

  let (result, report) = env
    .deploy(store([
      resource("page", "first", json!({"title": "First"})),
      resource("broken", "b", json!({"x": 1})),
      resource("page", "last", json!({"title": "Last"})),
    ]))
    .await;

  let err = result.unwrap_err();
  let message = err.to_string();
  assert!(message.contains("broken:b"), "{message}");
  assert!(message.contains("course.md#b"), "{message}");
  assert!(message.contains("deploy"), "{message}");

  let state = env.state();
  assert!(state.contains(&key("page", "first")));
  assert!(!state.contains(&key("page", "last")));
  assert_eq!(report.deployed_content.len(), 1);
  assert_eq!(report.error, message);
}

#[tokio::test]
async fn dry_run_lists_plan_without_touching_anything() {
  let env = TestEnv::new();
  let (result, report) = env
    .deploy_with(
      store([
        resource("page", "a", json!({"title": "A", "body": token("page", "b", "url")})),
        resource("page", "b", json!({"title": "B"})),
      ]),
      RunOptions {
        dry_run: true,
        ..RunOptions::default()
      },
    )
    .await;

  let summary = result.unwrap();
  assert_eq!(summary.planned, vec![key("page", "b"), key("page", "a")]);
  assert!(summary.migration.is_none());
  assert!(env.course.calls().is_empty());
  assert!(!env.storage.path().exists());
  assert_eq!(report.deployed_content.len(), 2);
  assert!(report.deployed_content.iter().all(|c| c.url.is_none()));
}

#[tokio::test]
async fn dates_are_normalized_to_utc() {
  let env = TestEnv::new();
  let (result, _) = env
    .deploy_with(
      store([resource("assignment", "hw", json!({"name": "HW", "due_at": "Jan 05, 2025, 11:59 PM"}))]),
      RunOptions {
        time_zone: "-07:00".to_string(),
        ..RunOptions::default()
      },
    )
    .await;
  result.unwrap();

  assert_eq!(
    env.course.object("assignments/1").unwrap()["due_at"],
    "2025-01-06T06:59:00+00:00"
  );
}
