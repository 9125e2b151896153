//! Cleanup of resources the document no longer declares.

use coursesync_lib::api::{ApiCall, CourseApi};
use coursesync_lib::consts::ENGINE_VERSION;
use coursesync_lib::deploy::{ReclaimSummary, RunOptions};
use coursesync_lib::state::StateStore;
use coursesync_lib::{ResourceInfo, ResourceKey, ResourceStore};
use serde_json::json;

use super::common::{TestEnv, resource, store, token};

fn key(rtype: &str, id: &str) -> ResourceKey {
  ResourceKey::new(rtype, id)
}

fn cleanup() -> RunOptions {
  RunOptions {
    cleanup: true,
    ..RunOptions::default()
  }
}

fn quiz_with_question() -> ResourceStore {
  store([
    resource("quiz", "q", json!({"title": "Quiz"})),
    resource(
      "quiz_question",
      "q-1",
      json!({"quiz_id": token("quiz", "q", "id"), "question_text": "2+2?"}),
    ),
  ])
}

#[tokio::test]
async fn question_is_deleted_before_its_quiz() {
  let env = TestEnv::new();
  env.deploy(quiz_with_question()).await.0.unwrap();
  env.course.clear_calls();

  let (result, _) = env.deploy_with(ResourceStore::new(), cleanup()).await;
  let reclaimed = result.unwrap().reclaim.unwrap();

  assert_eq!(reclaimed.deleted, vec![key("quiz_question", "q-1"), key("quiz", "q")]);
  assert_eq!(
    env.course.writes(),
    vec![
      ApiCall::Delete("quizzes/1/questions/2".into()),
      ApiCall::Delete("quizzes/1".into()),
    ]
  );
  assert!(env.state().is_empty());
}

#[tokio::test]
async fn already_deleted_resource_is_dropped_from_state() {
  let env = TestEnv::new();
  env.deploy(quiz_with_question()).await.0.unwrap();
  env.course.delete("quizzes/1/questions/2").await.unwrap();

  let (result, _) = env
    .deploy_with(store([resource("quiz", "q", json!({"title": "Quiz"}))]), cleanup())
    .await;
  let reclaimed = result.unwrap().reclaim.unwrap();

  assert_eq!(reclaimed.already_gone, vec![key("quiz_question", "q-1")]);
  assert!(reclaimed.deleted.is_empty());
  let state = env.state();
  assert!(!state.contains(&key("quiz_question", "q-1")));
  assert!(state.contains(&key("quiz", "q")));
}

#[tokio::test]
async fn failed_deletion_keeps_entry_and_continues() {
  let env = TestEnv::new();
  let mut seeded = StateStore::new();
  seeded.set_version(ENGINE_VERSION);
  // No assignment id recorded, so the override cannot be addressed.
  seeded.record(key("override", "late"), "x", ResourceInfo::new().with("id", 5));
  seeded.record(key("page", "old"), "x", ResourceInfo::new().with("id", 7));
  env.course.insert("pages/7", json!({"id": 7, "title": "Old"}));
  env.storage.save(&seeded).unwrap();

  let (result, report) = env.deploy_with(ResourceStore::new(), cleanup()).await;
  let reclaimed = result.unwrap().reclaim.unwrap();

  assert_eq!(reclaimed.failed.len(), 1);
  assert_eq!(reclaimed.failed[0].0, key("override", "late"));
  assert_eq!(reclaimed.deleted, vec![key("page", "old")]);
  assert!(report.is_success());

  let state = env.state();
  assert!(state.contains(&key("override", "late")));
  assert!(!state.contains(&key("page", "old")));
}

#[tokio::test]
async fn entries_of_unknown_types_are_forgotten() {
  let env = TestEnv::new();
  let mut seeded = StateStore::new();
  seeded.set_version(ENGINE_VERSION);
  seeded.record(key("discussion", "old-thread"), "x", ResourceInfo::new().with("id", 3));
  seeded.record(key("page", "old"), "x", ResourceInfo::new().with("id", 7));
  env.course.insert("pages/7", json!({"id": 7, "title": "Old"}));
  env.storage.save(&seeded).unwrap();

  let (result, report) = env.deploy_with(ResourceStore::new(), cleanup()).await;
  let reclaimed = result.unwrap().reclaim.unwrap();

  assert_eq!(reclaimed.dropped, vec![key("discussion", "old-thread")]);
  assert_eq!(reclaimed.deleted, vec![key("page", "old")]);
  assert!(reclaimed.failed.is_empty());
  assert!(report.is_success());
  assert_eq!(env.course.writes(), vec![ApiCall::Delete("pages/7".into())]);
  assert!(env.state().is_empty());

  // A second cleanup has nothing left to do.
  env.course.clear_calls();
  let (result, _) = env.deploy_with(ResourceStore::new(), cleanup()).await;
  assert_eq!(result.unwrap().reclaim.unwrap(), ReclaimSummary::default());
  assert!(env.course.writes().is_empty());
}

#[tokio::test]
async fn singletons_are_never_reclaimed() {
  let env = TestEnv::new();
  env
    .deploy(store([resource("syllabus", "syllabus", json!({"content": "<p>Hi</p>"}))]))
    .await
    .0
    .unwrap();
  env.course.clear_calls();

  let (result, _) = env.deploy_with(ResourceStore::new(), cleanup()).await;
  let summary = result.unwrap();

  assert!(summary.stale.is_empty());
  assert!(env.course.writes().is_empty());
  assert!(env.state().contains(&key("syllabus", "syllabus")));
}

#[tokio::test]
async fn dry_run_only_lists_stale_resources() {
  let env = TestEnv::new();
  env.deploy(quiz_with_question()).await.0.unwrap();
  env.course.clear_calls();

  let (result, _) = env
    .deploy_with(
      ResourceStore::new(),
      RunOptions {
        dry_run: true,
        cleanup: true,
        ..RunOptions::default()
      },
    )
    .await;
  let summary = result.unwrap();

  assert_eq!(summary.stale, vec![key("quiz_question", "q-1"), key("quiz", "q")]);
  assert!(summary.reclaim.is_none());
  assert!(env.course.writes().is_empty());
  assert_eq!(env.state().len(), 2);
}

#[tokio::test]
async fn without_cleanup_stale_entries_stay() {
  let env = TestEnv::new();
  env.deploy(quiz_with_question()).await.0.unwrap();

  let (result, _) = env.deploy(ResourceStore::new()).await;
  let summary = result.unwrap();

  assert_eq!(summary.stale.len(), 2);
  assert!(summary.reclaim.is_none());
  assert_eq!(env.state().len(), 2);
}
