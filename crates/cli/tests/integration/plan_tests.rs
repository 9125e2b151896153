//! Plan command integration tests.

use predicates::prelude::*;

use super::common::{TestEnv, fixture_path};

#[test]
fn plan_reports_cycle_breaker() {
  let env = TestEnv::new();

  env
    .cmd()
    .arg("plan")
    .arg(fixture_path("cycle.json"))
    .args(["--course-id", "7"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Cycle broken at: page:b"))
    .stdout(predicate::str::contains("Would deploy 3 resource(s)"));
}

#[test]
fn plan_json_lists_shell_first() {
  let env = TestEnv::new();

  let output = env
    .cmd()
    .arg("plan")
    .arg(fixture_path("cycle.json"))
    .args(["--course-id", "7", "--json"])
    .output()
    .unwrap();
  assert!(output.status.success());

  let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(plan["breakers"], serde_json::json!([{"type": "page", "id": "b"}]));
  assert_eq!(plan["schedule"][0]["is_shell"], true);
  assert_eq!(plan["schedule"][0]["key"]["id"], "b");
  assert_eq!(plan["selected"].as_array().unwrap().len(), 3);
}

#[test]
fn plan_accepts_named_time_zone() {
  let env = TestEnv::new();

  env
    .cmd()
    .arg("plan")
    .arg(fixture_path("cycle.json"))
    .args(["--course-id", "7", "--time-zone", "America/Denver"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Would deploy 3 resource(s)"));
}

#[test]
fn plan_rejects_dangling_reference() {
  let env = TestEnv::new();

  env
    .cmd()
    .arg("plan")
    .arg(fixture_path("dangling.json"))
    .args(["--course-id", "7"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("page:missing"));
}

#[test]
fn plan_rejects_bad_time_zone() {
  let env = TestEnv::new();

  env
    .cmd()
    .arg("plan")
    .arg(fixture_path("cycle.json"))
    .args(["--course-id", "7", "--time-zone", "Mars/Olympus"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("Mars/Olympus"));
}

#[test]
fn plan_rejects_malformed_resource_file() {
  let env = TestEnv::new();
  let path = env.path("broken.json");
  std::fs::write(&path, "{ not json").unwrap();

  env
    .cmd()
    .arg("plan")
    .arg(&path)
    .args(["--course-id", "7"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("Invalid resource file"));
}
