//! Deploy command integration tests. None of these reach a real course.

use predicates::prelude::*;

use super::common::{TestEnv, fixture_path};

#[test]
fn dry_run_needs_no_token() {
  let env = TestEnv::new();

  env
    .cmd()
    .arg("deploy")
    .arg(fixture_path("cycle.json"))
    .arg("--course-info")
    .arg(fixture_path("course_info.json"))
    .arg("--dry-run")
    .assert()
    .success()
    .stdout(predicate::str::contains("Planning deployment to Test Course"))
    .stdout(predicate::str::contains("Would deploy 3 resource(s)"));

  assert!(!env.state_path().join("course-4242.json").exists());
}

#[test]
fn dry_run_writes_report_file() {
  let env = TestEnv::new();
  let report_path = env.path("report.json");

  env
    .cmd()
    .arg("deploy")
    .arg(fixture_path("cycle.json"))
    .arg("--course-info")
    .arg(fixture_path("course_info.json"))
    .arg("--dry-run")
    .arg("--output-file")
    .arg(&report_path)
    .assert()
    .success();

  let report: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
  assert_eq!(report["deployed_content"].as_array().unwrap().len(), 3);
  assert_eq!(report["error"], "");
}

#[test]
fn deploy_requires_token() {
  let env = TestEnv::new();

  env
    .cmd()
    .arg("deploy")
    .arg(fixture_path("cycle.json"))
    .arg("--course-info")
    .arg(fixture_path("course_info.json"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("CANVAS_API_TOKEN"));
}

#[test]
fn deploy_requires_course_info() {
  let env = TestEnv::new();

  env
    .cmd()
    .arg("deploy")
    .arg(fixture_path("cycle.json"))
    .arg("--course-info")
    .arg(env.path("missing.json"))
    .arg("--dry-run")
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to read course info"));
}

#[test]
fn failed_dry_run_reports_error_as_json() {
  let env = TestEnv::new();

  let output = env
    .cmd()
    .arg("deploy")
    .arg(fixture_path("dangling.json"))
    .arg("--course-info")
    .arg(fixture_path("course_info.json"))
    .args(["--dry-run", "--json"])
    .output()
    .unwrap();

  assert!(!output.status.success());
  let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert!(report["error"].as_str().unwrap().contains("page:missing"));
}
