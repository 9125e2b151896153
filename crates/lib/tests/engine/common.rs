//! Shared helpers for engine integration tests.

use coursesync_lib::api::MemoryCourse;
use coursesync_lib::deploy::{DeployerRegistry, DeploymentReport, RunError, RunOptions, RunSummary, run};
use coursesync_lib::state::{StateStorage, StateStore};
use coursesync_lib::{Resource, ResourceStore};
use serde_json::Value;
use tempfile::TempDir;

pub const COURSE_ID: u64 = 9;

/// Declared resource from a JSON object literal.
pub fn resource(rtype: &str, id: &str, data: Value) -> Resource {
  let Value::Object(data) = data else {
    panic!("payload must be an object");
  };
  Resource::new(rtype, id, data).with_content_path(format!("course.md#{id}"))
}

pub fn store(resources: impl IntoIterator<Item = Resource>) -> ResourceStore {
  let mut store = ResourceStore::new();
  for resource in resources {
    store.insert(resource).unwrap();
  }
  store
}

/// Token referring to `field` of another resource.
pub fn token(rtype: &str, id: &str, field: &str) -> String {
  coursesync_lib::token::format(rtype, id, field)
}

/// Isolated course and state directory.
pub struct TestEnv {
  pub temp: TempDir,
  pub course: MemoryCourse,
  pub storage: StateStorage,
  pub registry: DeployerRegistry,
}

impl TestEnv {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let storage = StateStorage::new(temp.path().join("state"), COURSE_ID);
    Self {
      temp,
      course: MemoryCourse::new(COURSE_ID),
      storage,
      registry: DeployerRegistry::canvas(),
    }
  }

  pub async fn deploy(&self, store: ResourceStore) -> (Result<RunSummary, RunError>, DeploymentReport) {
    self.deploy_with(store, RunOptions::default()).await
  }

  pub async fn deploy_with(
    &self,
    store: ResourceStore,
    options: RunOptions,
  ) -> (Result<RunSummary, RunError>, DeploymentReport) {
    let mut report = DeploymentReport::new();
    let result = run(&self.course, &self.registry, &self.storage, store, &options, &mut report).await;
    (result, report)
  }

  pub fn state(&self) -> StateStore {
    self.storage.load().unwrap()
  }
}
