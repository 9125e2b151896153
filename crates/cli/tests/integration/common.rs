//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Get path to a fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

/// Isolated state directory and scratch space.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  pub fn state_path(&self) -> PathBuf {
    let p = self.temp.path().join("state");
    std::fs::create_dir_all(&p).unwrap();
    p
  }

  /// Path inside the scratch directory.
  pub fn path(&self, relative: &str) -> PathBuf {
    self.temp.path().join(relative)
  }

  /// Command for the coursesync binary with state isolated to this env.
  pub fn cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("coursesync");
    cmd.env("COURSESYNC_STATE_DIR", self.state_path());
    cmd.env_remove("CANVAS_API_TOKEN");
    cmd.env_remove("RUST_LOG");
    cmd
  }
}
