//! Implementation of the `coursesync plan` command.
//!
//! Plans a deployment against the recorded state of a course without
//! contacting it: dependency graph, cycle breakers, schedule and the
//! resources that would be deployed.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::json;

use coursesync_lib::deploy::{DeployerRegistry, prepare, stale_keys};
use coursesync_lib::plan::ChangeReason;
use coursesync_lib::state::{LockMode, StateStorage};

use crate::output::{print_change, print_info, print_json, print_stat, print_success, symbols};

use super::load_resources;

pub fn cmd_plan(resources: &Path, course_id: u64, time_zone: &str, verbose: bool, json: bool) -> Result<()> {
  let mut store = load_resources(resources)?;
  let storage = StateStorage::default_location(course_id);
  let _lock = storage.lock(LockMode::Shared, "plan").context("Failed to lock state")?;
  let state = storage.load().context("Failed to load state")?;

  let registry = DeployerRegistry::canvas();
  let plan = prepare(&mut store, &state, &registry, time_zone).context("Failed to plan deployment")?;
  let stale = stale_keys(&store, &state);

  if json {
    let selected: Vec<_> = plan
      .diff
      .selected
      .iter()
      .map(|s| json!({ "type": s.key.rtype, "id": s.key.id, "reason": s.reason.to_string() }))
      .collect();
    let output = json!({
      "course_id": course_id,
      "resources": plan.graph.node_count(),
      "dependencies": plan.graph.edge_count(),
      "placeholders": plan.placeholders,
      "breakers": plan.breakers(),
      "schedule": plan.schedule,
      "selected": selected,
      "unchanged": plan.diff.unchanged.len(),
      "stale": stale,
    });
    return print_json(&output);
  }

  print_info(&format!(
    "{} resource(s), {} dependency edge(s)",
    plan.graph.node_count(),
    plan.graph.edge_count()
  ));
  for breaker in plan.breakers() {
    print_stat("Cycle broken at", &breaker.to_string());
  }

  if verbose {
    println!();
    println!("Schedule:");
    for (position, entry) in plan.schedule.iter().enumerate() {
      let kind = if entry.is_shell { " (shell)" } else { "" };
      println!("  {:>3}. {}{}", position + 1, entry.key, kind);
      for dependency in plan.graph.dependencies(&entry.key) {
        println!("         {} {}", symbols::ARROW, dependency);
      }
    }
  }

  println!();
  for selected in &plan.diff.selected {
    let symbol = match selected.reason {
      ChangeReason::New => symbols::ADD,
      _ => symbols::MODIFY,
    };
    print_change(symbol, &selected.key.to_string(), &selected.reason.to_string());
  }
  for key in &stale {
    print_change(symbols::REMOVE, &key.to_string(), "no longer declared");
  }

  if plan.diff.is_empty() {
    print_success("Nothing to deploy");
  } else {
    print_success(&format!("Would deploy {} resource(s)", plan.diff.selected.len()));
  }
  print_stat("Unchanged", &plan.diff.unchanged.len().to_string());
  if !stale.is_empty() {
    print_stat("Stale (deleted with --cleanup)", &stale.len().to_string());
  }

  Ok(())
}
