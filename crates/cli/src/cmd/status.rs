//! Implementation of the `coursesync status` command.
//!
//! Displays the recorded deployment state of a course.

use anyhow::{Context, Result};
use serde_json::json;

use coursesync_lib::state::StateStorage;

use crate::output::{self, print_info, print_json, print_stat, print_success, truncate_hash};

pub fn cmd_status(course_id: u64, verbose: bool, json: bool) -> Result<()> {
  let storage = StateStorage::default_location(course_id);
  let state = storage.load().context("Failed to load state")?;

  if json {
    let entries: Vec<_> = state
      .iter()
      .map(|(key, entry)| {
        json!({
          "type": key.rtype,
          "id": key.id,
          "checksum": entry.checksum,
          "canvas_info": entry.canvas_info,
        })
      })
      .collect();
    let output = json!({
      "course_id": course_id,
      "path": storage.path(),
      "version": state.version(),
      "count": state.len(),
      "entries": entries,
    });
    return print_json(&output);
  }

  if state.is_empty() {
    print_info(&format!(
      "No deployments recorded for course {}. Run 'coursesync deploy' to create one.",
      course_id
    ));
    return Ok(());
  }

  print_success(&format!("Course {}", course_id));
  print_stat("State file", &storage.path().display().to_string());
  print_stat("Version", state.version().unwrap_or("unknown"));
  print_stat("Resources", &state.len().to_string());

  if verbose {
    println!();
    println!("Resources:");
    for (key, entry) in state.iter() {
      let remote = entry.canvas_info.id_string().unwrap_or_else(|| "?".to_string());
      let checksum = if entry.checksum.is_empty() {
        "shell"
      } else {
        truncate_hash(&entry.checksum)
      };
      println!("  {} {} #{} {}", output::symbols::INFO, key, remote, checksum);
      if let Some(url) = entry.canvas_info.url() {
        println!("      {}", url);
      }
    }
  }

  Ok(())
}
