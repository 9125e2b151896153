//! Implementation of the `coursesync deploy` command.
//!
//! Loads the resource file and course info, runs a deployment against the
//! course, prints the report and optionally writes it to a file.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::debug;

use coursesync_lib::api::CanvasClient;
use coursesync_lib::api::canvas::DEFAULT_TIMEOUT;
use coursesync_lib::deploy::{DeployerRegistry, DeploymentReport, RunOptions, RunSummary, run};
use coursesync_lib::state::{MigrationOutcome, StateStorage};

use crate::config::{CourseInfo, api_token};
use crate::output::{
  format_duration, print_change, print_error, print_info, print_json, print_stat, print_success, print_warning,
  symbols,
};

use super::load_resources;

pub struct DeployArgs {
  pub resources: PathBuf,
  pub course_info: PathBuf,
  pub dry_run: bool,
  pub cleanup: bool,
  pub output_file: Option<PathBuf>,
  pub timeout: Option<Duration>,
  pub json: bool,
}

/// Execute the deploy command.
///
/// The report is printed (and written to `--output-file`) whether or not the
/// run succeeds; a failed run still exits non-zero.
pub fn cmd_deploy(args: DeployArgs) -> Result<()> {
  let info = CourseInfo::load(&args.course_info)?;
  let store = load_resources(&args.resources)?;

  // A dry run never reaches the course, so it works without credentials.
  let token = match api_token() {
    Ok(token) => token,
    Err(_) if args.dry_run => String::new(),
    Err(err) => return Err(err),
  };
  let client = CanvasClient::with_timeout(
    &info.api_url,
    &token,
    info.course_id,
    args.timeout.unwrap_or(DEFAULT_TIMEOUT),
  )
  .context("Failed to create Canvas client")?;

  let storage = StateStorage::default_location(info.course_id);
  debug!(state = %storage.path().display(), "using state file");
  let registry = DeployerRegistry::canvas();
  let options = RunOptions {
    dry_run: args.dry_run,
    cleanup: args.cleanup,
    time_zone: info.time_zone.clone(),
  };

  if !args.json {
    let verb = if args.dry_run { "Planning deployment to" } else { "Deploying to" };
    print_info(&format!("{} {}", verb, info.display_name()));
  }

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let mut report = DeploymentReport::new();
  let started = Instant::now();
  let result = rt.block_on(run(&client, &registry, &storage, store, &options, &mut report));
  let elapsed = started.elapsed();

  if let Some(path) = &args.output_file {
    report
      .write_to(path)
      .with_context(|| format!("Failed to write report: {}", path.display()))?;
  }

  if args.json {
    print_json(&report)?;
  } else {
    print_report(&report, result.as_ref().ok(), args.dry_run, elapsed);
  }

  result.context("Deployment failed")?;
  Ok(())
}

fn print_report(report: &DeploymentReport, summary: Option<&RunSummary>, dry_run: bool, elapsed: Duration) {
  if let Some(MigrationOutcome::Migrated { from, to, steps }) = summary.and_then(|s| s.migration.as_ref()) {
    print_info(&format!("Migrated state from {} to {} ({} step(s))", from, to, steps.len()));
  }

  for content in &report.deployed_content {
    let label = format!("{}:{}", content.rtype, content.id);
    print_change(symbols::ADD, &label, content.url.as_deref().unwrap_or_default());
  }

  for review in &report.content_to_review {
    print_warning(&format!("Review {} {} {}", review.name, symbols::ARROW, review.link));
  }

  if let Some(summary) = summary {
    for key in &summary.stale {
      let detail = if summary.reclaim.is_some() { "deleted" } else { "no longer declared" };
      print_change(symbols::REMOVE, &key.to_string(), detail);
    }
    if let Some(reclaim) = &summary.reclaim {
      for (key, message) in &reclaim.failed {
        print_warning(&format!("Could not delete {}: {}", key, message));
      }
    }
  }

  println!();
  if !report.is_success() {
    print_error(&report.error);
    print_stat("Deployed before failure", &report.deployed_content.len().to_string());
    return;
  }

  if dry_run {
    print_success(&format!("Would deploy {} resource(s)", report.deployed_content.len()));
  } else {
    print_success(&format!(
      "Deployed {} resource(s) in {}",
      report.deployed_content.len(),
      format_duration(elapsed)
    ));
  }
  if let Some(summary) = summary {
    print_stat("Cycle breakers", &summary.breakers.len().to_string());
    print_stat("Needs review", &report.content_to_review.len().to_string());
    if let Some(reclaim) = &summary.reclaim {
      print_stat(
        "Reclaimed",
        &(reclaim.deleted.len() + reclaim.already_gone.len()).to_string(),
      );
      if !reclaim.dropped.is_empty() {
        print_stat("Forgotten (unknown type)", &reclaim.dropped.len().to_string());
      }
    }
  }
}
