mod cmd;
mod config;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::DeployArgs;

/// coursesync - Deploy course content to Canvas
#[derive(Parser)]
#[command(name = "coursesync")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Deploy a resource file to the course
  Deploy {
    /// JSON array of resource records
    resources: PathBuf,

    /// Course connection settings
    #[arg(long, default_value = "canvas_course_info.json")]
    course_info: PathBuf,

    /// Plan and report without touching the course or local state
    #[arg(long)]
    dry_run: bool,

    /// Delete deployed resources the resource file no longer declares
    #[arg(long)]
    cleanup: bool,

    /// Write the deployment report to this file
    #[arg(long)]
    output_file: Option<PathBuf>,

    /// Timeout for each request to the course (e.g. "30s", "2m")
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
  },

  /// Show what a deployment would do, without contacting the course
  Plan {
    /// JSON array of resource records
    resources: PathBuf,

    /// Course whose recorded state to plan against
    #[arg(long)]
    course_id: u64,

    /// Time zone for date fields (`UTC`, a zone such as `America/Denver`, or an offset such as `-07:00`)
    #[arg(long, default_value = "UTC")]
    time_zone: String,

    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Show recorded deployment state of a course
  Status {
    #[arg(long)]
    course_id: u64,

    /// Output as JSON
    #[arg(long)]
    json: bool,
  },
}

fn init_logging(verbose: bool) {
  let default = if verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  match cli.command {
    Commands::Deploy {
      resources,
      course_info,
      dry_run,
      cleanup,
      output_file,
      timeout,
      json,
    } => cmd::cmd_deploy(DeployArgs {
      resources,
      course_info,
      dry_run,
      cleanup,
      output_file,
      timeout,
      json,
    }),
    Commands::Plan {
      resources,
      course_id,
      time_zone,
      json,
    } => cmd::cmd_plan(&resources, course_id, &time_zone, cli.verbose, json),
    Commands::Status { course_id, json } => cmd::cmd_status(course_id, cli.verbose, json),
  }
}
