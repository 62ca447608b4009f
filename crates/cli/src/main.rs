mod cmd;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cmd::{HashArgs, IsolateArgs, PlanArgs};

/// Deploy hashing, planning and pnpm workspace isolation for Cloud Functions
#[derive(Parser)]
#[command(name = "fndeploy")]
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
  /// Bundle a workspace package and its internal dependencies for deploy
  Isolate {
    /// Package directory to isolate
    #[arg(default_value = ".")]
    source: PathBuf,

    /// Output directory (default: <SOURCE>/isolate)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Also follow devDependencies
    #[arg(long)]
    include_dev_deps: bool,

    /// Package manager binary used to pack dependencies
    #[arg(long)]
    package_manager: Option<String>,

    /// Give up on a pack command after this long (e.g. 30s, 2m)
    #[arg(long, value_parser = humantime::parse_duration)]
    pack_timeout: Option<Duration>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Compute deploy hashes for every endpoint of a set of backends
  Hash {
    /// JSON file mapping codebase names to backends
    #[arg(long)]
    backends: PathBuf,

    /// Source archive deployed to 1st gen functions
    #[arg(long)]
    source_v1: Option<PathBuf>,

    /// Source archive deployed to 2nd gen functions
    #[arg(long)]
    source_v2: Option<PathBuf>,

    /// Selectors (e.g. functions:api) to leave unhashed so they always redeploy
    #[arg(long)]
    force: Option<String>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Show what a deploy would create, update, delete and skip
  Plan {
    /// JSON file with the wanted backend
    #[arg(long)]
    want: PathBuf,

    /// JSON file with the deployed backend
    #[arg(long)]
    have: PathBuf,

    /// Codebase being deployed
    #[arg(long, default_value = "default")]
    codebase: String,

    /// Only deploy the given selectors (e.g. functions:api,functions:web)
    #[arg(long)]
    only: Option<String>,

    /// Delete functions that this tool did not deploy
    #[arg(long)]
    delete_all: bool,

    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// List the packages of a pnpm workspace
  Workspace {
    /// Any directory inside the workspace
    #[arg(default_value = ".")]
    dir: PathBuf,

    /// Output as JSON
    #[arg(long)]
    json: bool,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let filter = if cli.verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
  };
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Isolate {
      source,
      out,
      include_dev_deps,
      package_manager,
      pack_timeout,
      json,
    } => cmd::cmd_isolate(IsolateArgs {
      source,
      out,
      include_dev_deps,
      package_manager,
      pack_timeout,
      json,
    }),
    Commands::Hash {
      backends,
      source_v1,
      source_v2,
      force,
      json,
    } => cmd::cmd_hash(HashArgs {
      backends,
      source_v1,
      source_v2,
      force,
      json,
    }),
    Commands::Plan {
      want,
      have,
      codebase,
      only,
      delete_all,
      json,
    } => cmd::cmd_plan(
      PlanArgs {
        want,
        have,
        codebase,
        only,
        delete_all,
        json,
      },
      cli.verbose,
    ),
    Commands::Workspace { dir, json } => cmd::cmd_workspace(&dir, cli.verbose, json),
  }
}
