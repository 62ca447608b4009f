//! Implementation of the `fndeploy isolate` command.
//!
//! Copies a workspace package into a deployable directory together with
//! packed copies of the workspace packages it depends on.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::debug;

use fndeploy_lib::config::RuntimeContext;
use fndeploy_lib::isolate::{IsolateOptions, PnpmCli, isolate_workspace};

use crate::output::{format_duration, print_error, print_json, print_stat, print_success, symbols};

pub struct IsolateArgs {
  pub source: PathBuf,
  pub out: Option<PathBuf>,
  pub include_dev_deps: bool,
  pub package_manager: Option<String>,
  pub pack_timeout: Option<Duration>,
  pub json: bool,
}

pub fn cmd_isolate(args: IsolateArgs) -> Result<()> {
  let mut ctx = RuntimeContext::from_env().context("Invalid environment configuration")?;
  if let Some(pm) = args.package_manager {
    ctx.package_manager = pm;
  }
  if args.pack_timeout.is_some() {
    ctx.pack_timeout = args.pack_timeout;
  }
  debug!(package_manager = %ctx.package_manager, pack_timeout = ?ctx.pack_timeout, "runtime context");

  // --out is relative to where the command runs, not to the package
  let output_dir = match args.out {
    Some(out) if out.is_relative() => Some(
      std::env::current_dir()
        .context("Failed to read current directory")?
        .join(out),
    ),
    other => other,
  };

  let options = IsolateOptions {
    output_dir,
    include_dev_dependencies: args.include_dev_deps,
  };
  let packer = PnpmCli::new(&ctx);

  let started = Instant::now();
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let result = match rt.block_on(isolate_workspace(&args.source, &options, &packer)) {
    Ok(result) => result,
    Err(e) => {
      print_error(&format!("Isolation failed for {}", args.source.display()));
      return Err(e).context("Isolate failed");
    }
  };

  if args.json {
    return print_json(&result);
  }

  print_success(&format!(
    "Isolated {} in {}",
    result.packages.first().map(String::as_str).unwrap_or_default(),
    format_duration(started.elapsed())
  ));
  print_stat("Output", &result.output_dir.display().to_string());
  print_stat("Packages", &result.packages.len().to_string());
  for name in result.packages.iter().skip(1) {
    println!("    {} {}", symbols::INFO, name);
  }

  Ok(())
}
