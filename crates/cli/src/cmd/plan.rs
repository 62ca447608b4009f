//! Implementation of the `fndeploy plan` command.
//!
//! Compares a wanted backend with a deployed one and prints the changesets a
//! deploy would run.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use fndeploy_lib::backend::{Backend, parse_endpoint_filters};
use fndeploy_lib::plan::{self, DeploymentPlan};

use crate::output::{print_change, print_info, print_json, print_stat, print_success, print_warning, symbols};

pub struct PlanArgs {
  pub want: PathBuf,
  pub have: PathBuf,
  pub codebase: String,
  pub only: Option<String>,
  pub delete_all: bool,
  pub json: bool,
}

pub fn cmd_plan(args: PlanArgs, verbose: bool) -> Result<()> {
  let want = load_backend(&args.want)?;
  let have = load_backend(&args.have)?;
  let filters = args.only.as_deref().and_then(parse_endpoint_filters);

  let deployment = plan::create_deployment_plan(plan::PlanArgs {
    want: &want,
    have: &have,
    codebase: &args.codebase,
    filters: filters.as_deref(),
    delete_all: args.delete_all,
  })
  .context("Failed to plan deploy")?;

  if args.json {
    return print_json(&deployment);
  }

  print_plan(&deployment, verbose);
  Ok(())
}

fn load_backend(path: &Path) -> Result<Backend> {
  let content = fs::read_to_string(path).with_context(|| format!("Failed to read backend: {}", path.display()))?;
  serde_json::from_str(&content).with_context(|| format!("Failed to parse backend: {}", path.display()))
}

fn print_plan(deployment: &DeploymentPlan, verbose: bool) {
  let (mut create, mut update, mut delete, mut skip) = (0, 0, 0, 0);

  for (key, changeset) in deployment {
    print_info(key);
    for endpoint in &changeset.endpoints_to_create {
      print_change(symbols::ADD, &endpoint.label());
    }
    for change in &changeset.endpoints_to_update {
      let label = if change.delete_and_recreate.is_some() {
        format!("{} (delete and recreate)", change.endpoint.label())
      } else {
        change.endpoint.label()
      };
      print_change(symbols::MODIFY, &label);
    }
    for endpoint in &changeset.endpoints_to_delete {
      print_change(symbols::REMOVE, &endpoint.label());
    }
    if verbose {
      for endpoint in &changeset.endpoints_to_skip {
        print_change(symbols::SKIP, &endpoint.label());
      }
    }

    create += changeset.endpoints_to_create.len();
    update += changeset.endpoints_to_update.len();
    delete += changeset.endpoints_to_delete.len();
    skip += changeset.endpoints_to_skip.len();
  }

  println!();
  if create + update + delete == 0 {
    print_success("No changes to deploy");
  } else {
    print_stat("To create", &create.to_string());
    print_stat("To update", &update.to_string());
    print_stat("To delete", &delete.to_string());
  }
  if skip > 0 {
    print_stat("Unchanged", &skip.to_string());
  }
  if delete > 0 {
    print_warning(&format!("{} function(s) will be deleted", delete));
  }
}
