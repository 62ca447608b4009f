//! Implementation of the `fndeploy workspace` command.

use std::path::Path;

use anyhow::{Context, Result, bail};

use fndeploy_lib::workspace::{find_workspace_root, scan_workspace};

use crate::output::{print_info, print_json, print_stat, print_success, print_warning, symbols};

pub fn cmd_workspace(dir: &Path, verbose: bool, json: bool) -> Result<()> {
  let Some(root) = find_workspace_root(dir) else {
    bail!("No pnpm-workspace.yaml found in {} or any parent directory", dir.display());
  };

  let scan = scan_workspace(&root).with_context(|| format!("Failed to scan workspace: {}", root.display()))?;

  if json {
    let packages: Vec<_> = scan
      .registry
      .packages()
      .map(|p| serde_json::json!({ "name": p.name, "dir": p.root_relative_dir, "version": p.manifest.version }))
      .collect();
    let skipped: Vec<_> = scan
      .skipped
      .iter()
      .map(|s| serde_json::json!({ "dir": s.dir, "reason": s.reason.to_string() }))
      .collect();
    let shadowed: Vec<_> = scan
      .shadowed
      .iter()
      .map(|p| serde_json::json!({ "name": p.name, "dir": p.root_relative_dir }))
      .collect();
    return print_json(&serde_json::json!({
      "root": root,
      "packages": packages,
      "skipped": skipped,
      "shadowed": shadowed,
    }));
  }

  print_success(&format!("Workspace: {}", root.display()));
  print_stat("Packages", &scan.registry.len().to_string());
  for package in scan.registry.packages() {
    println!("    {} {} ({})", symbols::INFO, package.name, package.root_relative_dir);
  }

  for package in &scan.shadowed {
    print_warning(&format!(
      "{} in {} is shadowed by a later package with the same name",
      package.name, package.root_relative_dir
    ));
  }

  if verbose && !scan.skipped.is_empty() {
    println!();
    print_info("Skipped directories");
    for skipped in &scan.skipped {
      println!("    {} {}: {}", symbols::INFO, skipped.dir.display(), skipped.reason);
    }
  }

  Ok(())
}
