//! Implementation of the `fndeploy hash` command.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use fndeploy_lib::backend::{Backends, parse_endpoint_filters};
use fndeploy_lib::cache::{PinnedSecretVersions, SourceHashes, apply_backend_hashes, source_hash};

use crate::output::{print_info, print_json, truncate_hash};

pub struct HashArgs {
  pub backends: PathBuf,
  pub source_v1: Option<PathBuf>,
  pub source_v2: Option<PathBuf>,
  pub force: Option<String>,
  pub json: bool,
}

pub fn cmd_hash(args: HashArgs) -> Result<()> {
  let content = fs::read_to_string(&args.backends)
    .with_context(|| format!("Failed to read backends: {}", args.backends.display()))?;
  let mut wants: Backends = serde_json::from_str(&content)
    .with_context(|| format!("Failed to parse backends: {}", args.backends.display()))?;

  let hashes = SourceHashes {
    functions_source_v1_hash: hash_source(args.source_v1.as_deref())?,
    functions_source_v2_hash: hash_source(args.source_v2.as_deref())?,
  };
  let sources: BTreeMap<String, SourceHashes> = wants.keys().map(|codebase| (codebase.clone(), hashes.clone())).collect();

  let force = args
    .force
    .as_deref()
    .and_then(parse_endpoint_filters)
    .unwrap_or_default();

  apply_backend_hashes(&mut wants, &sources, &force, &PinnedSecretVersions);

  if args.json {
    return print_json(&wants);
  }

  for (codebase, backend) in &wants {
    print_info(&format!("Codebase {}", codebase));
    for endpoint in backend.all_endpoints() {
      let hash = endpoint.hash.as_deref().map(truncate_hash).unwrap_or("(forced)");
      println!("  {}  {}", hash, endpoint.label());
    }
  }

  Ok(())
}

fn hash_source(path: Option<&Path>) -> Result<Option<String>> {
  path
    .map(|p| source_hash(p).with_context(|| format!("Failed to hash source: {}", p.display())))
    .transpose()
}
