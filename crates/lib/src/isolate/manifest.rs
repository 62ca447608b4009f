//! Point internal dependencies at their isolated copies.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::workspace::{DependencyMap, PackageManifest, WORKSPACE_PROTOCOL};

/// Rewrite `manifest`, which lives in `manifest_dir`, against `locations`.
///
/// Dependencies named in `locations` become `file:` references relative to
/// `manifest_dir`. Remaining `workspace:` specifiers are dropped since nothing
/// in the bundle can satisfy them. Returns the number of entries changed.
pub fn rewrite_manifest(manifest: &mut PackageManifest, manifest_dir: &Path, locations: &BTreeMap<String, PathBuf>) -> usize {
  let owner = manifest.name.clone().unwrap_or_default();
  let mut changed = 0;
  for deps in [manifest.dependencies.as_mut(), manifest.dev_dependencies.as_mut()]
    .into_iter()
    .flatten()
  {
    changed += rewrite_dependency_map(&owner, deps, manifest_dir, locations);
  }
  changed
}

fn rewrite_dependency_map(
  owner: &str,
  deps: &mut DependencyMap,
  manifest_dir: &Path,
  locations: &BTreeMap<String, PathBuf>,
) -> usize {
  let mut changed = 0;
  deps.retain(|name, spec| {
    if let Some(location) = locations.get(name) {
      let rewritten = file_specifier(manifest_dir, location);
      debug!(package = %owner, dependency = %name, from = %spec, to = %rewritten, "rewriting dependency");
      *spec = rewritten;
      changed += 1;
      true
    } else if spec.starts_with(WORKSPACE_PROTOCOL) {
      warn!(package = %owner, dependency = %name, specifier = %spec, "dropping workspace dependency that was not isolated");
      changed += 1;
      false
    } else {
      true
    }
  });
  changed
}

/// `file:` specifier for `target` as seen from `from`.
pub fn file_specifier(from: &Path, target: &Path) -> String {
  let rel = pathdiff::diff_paths(target, from).unwrap_or_else(|| target.to_path_buf());
  let rel = rel
    .components()
    .map(|c| c.as_os_str().to_string_lossy())
    .collect::<Vec<_>>()
    .join("/");

  if rel.is_empty() {
    "file:.".to_string()
  } else if rel.starts_with('.') || rel.starts_with('/') {
    format!("file:{rel}")
  } else {
    format!("file:./{rel}")
  }
}
