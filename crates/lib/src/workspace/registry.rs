//! Discover the packages of a pnpm workspace.
//!
//! The workspace root is the nearest ancestor holding `pnpm-workspace.yaml`.
//! Its `packages` globs are expanded against the directory tree and every
//! matched directory with a named `package.json` becomes a
//! [`WorkspacePackage`].

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::types::{ManifestError, PackageManifest, SkipReason, SkippedCandidate, WorkspaceConfig, WorkspacePackage};
use crate::consts::{IGNORED_DIRS, MANIFEST_FILENAME, WORKSPACE_CONFIG_FILENAME};

/// Errors that can occur while reading a workspace.
#[derive(Debug, Error)]
pub enum RegistryError {
  #[error("workspace config not found: {0}")]
  ConfigNotFound(PathBuf),

  #[error("failed to read workspace config {path}: {source}")]
  ConfigRead {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse workspace config {path}: {source}")]
  ConfigParse {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("invalid workspace glob '{pattern}': {source}")]
  InvalidPattern {
    pattern: String,
    #[source]
    source: globset::Error,
  },

  #[error("failed to walk workspace: {message}")]
  Walk { message: String },
}

/// Packages of a workspace, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceRegistry {
  packages: BTreeMap<String, WorkspacePackage>,
}

impl WorkspaceRegistry {
  pub fn get(&self, name: &str) -> Option<&WorkspacePackage> {
    self.packages.get(name)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.packages.contains_key(name)
  }

  pub fn len(&self) -> usize {
    self.packages.len()
  }

  pub fn is_empty(&self) -> bool {
    self.packages.is_empty()
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.packages.keys().map(String::as_str)
  }

  pub fn packages(&self) -> impl Iterator<Item = &WorkspacePackage> {
    self.packages.values()
  }

  /// The package whose directory is `dir`.
  pub fn find_by_dir(&self, dir: &Path) -> Option<&WorkspacePackage> {
    let dir = dunce::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
    self.packages.values().find(|p| p.dir == dir)
  }

  /// Insert a package, returning the entry it replaced.
  fn insert(&mut self, package: WorkspacePackage) -> Option<WorkspacePackage> {
    self.packages.insert(package.name.clone(), package)
  }
}

/// Outcome of scanning a workspace.
#[derive(Debug, Default)]
pub struct WorkspaceScan {
  pub registry: WorkspaceRegistry,
  /// Glob matches that are not packages.
  pub skipped: Vec<SkippedCandidate>,
  /// Packages replaced by a later package with the same name.
  pub shadowed: Vec<WorkspacePackage>,
}

/// Walk up from `start` to the nearest directory holding the workspace config.
///
/// Returns `None` when the filesystem root is reached without finding one.
pub fn find_workspace_root(start: &Path) -> Option<PathBuf> {
  let start = dunce::canonicalize(start).unwrap_or_else(|_| start.to_path_buf());
  start
    .ancestors()
    .find(|dir| dir.join(WORKSPACE_CONFIG_FILENAME).is_file())
    .map(Path::to_path_buf)
}

/// Read the `packages` globs from the workspace config at `root`.
pub fn read_workspace_config(root: &Path) -> Result<Vec<String>, RegistryError> {
  let path = root.join(WORKSPACE_CONFIG_FILENAME);
  let content = fs::read_to_string(&path).map_err(|source| {
    if source.kind() == io::ErrorKind::NotFound {
      RegistryError::ConfigNotFound(path.clone())
    } else {
      RegistryError::ConfigRead {
        path: path.clone(),
        source,
      }
    }
  })?;

  // An empty file is a valid workspace with no packages
  if content.trim().is_empty() {
    return Ok(Vec::new());
  }

  let config: WorkspaceConfig =
    serde_yaml::from_str(&content).map_err(|source| RegistryError::ConfigParse { path, source })?;
  Ok(config.packages)
}

/// Build the name -> package registry for the workspace at `root`.
pub fn build_workspace_registry(root: &Path) -> Result<WorkspaceRegistry, RegistryError> {
  build_workspace_registry_excluding(root, &[])
}

/// Like [`build_workspace_registry`], but never descends into the `exclude`
/// directories. Generated bundles living inside the tree hold copies of real
/// manifests and would shadow the packages they were built from.
pub fn build_workspace_registry_excluding(root: &Path, exclude: &[PathBuf]) -> Result<WorkspaceRegistry, RegistryError> {
  Ok(scan(root, exclude)?.registry)
}

/// Scan the workspace at `root`, recording why non-package matches were skipped.
///
/// When two directories declare the same name the later match wins.
pub fn scan_workspace(root: &Path) -> Result<WorkspaceScan, RegistryError> {
  scan(root, &[])
}

fn scan(root: &Path, exclude: &[PathBuf]) -> Result<WorkspaceScan, RegistryError> {
  let root = dunce::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
  let patterns = read_workspace_config(&root)?;
  let candidates = expand_patterns(&root, &patterns, exclude)?;

  let mut scan = WorkspaceScan::default();
  for rel in candidates {
    let dir = if rel == "." { root.clone() } else { root.join(&rel) };
    match read_candidate(&dir, &rel) {
      Ok(package) => {
        debug!(name = %package.name, dir = %rel, "registered workspace package");
        if let Some(previous) = scan.registry.insert(package) {
          warn!(
            name = %previous.name,
            replaced = %previous.root_relative_dir,
            by = %rel,
            "duplicate workspace package name, last match wins"
          );
          scan.shadowed.push(previous);
        }
      }
      Err(reason) => {
        debug!(dir = %rel, %reason, "skipping workspace glob match");
        scan.skipped.push(SkippedCandidate { dir, reason });
      }
    }
  }

  Ok(scan)
}

/// Turn a candidate directory into a package.
fn read_candidate(dir: &Path, rel: &str) -> Result<WorkspacePackage, SkipReason> {
  let manifest_path = dir.join(MANIFEST_FILENAME);
  if !manifest_path.is_file() {
    return Err(SkipReason::NoManifest);
  }

  let manifest = PackageManifest::load(&manifest_path).map_err(|e| match e {
    ManifestError::Parse { source, .. } => SkipReason::InvalidManifest(source.to_string()),
    other => SkipReason::UnreadableManifest(other.to_string()),
  })?;

  let name = manifest
    .name
    .clone()
    .filter(|n| !n.is_empty())
    .ok_or(SkipReason::MissingName)?;

  Ok(WorkspacePackage {
    name,
    dir: dir.to_path_buf(),
    root_relative_dir: rel.to_string(),
    manifest,
  })
}

fn normalize_pattern(pattern: &str) -> String {
  let trimmed = pattern.trim();
  let trimmed = trimmed.strip_prefix("./").unwrap_or(trimmed);
  let trimmed = trimmed.trim_end_matches('/');
  if trimmed.is_empty() { ".".to_string() } else { trimmed.to_string() }
}

fn compile(pattern: &str) -> Result<globset::Glob, RegistryError> {
  GlobBuilder::new(pattern)
    .literal_separator(true)
    .build()
    .map_err(|source| RegistryError::InvalidPattern {
      pattern: pattern.to_string(),
      source,
    })
}

/// Expand workspace globs into root-relative directories.
///
/// Matches are ordered by pattern, then by path; `!pattern` entries exclude.
fn expand_patterns(root: &Path, patterns: &[String], exclude: &[PathBuf]) -> Result<Vec<String>, RegistryError> {
  let mut includes: Vec<(String, GlobMatcher)> = Vec::new();
  let mut excludes = GlobSetBuilder::new();
  for pattern in patterns {
    if let Some(negated) = pattern.trim().strip_prefix('!') {
      excludes.add(compile(&normalize_pattern(negated))?);
    } else {
      let normalized = normalize_pattern(pattern);
      let matcher = compile(&normalized)?.compile_matcher();
      includes.push((normalized, matcher));
    }
  }
  let excludes: GlobSet = excludes.build().map_err(|source| RegistryError::InvalidPattern {
    pattern: patterns.join(", "),
    source,
  })?;

  let dirs = workspace_dirs(root, exclude)?;
  let mut seen = HashSet::new();
  let mut matched = Vec::new();

  for (pattern, matcher) in &includes {
    if pattern == "." {
      if seen.insert(".".to_string()) {
        matched.push(".".to_string());
      }
      continue;
    }
    for rel in dirs.iter().filter(|rel| matcher.is_match(rel.as_str())) {
      if excludes.is_match(rel.as_str()) || !seen.insert(rel.clone()) {
        continue;
      }
      matched.push(rel.clone());
    }
  }

  Ok(matched)
}

/// Every directory under `root` outside `exclude`, as sorted `/`-separated
/// relative paths.
fn workspace_dirs(root: &Path, exclude: &[PathBuf]) -> Result<Vec<String>, RegistryError> {
  let walker = WalkDir::new(root)
    .min_depth(1)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|e| {
      if !e.file_type().is_dir() {
        return true;
      }
      let ignored = e.file_name().to_str().is_some_and(|name| IGNORED_DIRS.contains(&name));
      !ignored && !exclude.iter().any(|dir| dir == e.path())
    });

  let mut dirs = Vec::new();
  for entry in walker {
    let entry = entry.map_err(|e| RegistryError::Walk { message: e.to_string() })?;
    if !entry.file_type().is_dir() {
      continue;
    }
    let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
    let rel = rel
      .components()
      .map(|c| c.as_os_str().to_string_lossy())
      .collect::<Vec<_>>()
      .join("/");
    dirs.push(rel);
  }

  Ok(dirs)
}
