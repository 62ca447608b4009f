//! Types for pnpm workspaces: configuration, manifests and packages.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ordered `name -> specifier` dependency map.
pub type DependencyMap = IndexMap<String, String>;

/// Protocol prefix for dependencies resolved from the local workspace.
pub const WORKSPACE_PROTOCOL: &str = "workspace:";

/// `pnpm-workspace.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
  /// Glob patterns selecting package directories, relative to the workspace root.
  #[serde(default)]
  pub packages: Vec<String>,
}

/// Errors reading or writing a `package.json`.
#[derive(Debug, Error)]
pub enum ManifestError {
  #[error("failed to read manifest {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse manifest {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to serialize manifest {path}: {source}")]
  Serialize {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to write manifest {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// A `package.json`.
///
/// Only the fields this crate reads are typed; everything else is kept in
/// `extra`, in document order, so a rewritten manifest loses nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub dependencies: Option<DependencyMap>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub dev_dependencies: Option<DependencyMap>,

  #[serde(flatten)]
  pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PackageManifest {
  /// Load and parse a manifest file.
  pub fn load(path: &Path) -> Result<Self, ManifestError> {
    let content = fs::read_to_string(path).map_err(|source| ManifestError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    serde_json::from_str(&content).map_err(|source| ManifestError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Write the manifest as pretty JSON with a trailing newline.
  pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
    let mut content = serde_json::to_string_pretty(self).map_err(|source| ManifestError::Serialize {
      path: path.to_path_buf(),
      source,
    })?;
    content.push('\n');
    fs::write(path, content).map_err(|source| ManifestError::Write {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Names of dependencies, then dev dependencies when `include_dev` is set.
  pub fn dependency_names(&self, include_dev: bool) -> impl Iterator<Item = &String> {
    let dev = if include_dev { self.dev_dependencies.as_ref() } else { None };
    self
      .dependencies
      .iter()
      .chain(dev)
      .flat_map(|deps| deps.keys())
  }
}

/// A package that belongs to the workspace.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkspacePackage {
  /// Package name from the manifest.
  pub name: String,
  /// Absolute package directory.
  pub dir: PathBuf,
  /// Directory relative to the workspace root, `/`-separated; `.` for the root.
  pub root_relative_dir: String,
  pub manifest: PackageManifest,
}

/// Why a directory matched by a workspace glob is not a package.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
  #[error("no package.json")]
  NoManifest,

  #[error("unreadable package.json: {0}")]
  UnreadableManifest(String),

  #[error("invalid package.json: {0}")]
  InvalidManifest(String),

  #[error("package.json has no name")]
  MissingName,
}

/// A glob match that was not registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedCandidate {
  pub dir: PathBuf,
  pub reason: SkipReason,
}
