//! `pnpm-lock.yaml` pruning.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use thiserror::Error;
use tracing::trace;

const IMPORTERS_KEY: &str = "importers";

#[derive(Debug, Error)]
pub enum LockfileError {
  #[error("failed to read lockfile {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse lockfile {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("lockfile {0} is not a mapping")]
  NotAMapping(PathBuf),

  #[error("failed to serialize lockfile {path}: {source}")]
  Serialize {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("failed to write lockfile {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// A pnpm lockfile, kept as an untyped document so unknown keys survive.
#[derive(Debug, Clone, PartialEq)]
pub struct PnpmLockfile {
  doc: Mapping,
}

impl PnpmLockfile {
  /// Load a lockfile. Returns `Ok(None)` if it doesn't exist.
  pub fn load(path: &Path) -> Result<Option<Self>, LockfileError> {
    let content = match fs::read_to_string(path) {
      Ok(c) => c,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
      Err(source) => {
        return Err(LockfileError::Read {
          path: path.to_path_buf(),
          source,
        });
      }
    };

    let value: Value = serde_yaml::from_str(&content).map_err(|source| LockfileError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    match value {
      Value::Mapping(doc) => Ok(Some(Self { doc })),
      _ => Err(LockfileError::NotAMapping(path.to_path_buf())),
    }
  }

  pub fn save(&self, path: &Path) -> Result<(), LockfileError> {
    let content = serde_yaml::to_string(&self.doc).map_err(|source| LockfileError::Serialize {
      path: path.to_path_buf(),
      source,
    })?;
    fs::write(path, content).map_err(|source| LockfileError::Write {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Importer keys in document order.
  pub fn importer_keys(&self) -> Vec<String> {
    self
      .importers()
      .map(|m| m.keys().filter_map(Value::as_str).map(String::from).collect())
      .unwrap_or_default()
  }

  fn importers(&self) -> Option<&Mapping> {
    self.doc.get(IMPORTERS_KEY).and_then(Value::as_mapping)
  }

  /// Keep only the importers in `keep`. Returns how many were removed.
  pub fn retain_importers(&mut self, keep: &BTreeSet<String>) -> usize {
    let Some(importers) = self.doc.get_mut(IMPORTERS_KEY).and_then(Value::as_mapping_mut) else {
      return 0;
    };

    let before = importers.len();
    importers.retain(|key, _| {
      let kept = key.as_str().is_some_and(|k| keep.contains(k));
      if !kept {
        trace!(importer = ?key, "pruning importer");
      }
      kept
    });
    before - importers.len()
  }

  pub fn get(&self, key: &str) -> Option<&Value> {
    self.doc.get(key)
  }
}

/// Importer keys to keep for a target and its internal dependencies.
///
/// Keys are root-relative directories; `.` only survives when the target is
/// the workspace root itself.
pub fn importers_to_keep<'a>(target_dir: &'a str, dependency_dirs: impl IntoIterator<Item = &'a str>) -> BTreeSet<String> {
  std::iter::once(target_dir)
    .chain(dependency_dirs)
    .map(String::from)
    .collect()
}
