//! Fixtures for workspace tests.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::consts::{IGNORED_DIRS, WORKSPACE_CONFIG_FILENAME};
use crate::isolate::{PackError, PackageManager};

/// A throwaway pnpm workspace.
pub struct WorkspaceFixture {
  temp: TempDir,
}

impl WorkspaceFixture {
  /// A workspace whose config lists `patterns`.
  pub fn new(patterns: &[&str]) -> Self {
    let ws = Self::empty();
    let mut yaml = String::from("packages:\n");
    for pattern in patterns {
      yaml.push_str(&format!("  - '{pattern}'\n"));
    }
    ws.write(WORKSPACE_CONFIG_FILENAME, &yaml);
    ws
  }

  /// A directory with no workspace config.
  pub fn empty() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  /// Canonical root path.
  pub fn root(&self) -> PathBuf {
    dunce::canonicalize(self.temp.path()).unwrap()
  }

  pub fn path(&self, rel: &str) -> PathBuf {
    if rel == "." { self.root() } else { self.root().join(rel) }
  }

  pub fn write(&self, rel: &str, content: &str) {
    let path = self.path(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
  }

  /// A package at `rel` named `name` with the given dependencies.
  pub fn package(&self, rel: &str, name: &str, deps: &[(&str, &str)]) {
    let deps: serde_json::Map<String, serde_json::Value> = deps
      .iter()
      .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
      .collect();
    let manifest = serde_json::json!({
      "name": name,
      "version": "1.0.0",
      "dependencies": deps,
    });
    let manifest_rel = if rel == "." { "package.json".to_string() } else { format!("{rel}/package.json") };
    self.write(&manifest_rel, &serde_json::to_string_pretty(&manifest).unwrap());
  }
}

/// Write a gzipped tarball holding `entries` verbatim.
///
/// Paths are written raw so tests can build malformed archives.
pub fn write_tarball(path: &Path, entries: &[(&str, &str)]) {
  let file = File::create(path).unwrap();
  let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

  for (name, content) in entries {
    let mut header = tar::Header::new_old();
    let raw = name.as_bytes();
    header.as_old_mut().name[..raw.len()].copy_from_slice(raw);
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_entry_type(tar::EntryType::Regular);
    header.set_cksum();
    builder.append(&header, content.as_bytes()).unwrap();
  }

  builder.into_inner().unwrap().finish().unwrap();
}

/// Packs a directory the way `pnpm pack` lays out its tarball, without pnpm.
#[derive(Debug, Default, Clone, Copy)]
pub struct FakePacker;

impl PackageManager for FakePacker {
  async fn pack(&self, package_dir: &Path, destination: &Path) -> Result<PathBuf, PackError> {
    fs::create_dir_all(destination).unwrap();
    let name = package_dir.file_name().unwrap().to_string_lossy().to_string();
    let tarball = destination.join(format!("{name}.tgz"));

    let file = File::create(&tarball).unwrap();
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    let walker = WalkDir::new(package_dir)
      .min_depth(1)
      .sort_by_file_name()
      .into_iter()
      .filter_entry(|e| !e.file_name().to_str().is_some_and(|n| IGNORED_DIRS.contains(&n)));
    for entry in walker {
      let entry = entry.unwrap();
      if entry.file_type().is_file() {
        let rel = entry.path().strip_prefix(package_dir).unwrap();
        builder.append_path_with_name(entry.path(), Path::new("package").join(rel)).unwrap();
      }
    }
    builder.into_inner().unwrap().finish().unwrap();

    Ok(tarball)
  }
}

/// A packer that always fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingPacker;

impl PackageManager for FailingPacker {
  async fn pack(&self, _package_dir: &Path, _destination: &Path) -> Result<PathBuf, PackError> {
    Err(PackError::Failed {
      program: "fake".to_string(),
      code: Some(1),
      stderr: "boom".to_string(),
    })
  }
}
