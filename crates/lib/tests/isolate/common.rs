//! Shared helpers for isolation integration tests.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use fndeploy_lib::isolate::{PackError, PackageManager};
use tempfile::TempDir;

/// A pnpm workspace in a temporary directory.
pub struct TestWorkspace {
  pub temp: TempDir,
}

impl TestWorkspace {
  pub fn new(patterns: &[&str]) -> Self {
    let ws = Self {
      temp: TempDir::new().unwrap(),
    };
    let mut yaml = String::from("packages:\n");
    for pattern in patterns {
      yaml.push_str(&format!("  - {pattern}\n"));
    }
    ws.write_file("pnpm-workspace.yaml", &yaml);
    ws
  }

  pub fn root(&self) -> PathBuf {
    dunce::canonicalize(self.temp.path()).unwrap()
  }

  pub fn path(&self, relative_path: &str) -> PathBuf {
    self.root().join(relative_path)
  }

  /// Write a file relative to the workspace root.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
  }

  pub fn read_file(&self, relative_path: &str) -> String {
    fs::read_to_string(self.path(relative_path)).unwrap()
  }
}

/// Packs a directory into an npm-style tarball without running a package manager.
pub struct TarPacker;

impl PackageManager for TarPacker {
  async fn pack(&self, package_dir: &Path, destination: &Path) -> Result<PathBuf, PackError> {
    fs::create_dir_all(destination).unwrap();
    let tarball = destination.join("package.tgz");

    let file = File::create(&tarball).unwrap();
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    builder.append_dir_all("package", package_dir).unwrap();
    builder.into_inner().unwrap().finish().unwrap();

    Ok(tarball)
  }
}

/// Every file under `dir`, relative and sorted.
pub fn file_set(dir: &Path) -> Vec<String> {
  let mut files: Vec<String> = walkdir::WalkDir::new(dir)
    .into_iter()
    .filter_map(Result::ok)
    .filter(|e| e.file_type().is_file())
    .map(|e| e.path().strip_prefix(dir).unwrap().to_string_lossy().replace('\\', "/"))
    .collect();
  files.sort();
  files
}
