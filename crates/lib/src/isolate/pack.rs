//! Turning workspace packages into tarballs and back.

use std::fs::{self, File};
use std::future::Future;
use std::io::{self, BufReader};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use flate2::read::GzDecoder;
use tar::Archive;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::RuntimeContext;

#[derive(Debug, Error)]
pub enum PackError {
  #[error("failed to create {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to run '{program}': {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },

  #[error("'{program} pack' exited with code {code:?}: {stderr}")]
  Failed {
    program: String,
    code: Option<i32>,
    stderr: String,
  },

  #[error("'{program} pack' did not finish within {}", humantime::format_duration(*.timeout))]
  TimedOut { program: String, timeout: Duration },

  #[error("no tarball was produced in {0}")]
  NoTarball(PathBuf),

  #[error("failed to unpack {tarball}: {source}")]
  Unpack {
    tarball: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// The package manager used to bundle workspace packages.
pub trait PackageManager {
  /// Pack the package in `package_dir` into a tarball under `destination`.
  ///
  /// Returns the tarball path.
  fn pack(&self, package_dir: &Path, destination: &Path) -> impl Future<Output = Result<PathBuf, PackError>> + Send;

  /// Extract `tarball` into `destination`, dropping the top-level directory.
  fn unpack(&self, tarball: &Path, destination: &Path) -> Result<(), PackError> {
    unpack_tarball(tarball, destination).map_err(|source| PackError::Unpack {
      tarball: tarball.to_path_buf(),
      source,
    })
  }
}

/// `pnpm pack` as a child process.
#[derive(Debug, Clone)]
pub struct PnpmCli {
  program: String,
  timeout: Option<Duration>,
}

impl PnpmCli {
  pub fn new(ctx: &RuntimeContext) -> Self {
    Self {
      program: ctx.package_manager.clone(),
      timeout: ctx.pack_timeout,
    }
  }
}

impl Default for PnpmCli {
  fn default() -> Self {
    Self::new(&RuntimeContext::default())
  }
}

impl PackageManager for PnpmCli {
  async fn pack(&self, package_dir: &Path, destination: &Path) -> Result<PathBuf, PackError> {
    fs::create_dir_all(destination).map_err(|source| PackError::CreateDir {
      path: destination.to_path_buf(),
      source,
    })?;

    let mut command = Command::new(&self.program);
    command
      .arg("pack")
      .arg("--pack-destination")
      .arg(destination)
      .current_dir(package_dir)
      .kill_on_drop(true);

    info!(program = %self.program, dir = %package_dir.display(), "packing");

    let output = match self.timeout {
      Some(timeout) => tokio::time::timeout(timeout, command.output())
        .await
        .map_err(|_| PackError::TimedOut {
          program: self.program.clone(),
          timeout,
        })?,
      None => command.output().await,
    }
    .map_err(|source| PackError::Spawn {
      program: self.program.clone(),
      source,
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim().is_empty() {
      debug!(stdout = %stdout.trim(), "pack output");
    }

    if !output.status.success() {
      return Err(PackError::Failed {
        program: self.program.clone(),
        code: output.status.code(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
      });
    }

    find_tarball(destination)
  }
}

/// The single `.tgz` in `dir`.
fn find_tarball(dir: &Path) -> Result<PathBuf, PackError> {
  let entries = fs::read_dir(dir).map_err(|_| PackError::NoTarball(dir.to_path_buf()))?;
  entries
    .filter_map(Result::ok)
    .map(|e| e.path())
    .find(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "tgz"))
    .ok_or_else(|| PackError::NoTarball(dir.to_path_buf()))
}

/// Extract a gzipped tarball, stripping the first path component.
///
/// npm-style tarballs nest everything under `package/`. Entries that would
/// land outside `dest` are skipped.
pub fn unpack_tarball(tarball: &Path, dest: &Path) -> io::Result<()> {
  let file = File::open(tarball)?;
  let decoder = GzDecoder::new(BufReader::new(file));
  let mut archive = Archive::new(decoder);

  fs::create_dir_all(dest)?;

  for entry in archive.entries()? {
    let mut entry = entry?;
    let path = entry.path()?;

    let stripped: PathBuf = path.components().skip(1).collect();
    if stripped.as_os_str().is_empty() {
      continue;
    }
    if !stripped.components().all(|c| matches!(c, Component::Normal(_))) {
      debug!(entry = %stripped.display(), "skipping tar entry outside destination");
      continue;
    }

    let dest_path = dest.join(&stripped);
    if let Some(parent) = dest_path.parent() {
      fs::create_dir_all(parent)?;
    }

    entry.unpack(&dest_path)?;
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::{WorkspaceFixture, write_tarball};
  use tempfile::TempDir;

  #[test]
  fn unpack_strips_top_level_dir() {
    let temp = TempDir::new().unwrap();
    let tarball = temp.path().join("pkg.tgz");
    write_tarball(
      &tarball,
      &[("package/package.json", "{}"), ("package/lib/index.js", "module.exports = 1;")],
    );

    let dest = temp.path().join("out");
    unpack_tarball(&tarball, &dest).unwrap();

    assert!(dest.join("package.json").is_file());
    assert_eq!(fs::read_to_string(dest.join("lib/index.js")).unwrap(), "module.exports = 1;");
    assert!(!dest.join("package").exists());
  }

  #[test]
  fn unpack_skips_escaping_entries() {
    let temp = TempDir::new().unwrap();
    let tarball = temp.path().join("pkg.tgz");
    write_tarball(&tarball, &[("package/ok.txt", "ok"), ("package/../../evil.txt", "no")]);

    let dest = temp.path().join("a/b");
    unpack_tarball(&tarball, &dest).unwrap();

    assert!(dest.join("ok.txt").is_file());
    assert!(!temp.path().join("evil.txt").exists());
  }

  #[test]
  fn unpack_missing_tarball_names_it() {
    let temp = TempDir::new().unwrap();
    let err = PnpmCli::default()
      .unpack(&temp.path().join("missing.tgz"), temp.path())
      .unwrap_err();
    assert!(err.to_string().contains("missing.tgz"));
  }

  #[tokio::test]
  async fn pack_reports_missing_program() {
    let ws = WorkspaceFixture::new(&["libs/*"]);
    ws.package("libs/a", "a", &[]);

    let pm = PnpmCli::new(&RuntimeContext {
      package_manager: "fndeploy-no-such-package-manager".to_string(),
      pack_timeout: None,
    });
    let err = pm.pack(&ws.path("libs/a"), &ws.path("tmp")).await.unwrap_err();
    assert!(matches!(err, PackError::Spawn { .. }));
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn pack_reports_non_zero_exit() {
    let ws = WorkspaceFixture::new(&["libs/*"]);
    ws.package("libs/a", "a", &[]);

    let pm = PnpmCli::new(&RuntimeContext {
      package_manager: "false".to_string(),
      pack_timeout: None,
    });
    let err = pm.pack(&ws.path("libs/a"), &ws.path("tmp")).await.unwrap_err();
    assert!(matches!(err, PackError::Failed { .. }));
  }

  #[test]
  fn find_tarball_requires_tgz() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("notes.txt"), "").unwrap();
    assert!(matches!(find_tarball(temp.path()), Err(PackError::NoTarball(_))));

    fs::write(temp.path().join("a-1.0.0.tgz"), "").unwrap();
    assert_eq!(find_tarball(temp.path()).unwrap(), temp.path().join("a-1.0.0.tgz"));
  }
}
