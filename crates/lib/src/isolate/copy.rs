//! Staging the output directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::consts::IGNORED_DIRS;

/// Remove `path` whether it is a file, directory or symlink.
pub fn remove_path(path: &Path) -> io::Result<()> {
  let meta = match path.symlink_metadata() {
    Ok(m) => m,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
    Err(e) => return Err(e),
  };
  if meta.is_dir() { fs::remove_dir_all(path) } else { fs::remove_file(path) }
}

/// Copy `src` into `dst`, skipping ignored directories and anything under `exclude`.
///
/// Symlinks are recreated rather than followed on unix.
pub fn copy_tree(src: &Path, dst: &Path, exclude: &[PathBuf]) -> io::Result<usize> {
  fs::create_dir_all(dst)?;

  let walker = WalkDir::new(src)
    .min_depth(1)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|e| {
      let ignored = e.file_type().is_dir() && e.file_name().to_str().is_some_and(|n| IGNORED_DIRS.contains(&n));
      !ignored && !exclude.iter().any(|x| e.path() == x)
    });

  let mut copied = 0;
  for entry in walker {
    let entry = entry.map_err(io::Error::other)?;
    let rel = entry.path().strip_prefix(src).map_err(io::Error::other)?;
    let target = dst.join(rel);
    let file_type = entry.file_type();

    if file_type.is_dir() {
      fs::create_dir_all(&target)?;
    } else if file_type.is_symlink() {
      copy_symlink(entry.path(), &target)?;
      copied += 1;
    } else {
      fs::copy(entry.path(), &target)?;
      copied += 1;
    }
  }

  Ok(copied)
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
  let dest = fs::read_link(link)?;
  std::os::unix::fs::symlink(dest, target)
}

#[cfg(windows)]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
  if link.is_dir() {
    return Ok(());
  }
  fs::copy(link, target).map(|_| ())
}
