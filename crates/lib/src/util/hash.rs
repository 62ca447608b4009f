//! SHA-1 hashing helpers.
//!
//! Deploy fingerprints are SHA-1 lowercase hex digests so they stay comparable
//! with hashes recorded by earlier deploys.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use sha1::{Digest, Sha1};
use thiserror::Error;

/// Error while hashing file content.
#[derive(Debug, Error)]
pub enum HashError {
  #[error("failed to read file {path}: {source}")]
  ReadFile {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> String {
  let mut hasher = Sha1::new();
  hasher.update(data);
  hex::encode(hasher.finalize())
}

/// Hash a string's UTF-8 bytes.
pub fn hash_str(data: &str) -> String {
  hash_bytes(data.as_bytes())
}

/// Hash a file's contents.
///
/// Only the bytes are hashed, never metadata, so identical files at different
/// paths or with different timestamps hash identically.
pub fn hash_file(path: &Path) -> Result<String, HashError> {
  let read_err = |source| HashError::ReadFile {
    path: path.to_path_buf(),
    source,
  };

  let mut file = fs::File::open(path).map_err(read_err)?;
  let mut hasher = Sha1::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = file.read(&mut buffer).map_err(read_err)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(hex::encode(hasher.finalize()))
}
