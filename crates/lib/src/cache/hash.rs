//! Hash primitives for deploy fingerprints.
//!
//! Each component is an independent SHA-1 hex digest:
//! - environment variables: canonical JSON of the env map
//! - secrets: JSON of the endpoint's secret-version bindings
//! - source: bytes of the packaged source archive
//!
//! [`endpoint_hash`] folds whichever components are present into one value.

use std::path::Path;

use serde::Serialize;

use crate::backend::{Endpoint, EnvironmentVariables};
use crate::util::hash::{HashError, hash_file, hash_str};

/// One secret binding as it participates in the secrets hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecretVersion {
  pub key: String,
  pub secret: String,
  pub version: String,
}

/// Resolves the secret versions an endpoint will be deployed with.
///
/// The deploy context owns secret resolution; the default resolver reads the
/// version pinned on each binding.
pub trait SecretVersions {
  /// Bindings in declaration order, or `None` when the endpoint has no secrets.
  fn get_secret_versions(&self, endpoint: &Endpoint) -> Option<Vec<SecretVersion>>;
}

/// Uses the versions already pinned on the endpoint's bindings.
#[derive(Debug, Clone, Copy, Default)]
pub struct PinnedSecretVersions;

impl SecretVersions for PinnedSecretVersions {
  fn get_secret_versions(&self, endpoint: &Endpoint) -> Option<Vec<SecretVersion>> {
    endpoint.secret_environment_variables.as_ref().map(|secrets| {
      secrets
        .iter()
        .map(|s| SecretVersion {
          key: s.key.clone(),
          secret: s.secret.clone(),
          version: s.version.clone().unwrap_or_default(),
        })
        .collect()
    })
  }
}

/// Hash of a backend's environment variables as JSON with sorted keys.
/// `None` hashes as `{}`.
pub fn environment_variables_hash(env: Option<&EnvironmentVariables>) -> String {
  let json = match env {
    // BTreeMap of strings always serializes
    Some(env) => serde_json::to_string(env).unwrap_or_else(|_| "{}".to_string()),
    None => "{}".to_string(),
  };
  hash_str(&json)
}

/// Hash of an endpoint's secret bindings, in declaration order.
///
/// Reordering the same bindings changes the hash.
pub fn secrets_hash(endpoint: &Endpoint, resolver: &impl SecretVersions) -> String {
  let json = match resolver.get_secret_versions(endpoint) {
    Some(versions) => serde_json::to_string(&versions).unwrap_or_else(|_| "{}".to_string()),
    None => "{}".to_string(),
  };
  hash_str(&json)
}

/// Hash of a packaged source file's bytes.
pub fn source_hash(path: &Path) -> Result<String, HashError> {
  hash_file(path)
}

/// Combine the present components, in the order source, env, secrets.
pub fn endpoint_hash(source: Option<&str>, env: Option<&str>, secrets: Option<&str>) -> String {
  let combined: String = [source, env, secrets].into_iter().flatten().collect();
  hash_str(&combined)
}
