//! Assign deploy fingerprints to every wanted endpoint.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::hash::{SecretVersions, endpoint_hash, environment_variables_hash, secrets_hash};
use crate::backend::{Backend, Backends, EndpointFilter, Platform, endpoint_matches_filter};

/// Pre-computed source hashes for one codebase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceHashes {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub functions_source_v1_hash: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub functions_source_v2_hash: Option<String>,
}

impl SourceHashes {
  /// The source hash an endpoint on `platform` is deployed from.
  pub fn for_platform(&self, platform: Platform) -> Option<&str> {
    match platform {
      Platform::Gcfv2 => self.functions_source_v2_hash.as_deref(),
      Platform::Gcfv1 => self.functions_source_v1_hash.as_deref(),
    }
  }
}

/// Compute and assign `endpoint.hash` for every endpoint of every backend.
///
/// Endpoints selected by one of `force` are left without a hash so the
/// planner always redeploys them. A codebase with no entry in `sources`
/// simply hashes without a source component.
pub fn apply_backend_hashes(
  wants: &mut Backends,
  sources: &BTreeMap<String, SourceHashes>,
  force: &[EndpointFilter],
  resolver: &impl SecretVersions,
) {
  for (codebase, backend) in wants.iter_mut() {
    let source = sources.get(codebase);
    debug!(codebase, has_source = source.is_some(), "hashing backend");
    apply_backend_hash_to_endpoints(backend, source, force, resolver);
  }
}

fn apply_backend_hash_to_endpoints(
  backend: &mut Backend,
  source: Option<&SourceHashes>,
  force: &[EndpointFilter],
  resolver: &impl SecretVersions,
) {
  let env_hash = environment_variables_hash(Some(&backend.environment_variables));

  for endpoint in backend.all_endpoints_mut() {
    if force.iter().any(|f| endpoint_matches_filter(endpoint, f)) {
      trace!(endpoint = %endpoint.label(), "forced redeploy, leaving unhashed");
      endpoint.hash = None;
      continue;
    }

    let secrets = secrets_hash(endpoint, resolver);
    let source_hash = source.and_then(|s| s.for_platform(endpoint.platform));
    let hash = endpoint_hash(source_hash, Some(&env_hash), Some(&secrets));
    trace!(endpoint = %endpoint.label(), %hash, "assigned hash");
    endpoint.hash = Some(hash);
  }
}
