//! Backend model: the endpoints one codebase wants or has.

mod filter;
mod types;

use thiserror::Error;

pub use filter::{EndpointFilter, endpoint_matches_any_filter, endpoint_matches_filter, parse_endpoint_filters};
pub use types::*;

/// Errors building a backend.
#[derive(Debug, Error)]
pub enum BackendError {
  #[error("backend already contains endpoint {id} in region {region}")]
  DuplicateEndpoint { id: String, region: String },
}

impl Backend {
  /// Create a backend from a list of endpoints.
  pub fn of(endpoints: impl IntoIterator<Item = Endpoint>) -> Result<Self, BackendError> {
    let mut backend = Backend::default();
    for endpoint in endpoints {
      backend.insert(endpoint)?;
    }
    Ok(backend)
  }

  /// Add an endpoint, rejecting a second endpoint with the same region and id.
  pub fn insert(&mut self, endpoint: Endpoint) -> Result<(), BackendError> {
    let region = self.endpoints.entry(endpoint.region.clone()).or_default();
    if region.contains_key(&endpoint.id) {
      return Err(BackendError::DuplicateEndpoint {
        id: endpoint.id,
        region: endpoint.region,
      });
    }
    region.insert(endpoint.id.clone(), endpoint);
    Ok(())
  }

  /// All endpoints across regions.
  pub fn all_endpoints(&self) -> impl Iterator<Item = &Endpoint> {
    self.endpoints.values().flat_map(|by_id| by_id.values())
  }

  /// All endpoints across regions, mutably.
  pub fn all_endpoints_mut(&mut self) -> impl Iterator<Item = &mut Endpoint> {
    self.endpoints.values_mut().flat_map(|by_id| by_id.values_mut())
  }

  /// Whether this backend has an endpoint with the same region and id.
  pub fn has_endpoint(&self, endpoint: &Endpoint) -> bool {
    self
      .endpoints
      .get(&endpoint.region)
      .is_some_and(|by_id| by_id.contains_key(&endpoint.id))
  }

  /// A copy of this backend keeping only endpoints matching `predicate`.
  pub fn matching(&self, predicate: impl Fn(&Endpoint) -> bool) -> Backend {
    let mut filtered = Backend {
      required_apis: self.required_apis.clone(),
      environment_variables: self.environment_variables.clone(),
      endpoints: Default::default(),
    };
    for endpoint in self.all_endpoints().filter(|e| predicate(e)) {
      filtered
        .endpoints
        .entry(endpoint.region.clone())
        .or_default()
        .insert(endpoint.id.clone(), endpoint.clone());
    }
    filtered
  }
}
