//! Endpoint filters parsed from `--only` selectors.
//!
//! ```text
//! functions                     -> no filter (everything)
//! functions:api                 -> codebase "api", or default-codebase endpoints "api*"
//! functions:api:users.create    -> codebase "api", endpoints "users-create*"
//! ```

use serde::{Deserialize, Serialize};

use super::Endpoint;
use crate::consts::DEFAULT_CODEBASE;

/// Selects endpoints by codebase and/or id prefix chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointFilter {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub codebase: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id_chunks: Option<Vec<String>>,
}

impl EndpointFilter {
  pub fn codebase(codebase: &str) -> Self {
    Self {
      codebase: Some(codebase.to_string()),
      id_chunks: None,
    }
  }

  pub fn ids(codebase: Option<&str>, id: &str) -> Self {
    Self {
      codebase: codebase.map(str::to_string),
      id_chunks: Some(split_id(id)),
    }
  }
}

fn split_id(id: &str) -> Vec<String> {
  id.split(['.', '-']).map(str::to_string).collect()
}

/// Parse a comma separated `--only` value into endpoint filters.
///
/// Returns `None` when functions are not filtered at all: either no
/// `functions` selector is present or a bare `functions` selector targets
/// every endpoint.
pub fn parse_endpoint_filters(only: &str) -> Option<Vec<EndpointFilter>> {
  let mut filters = Vec::new();

  for selector in only.split(',').map(str::trim) {
    if selector == "functions" {
      return None;
    }
    let Some(rest) = selector.strip_prefix("functions:") else {
      continue;
    };
    if rest.is_empty() {
      continue;
    }

    match rest.split_once(':') {
      Some((codebase, id)) if !id.is_empty() => filters.push(EndpointFilter::ids(Some(codebase), id)),
      Some((codebase, _)) => filters.push(EndpointFilter::codebase(codebase)),
      None => {
        // A single fragment is either a codebase or a function id in the default codebase.
        filters.push(EndpointFilter::codebase(rest));
        filters.push(EndpointFilter::ids(Some(DEFAULT_CODEBASE), rest));
      }
    }
  }

  if filters.is_empty() { None } else { Some(filters) }
}

/// Whether `endpoint` is selected by `filter`.
pub fn endpoint_matches_filter(endpoint: &Endpoint, filter: &EndpointFilter) -> bool {
  if let Some(codebase) = &filter.codebase
    && codebase != endpoint.codebase()
  {
    return false;
  }

  let Some(chunks) = &filter.id_chunks else {
    return true;
  };

  let id_chunks: Vec<&str> = endpoint.id.split('-').collect();
  if id_chunks.len() < chunks.len() {
    return false;
  }
  chunks.iter().zip(id_chunks).all(|(want, have)| want == have)
}

/// Whether any filter selects `endpoint`. No filters select everything.
pub fn endpoint_matches_any_filter(endpoint: &Endpoint, filters: Option<&[EndpointFilter]>) -> bool {
  match filters {
    None => true,
    Some(filters) => filters.iter().any(|f| endpoint_matches_filter(endpoint, f)),
  }
}
