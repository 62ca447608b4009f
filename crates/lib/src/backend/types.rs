//! API-agnostic description of the functions a codebase wants (or has).
//!
//! The JSON representation uses camelCase keys and encodes the trigger as a
//! single `*Trigger` key on the endpoint, e.g. `"httpsTrigger": {}`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_CODEBASE, DEPLOYMENT_TOOL_LABEL, FIREBASE_MANAGED_PREFIX};

/// Environment variables, keyed by name.
///
/// A sorted map keeps the JSON stringification canonical.
pub type EnvironmentVariables = BTreeMap<String, String>;

/// Cloud Functions generation an endpoint deploys to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
  Gcfv1,
  Gcfv2,
}

impl Platform {
  pub fn as_str(&self) -> &'static str {
    match self {
      Platform::Gcfv1 => "gcfv1",
      Platform::Gcfv2 => "gcfv2",
    }
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A secret exposed to a function as an environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretEnvVar {
  /// The environment variable the secret is accessible at.
  pub key: String,
  /// Secret id, e.g. `mysecret` for `projects/p/secrets/mysecret`.
  pub secret: String,
  /// Project containing the secret.
  pub project_id: String,
  /// Pinned version. Users cannot pin versions; the deploy context does.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpsTrigger {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub invoker: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallableTrigger {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTrigger {
  pub event_type: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub event_filters: Option<BTreeMap<String, String>>,
  #[serde(default)]
  pub retry: bool,
  /// Region of the event source; defaults to the function's region.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub region: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleTrigger {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub schedule: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub time_zone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQueueTrigger {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub invoker: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockingTrigger {
  pub event_type: String,
}

/// The single trigger an endpoint is bound to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Trigger {
  #[serde(rename = "httpsTrigger")]
  Https(HttpsTrigger),
  #[serde(rename = "callableTrigger")]
  Callable(CallableTrigger),
  #[serde(rename = "eventTrigger")]
  Event(EventTrigger),
  #[serde(rename = "scheduleTrigger")]
  Schedule(ScheduleTrigger),
  #[serde(rename = "taskQueueTrigger")]
  TaskQueue(TaskQueueTrigger),
  #[serde(rename = "blockingTrigger")]
  Blocking(BlockingTrigger),
}

impl Trigger {
  /// User-facing trigger kind, used when rejecting trigger changes.
  pub fn kind(&self) -> &str {
    match self {
      Trigger::Https(_) => "an HTTPS",
      Trigger::Callable(_) => "a callable",
      Trigger::Event(_) => "a background triggered",
      Trigger::Schedule(_) => "a scheduled",
      Trigger::TaskQueue(_) => "a task queue",
      Trigger::Blocking(b) => &b.event_type,
    }
  }
}

/// A single deployable function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
  pub id: String,
  pub region: String,
  #[serde(default)]
  pub project: String,
  pub platform: Platform,
  pub runtime: String,
  pub entry_point: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub codebase: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub available_memory_mb: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub labels: Option<BTreeMap<String, String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub environment_variables: Option<EnvironmentVariables>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub secret_environment_variables: Option<Vec<SecretEnvVar>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub concurrency: Option<u32>,
  #[serde(flatten)]
  pub trigger: Trigger,
  /// Deployment fingerprint, assigned once per planning pass.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub hash: Option<String>,
}

impl Endpoint {
  /// Build an endpoint with the required fields; everything else is unset.
  pub fn new(id: &str, region: &str, platform: Platform, trigger: Trigger) -> Self {
    Self {
      id: id.to_string(),
      region: region.to_string(),
      project: String::new(),
      platform,
      runtime: "nodejs22".to_string(),
      entry_point: id.to_string(),
      codebase: None,
      available_memory_mb: None,
      labels: None,
      environment_variables: None,
      secret_environment_variables: None,
      concurrency: None,
      trigger,
      hash: None,
    }
  }

  /// Codebase this endpoint belongs to.
  pub fn codebase(&self) -> &str {
    self.codebase.as_deref().unwrap_or(DEFAULT_CODEBASE)
  }

  /// `id(region)` label used in messages.
  pub fn label(&self) -> String {
    format!("{}({})", self.id, self.region)
  }

  /// Whether the function was deployed by this tool.
  pub fn is_firebase_managed(&self) -> bool {
    self
      .labels
      .as_ref()
      .and_then(|labels| labels.get(DEPLOYMENT_TOOL_LABEL))
      .is_some_and(|tool| tool.starts_with(FIREBASE_MANAGED_PREFIX))
  }
}

/// An API the backend needs enabled before deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredApi {
  pub api: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reason: Option<String>,
}

/// Everything one codebase wants deployed (or currently has deployed).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backend {
  #[serde(default, rename = "requiredAPIs")]
  pub required_apis: Vec<RequiredApi>,
  #[serde(default)]
  pub environment_variables: EnvironmentVariables,
  /// region -> id -> endpoint
  #[serde(default)]
  pub endpoints: BTreeMap<String, BTreeMap<String, Endpoint>>,
}

/// Backends keyed by codebase name.
pub type Backends = BTreeMap<String, Backend>;
