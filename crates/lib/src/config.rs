//! Runtime configuration passed to the isolation pipeline.

use std::env;
use std::time::Duration;

use thiserror::Error;

/// Environment variable naming the package manager binary.
pub const PACKAGE_MANAGER_ENV: &str = "FNDEPLOY_PACKAGE_MANAGER";

/// Environment variable bounding each pack command, in humantime syntax (`30s`, `2m`).
pub const PACK_TIMEOUT_ENV: &str = "FNDEPLOY_PACK_TIMEOUT";

const DEFAULT_PACKAGE_MANAGER: &str = "pnpm";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("invalid {var} '{value}': {source}")]
  InvalidDuration {
    var: &'static str,
    value: String,
    #[source]
    source: humantime::DurationError,
  },
}

/// Settings that depend on where the tool runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeContext {
  /// Binary invoked for `pack`.
  pub package_manager: String,
  /// Upper bound on a single pack command. `None` waits forever.
  pub pack_timeout: Option<Duration>,
}

impl Default for RuntimeContext {
  fn default() -> Self {
    Self {
      package_manager: DEFAULT_PACKAGE_MANAGER.to_string(),
      pack_timeout: None,
    }
  }
}

impl RuntimeContext {
  /// Defaults overridden by `FNDEPLOY_*` environment variables.
  ///
  /// Empty values are treated as unset.
  pub fn from_env() -> Result<Self, ConfigError> {
    let mut ctx = Self::default();

    if let Some(pm) = non_empty_var(PACKAGE_MANAGER_ENV) {
      ctx.package_manager = pm;
    }

    if let Some(raw) = non_empty_var(PACK_TIMEOUT_ENV) {
      let timeout = parse_duration(PACK_TIMEOUT_ENV, &raw)?;
      ctx.pack_timeout = Some(timeout);
    }

    Ok(ctx)
  }
}

fn parse_duration(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
  humantime::parse_duration(value).map_err(|source| ConfigError::InvalidDuration {
    var,
    value: value.to_string(),
    source,
  })
}

fn non_empty_var(name: &str) -> Option<String> {
  env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
