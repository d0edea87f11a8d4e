//! Engine configuration
//!
//! [`EngineConfig`] carries the executor's knobs. It can be built in code with
//! the `with_*` methods, deserialized with `serde`, or loaded from environment
//! variables under a prefix:
//!
//! | Variable                          | Field               | Default   |
//! |-----------------------------------|---------------------|-----------|
//! | `{PREFIX}MAX_STEPS`               | `max_steps`         | `100`     |
//! | `{PREFIX}APPROVAL_MODE`           | `approval_mode`     | `pause`   |
//! | `{PREFIX}APPROVAL_TIMEOUT_SECS`   | `approval_timeout_secs` | none  |
//! | `{PREFIX}STATE_VERSION`           | `state_version`     | `1`       |
//! | `{PREFIX}LOG`                     | `log_filter`        | `info`    |
//!
//! ```rust,ignore
//! let config = EngineConfig::from_env("FLOWGRAPH_")?;
//! config.validate()?;
//! ```

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};

/// Default environment prefix
pub const ENV_PREFIX: &str = "FLOWGRAPH_";

/// What the executor does when a node requires approval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalMode {
    /// Persist progress and return; resume later
    #[default]
    Pause,
    /// Block the run until the decision arrives or times out
    Wait,
}

impl FromStr for ApprovalMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pause" => Ok(ApprovalMode::Pause),
            "wait" => Ok(ApprovalMode::Wait),
            other => Err(format!("unknown approval mode '{}', expected 'pause' or 'wait'", other)),
        }
    }
}

/// Executor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum node executions per run before giving up
    pub max_steps: usize,
    pub approval_mode: ApprovalMode,
    /// Applied to approval requests created without their own timeout
    pub approval_timeout_secs: Option<u64>,
    /// Version passed to the state migrator on resume
    pub state_version: String,
    /// `tracing_subscriber::EnvFilter` directive
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: 100,
            approval_mode: ApprovalMode::Pause,
            approval_timeout_secs: None,
            state_version: "1".to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_approval_mode(mut self, mode: ApprovalMode) -> Self {
        self.approval_mode = mode;
        self
    }

    pub fn with_approval_timeout(mut self, timeout: Duration) -> Self {
        self.approval_timeout_secs = Some(timeout.as_secs());
        self
    }

    pub fn with_state_version(mut self, version: impl Into<String>) -> Self {
        self.state_version = version.into();
        self
    }

    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    pub fn approval_timeout(&self) -> Option<Duration> {
        self.approval_timeout_secs.map(Duration::from_secs)
    }

    /// Defaults overridden by any `{prefix}*` variables that are set
    pub fn from_env(prefix: &str) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            max_steps: get_env_parse(&env_key(prefix, "max_steps"))?.unwrap_or(defaults.max_steps),
            approval_mode: get_env_parse(&env_key(prefix, "approval_mode"))?
                .unwrap_or(defaults.approval_mode),
            approval_timeout_secs: get_env_parse(&env_key(prefix, "approval_timeout_secs"))?,
            state_version: get_env(&env_key(prefix, "state_version"))?
                .unwrap_or(defaults.state_version),
            log_filter: get_env(&env_key(prefix, "log"))?.unwrap_or(defaults.log_filter),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(GraphError::Configuration("max_steps must be at least 1".to_string()));
        }
        if self.approval_timeout_secs == Some(0) {
            return Err(GraphError::Configuration(
                "approval_timeout_secs must be positive when set".to_string(),
            ));
        }
        if self.state_version.trim().is_empty() {
            return Err(GraphError::Configuration("state_version must not be empty".to_string()));
        }
        Ok(())
    }
}

fn env_key(prefix: &str, name: &str) -> String {
    format!("{}{}", prefix, name.to_uppercase())
}

fn get_env(key: &str) -> Result<Option<String>> {
    match env::var(key) {
        Ok(val) => Ok(Some(val)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(GraphError::Configuration(format!(
            "Environment variable {} contains invalid UTF-8",
            key
        ))),
    }
}

fn get_env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get_env(key)? {
        Some(val) => val.trim().parse::<T>().map(Some).map_err(|e| {
            GraphError::Configuration(format!("Failed to parse environment variable {}: {}", key, e))
        }),
        None => Ok(None),
    }
}
