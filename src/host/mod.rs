//! Execution bridge: runs model-supplied code against a host scripting surface.
//!
//! The router only sees the [`ScriptHost`] trait. Which host backs it is a
//! start-up decision taken from `[host]` and `[execution]` in the settings.

pub mod embedded;
pub mod local_process;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::agent::config::{ExecutionConfig, HostConfig};

pub use embedded::EmbeddedHost;
pub use local_process::LocalProcessHost;

/// Error thrown by executed code, or raised by the host while running it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ScriptFailure {
    pub message: String,
    /// Stack trace reported by the host; empty when it has none.
    pub stack: String,
}

impl ScriptFailure {
    pub fn new(message: impl Into<String>, stack: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: stack.into(),
        }
    }
}

/// Result of one execution. `undefined` results are reported as `Value::Null`.
pub type ExecutionOutcome = Result<Value, ScriptFailure>;

/// A scripting surface that can run a code string to completion.
///
/// Implementations must always resolve: a host that cannot finish the code
/// reports a [`ScriptFailure`] instead of hanging past its own limits.
#[async_trait]
pub trait ScriptHost: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, code: &str) -> ExecutionOutcome;
}

/// Host used when code execution has not been granted.
pub struct DisabledHost;

#[async_trait]
impl ScriptHost for DisabledHost {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn execute(&self, _code: &str) -> ExecutionOutcome {
        Err(ScriptFailure::new(
            "Code execution is disabled in this plugin's configuration",
            "",
        ))
    }
}

/// Builds the configured host. Execution that is switched off never starts
/// an engine or a child process.
pub fn from_settings(
    host: &HostConfig,
    execution: &ExecutionConfig,
    workspace_root: &Path,
) -> Result<Box<dyn ScriptHost>> {
    if !execution.enabled {
        log::warn!("Code execution disabled by configuration");
        return Ok(Box::new(DisabledHost));
    }
    match host {
        HostConfig::Embedded(config) => {
            let prelude = config.load_prelude()?;
            Ok(Box::new(EmbeddedHost::start(prelude)?))
        }
        HostConfig::LocalProcess(config) => {
            Ok(Box::new(LocalProcessHost::start(config, workspace_root)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_execution_never_runs_code() {
        let host = from_settings(
            &HostConfig::default(),
            &ExecutionConfig { enabled: false },
            Path::new("."),
        )
        .unwrap();
        assert_eq!(host.name(), "disabled");

        let failure = host.execute("(async () => 42)();").await.unwrap_err();
        assert!(failure.message.contains("disabled"));
    }
}
