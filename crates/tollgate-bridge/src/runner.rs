//! One-shot interpreter invocation.
//!
//! Each invocation spawns a fresh interpreter process, hands it the
//! work unit's source text, and parses everything the process writes
//! to stdout as a single JSON document. The process exit code is not
//! consulted: stdout content alone decides success or failure.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::debug;

use crate::errors::{BridgeError, Result};

/// How much of a malformed output to carry in a parse error.
const FRAGMENT_LIMIT: usize = 200;

/// Bridge configuration.
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    /// Interpreter executable.
    pub interpreter: String,
    /// Arguments placed before the work unit's source text.
    pub interpreter_args: Vec<String>,
    /// Maximum concurrent invocations.
    pub max_concurrency: usize,
    /// Per-invocation wall-clock limit.
    pub timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".into(),
            interpreter_args: vec!["-c".into()],
            max_concurrency: 8,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Spawns interpreter work units and parses their stdout as JSON.
#[derive(Clone)]
pub struct Bridge {
    config: BridgeConfig,
    permits: Arc<Semaphore>,
}

impl Bridge {
    /// Create a bridge from a configuration.
    pub fn new(config: BridgeConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        Self { config, permits }
    }

    /// Run one work unit to completion and parse its stdout.
    ///
    /// `script` is the work unit's source text, passed to the
    /// interpreter after the configured interpreter arguments; `args`
    /// follow it on the command line.
    pub async fn invoke(&self, script: &str, args: &[String]) -> Result<Value> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| BridgeError::Closed)?;

        debug!(interpreter = %self.config.interpreter, "spawning work unit");
        let child = Command::new(&self.config.interpreter)
            .args(&self.config.interpreter_args)
            .arg(script)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(BridgeError::SpawnFailure)?;

        let output = timeout(self.config.timeout, child.wait_with_output())
            .await
            .map_err(|_| BridgeError::Timeout {
                limit: self.config.timeout,
            })?
            .map_err(BridgeError::Output)?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let trimmed = stdout.trim();
        if trimmed.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = if stderr.trim().is_empty() {
                "process wrote nothing to stdout".to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(BridgeError::EmptyOutput { detail });
        }

        serde_json::from_str(trimmed).map_err(|err| BridgeError::Parse {
            message: err.to_string(),
            fragment: trimmed.chars().take(FRAGMENT_LIMIT).collect(),
        })
    }
}
