//! Settings types with compiled defaults.

use serde::{Deserialize, Serialize};

/// Root settings for the gateway.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// Public listener settings.
    pub server: ServerSettings,
    /// Backend upstream target.
    pub upstream: UpstreamSettings,
    /// Supervised child processes.
    pub supervisor: SupervisorSettings,
    /// Subprocess RPC bridge settings.
    pub bridge: BridgeSettings,
    /// Realtime connection settings.
    pub realtime: RealtimeSettings,
}

/// Public listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Host to bind.
    pub host: String,
    /// Public port.
    pub port: u16,
    /// Reserved API path prefix forwarded to the upstream.
    pub api_prefix: String,
    /// Static asset root served for all other paths.
    pub static_root: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            api_prefix: "/api".into(),
            static_root: "dist".into(),
        }
    }
}

/// Backend upstream target for the reverse proxy.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamSettings {
    /// Upstream host.
    pub host: String,
    /// Upstream port.
    pub port: u16,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8000,
        }
    }
}

/// Settings for both supervised children.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorSettings {
    /// Backend service process.
    pub backend: ChildSettings,
    /// Frontend dev-server process.
    pub frontend: ChildSettings,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            backend: ChildSettings {
                command: "uvicorn".into(),
                args: vec!["main:app".into(), "--port".into(), "8000".into()],
                working_dir: "backend".into(),
                ready_port: 8000,
                ready_timeout_secs: 30,
            },
            frontend: ChildSettings {
                command: "npm".into(),
                args: vec!["run".into(), "dev".into()],
                working_dir: "frontend".into(),
                ready_port: 5173,
                ready_timeout_secs: 60,
            },
        }
    }
}

/// One supervised child process.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChildSettings {
    /// Executable to run.
    pub command: String,
    /// Arguments.
    pub args: Vec<String>,
    /// Working directory, relative to the gateway's working directory.
    pub working_dir: String,
    /// Port the process listens on once ready.
    pub ready_port: u16,
    /// How long to wait for readiness before giving up.
    pub ready_timeout_secs: u64,
}

/// Subprocess RPC bridge settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// Interpreter executable for work units.
    pub interpreter: String,
    /// Arguments placed before the work unit's source text.
    pub interpreter_args: Vec<String>,
    /// Maximum concurrent invocations.
    pub max_concurrency: usize,
    /// Per-invocation timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            interpreter: "python3".into(),
            interpreter_args: vec!["-c".into()],
            max_concurrency: 8,
            timeout_ms: 30_000,
        }
    }
}

/// Realtime connection settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeSettings {
    /// WebSocket path on the page origin.
    pub path: String,
    /// Reconnection attempt ceiling.
    pub max_attempts: u32,
    /// How long a received message stays in the last-message slot.
    pub message_ttl_ms: u64,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            path: "/api/ws".into(),
            max_attempts: 5,
            message_ttl_ms: 1000,
        }
    }
}
