//! One supervised child process.
//!
//! A [`ManagedProcess`] spawns its child with piped stdout/stderr,
//! forwards both through tracing with the child's role attached, and
//! reports readiness by polling the child's listening port. There is
//! no restart policy: an exited child stays exited.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

use tollgate_settings::ChildSettings;

use crate::errors::{Result, SupervisorError};

/// Interval between readiness probes.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Interval between exit polls once a child is running.
const MONITOR_INTERVAL: Duration = Duration::from_millis(500);

/// Which supervised child a process is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessRole {
    /// The API backend service.
    Backend,
    /// The frontend dev server.
    Frontend,
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend => write!(f, "backend"),
            Self::Frontend => write!(f, "frontend"),
        }
    }
}

/// Observable lifecycle of a supervised child.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessState {
    /// Not yet spawned.
    NotStarted,
    /// Spawned, port not yet open.
    Starting,
    /// Port opened, considered healthy.
    Running,
    /// Exited, with its exit code when the platform reports one.
    Exited(Option<i32>),
}

/// How to launch and probe one child.
#[derive(Clone, Debug)]
pub struct ProcessSpec {
    /// Which child this is.
    pub role: ProcessRole,
    /// Executable to run.
    pub command: String,
    /// Arguments.
    pub args: Vec<String>,
    /// Working directory; empty means inherit.
    pub working_dir: PathBuf,
    /// Port the child listens on once ready.
    pub ready_port: u16,
    /// How long to wait for the port to open.
    pub ready_timeout: Duration,
}

impl ProcessSpec {
    /// Build a spec from the settings for one child.
    pub fn from_settings(role: ProcessRole, settings: &ChildSettings) -> Self {
        Self {
            role,
            command: settings.command.clone(),
            args: settings.args.clone(),
            working_dir: PathBuf::from(&settings.working_dir),
            ready_port: settings.ready_port,
            ready_timeout: Duration::from_secs(settings.ready_timeout_secs),
        }
    }
}

/// A supervised child process.
pub struct ManagedProcess {
    spec: ProcessSpec,
    child: Arc<Mutex<Option<Child>>>,
    state: Arc<parking_lot::Mutex<ProcessState>>,
}

impl ManagedProcess {
    /// Create an unstarted process from its spec.
    pub fn new(spec: ProcessSpec) -> Self {
        Self {
            spec,
            child: Arc::new(Mutex::new(None)),
            state: Arc::new(parking_lot::Mutex::new(ProcessState::NotStarted)),
        }
    }

    /// Which child this is.
    pub fn role(&self) -> ProcessRole {
        self.spec.role
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProcessState {
        *self.state.lock()
    }

    /// Spawn the child and start forwarding its output.
    pub async fn start(&self) -> Result<()> {
        let spec = &self.spec;
        let mut command = Command::new(&spec.command);
        let _ = command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if !spec.working_dir.as_os_str().is_empty() {
            let _ = command.current_dir(&spec.working_dir);
        }
        let mut child = command.spawn().map_err(|source| SupervisorError::Spawn {
            role: spec.role,
            source,
        })?;

        if let Some(stdout) = child.stdout.take() {
            forward_output(spec.role, stdout, false);
        }
        if let Some(stderr) = child.stderr.take() {
            forward_output(spec.role, stderr, true);
        }

        info!(role = %spec.role, command = %spec.command, "child spawned");
        *self.state.lock() = ProcessState::Starting;
        *self.child.lock().await = Some(child);
        Ok(())
    }

    /// Poll until the child's port accepts connections.
    ///
    /// Fails early when the child exits before the port opens, and
    /// with a timeout when the port never opens.
    pub async fn wait_for_ready(&self) -> Result<()> {
        let spec = &self.spec;
        let deadline = Instant::now() + spec.ready_timeout;
        let addr = format!("127.0.0.1:{}", spec.ready_port);

        loop {
            if let Some(code) = self.poll_exit().await? {
                *self.state.lock() = ProcessState::Exited(code);
                return Err(SupervisorError::ExitedEarly {
                    role: spec.role,
                    code,
                });
            }

            if TcpStream::connect(&addr).await.is_ok() {
                info!(role = %spec.role, port = spec.ready_port, "child ready");
                *self.state.lock() = ProcessState::Running;
                self.spawn_monitor();
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(SupervisorError::ReadyTimeout {
                    role: spec.role,
                    port: spec.ready_port,
                    waited: spec.ready_timeout,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Kill the child if it is still running.
    pub async fn shutdown(&self) {
        let child = self.child.lock().await.take();
        if let Some(mut child) = child {
            let _ = child.start_kill();
            match child.wait().await {
                Ok(status) => {
                    info!(role = %self.spec.role, ?status, "child stopped");
                    *self.state.lock() = ProcessState::Exited(status.code());
                }
                Err(err) => warn!(role = %self.spec.role, %err, "failed to reap child"),
            }
        }
    }

    /// Non-blocking exit check. `Ok(Some(code))` once the child has
    /// exited, `Ok(None)` while it is still running or already reaped.
    async fn poll_exit(&self) -> Result<Option<Option<i32>>> {
        let mut guard = self.child.lock().await;
        let Some(child) = guard.as_mut() else {
            return Ok(None);
        };
        match child.try_wait() {
            Ok(Some(status)) => Ok(Some(status.code())),
            Ok(None) => Ok(None),
            Err(source) => Err(SupervisorError::Poll {
                role: self.spec.role,
                source,
            }),
        }
    }

    /// Keep the state current after the child is running. The monitor
    /// stops as soon as the child slot is emptied by `shutdown`.
    fn spawn_monitor(&self) {
        let state = Arc::clone(&self.state);
        let child_slot = Arc::clone(&self.child);
        let role = self.spec.role;
        let _ = tokio::spawn(async move {
            loop {
                tokio::time::sleep(MONITOR_INTERVAL).await;
                let mut guard = child_slot.lock().await;
                let Some(child) = guard.as_mut() else { return };
                match child.try_wait() {
                    Ok(Some(status)) => {
                        warn!(role = %role, ?status, "child exited");
                        *state.lock() = ProcessState::Exited(status.code());
                        let _ = guard.take();
                        return;
                    }
                    Ok(None) => {}
                    Err(err) => {
                        warn!(role = %role, %err, "failed to poll child");
                        return;
                    }
                }
            }
        });
    }
}

/// Forward one output pipe line by line through tracing.
fn forward_output(role: ProcessRole, pipe: impl AsyncRead + Unpin + Send + 'static, is_err: bool) {
    let _ = tokio::spawn(async move {
        let mut lines = BufReader::new(pipe).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if is_err {
                warn!(target: "tollgate::child", role = %role, "{line}");
            } else {
                info!(target: "tollgate::child", role = %role, "{line}");
            }
        }
    });
}
