//! Pooled worker variant of the bridge.
//!
//! Instead of paying interpreter startup on every invocation, a
//! `BridgeWorker` keeps one interpreter process alive and speaks a
//! line-delimited JSON protocol over its stdin/stdout. Each request
//! carries a correlation id so responses can arrive out of order:
//!
//! ```text
//! -> {"id": 1, "script": "...", "args": ["inv-42"]}
//! <- {"id": 1, "result": {...}}
//! <- {"id": 2, "error": "unknown invoice"}
//! ```

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, warn};

use crate::errors::{BridgeError, Result};

/// Pending request waiting for its correlated response.
type PendingTx = oneshot::Sender<Result<Value>>;

#[derive(Serialize)]
struct WorkerRequest<'a> {
    id: u64,
    script: &'a str,
    args: &'a [String],
}

#[derive(Deserialize)]
struct WorkerResponse {
    id: u64,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Internal request message handed to the handler loop.
struct WorkerCommand {
    script: String,
    args: Vec<String>,
    response_tx: PendingTx,
}

/// A long-lived interpreter process multiplexing work units over
/// line-delimited JSON.
pub struct BridgeWorker {
    cmd_tx: mpsc::Sender<WorkerCommand>,
    timeout: Duration,
    _handler: JoinHandle<()>,
}

impl BridgeWorker {
    /// Spawn the worker process and start its handler loop.
    pub fn spawn(program: &str, args: &[String], timeout: Duration) -> Result<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(BridgeError::SpawnFailure)?;

        let stdin = child.stdin.take().ok_or_else(missing_pipe)?;
        let stdout = child.stdout.take().ok_or_else(missing_pipe)?;
        if let Some(stderr) = child.stderr.take() {
            let _ = tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!(target: "tollgate::worker", "{line}");
                }
            });
        }

        let (cmd_tx, cmd_rx) = mpsc::channel::<WorkerCommand>(64);
        let handler = tokio::spawn(worker_handler_loop(child, stdin, stdout, cmd_rx));

        Ok(Self {
            cmd_tx,
            timeout,
            _handler: handler,
        })
    }

    /// Submit one work unit and wait for its correlated response.
    pub async fn invoke(&self, script: &str, args: &[String]) -> Result<Value> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(WorkerCommand {
                script: script.to_string(),
                args: args.to_vec(),
                response_tx: tx,
            })
            .await
            .map_err(|_| BridgeError::Closed)?;

        tokio::time::timeout(self.timeout, rx)
            .await
            .map_err(|_| BridgeError::Timeout {
                limit: self.timeout,
            })?
            .map_err(|_| BridgeError::Closed)?
    }
}

fn missing_pipe() -> BridgeError {
    BridgeError::SpawnFailure(std::io::Error::other("worker pipes not captured"))
}

/// Worker handler loop.
///
/// Receives requests from `BridgeWorker`, writes them as JSON lines to
/// the worker's stdin, and routes response lines back by id. When the
/// worker exits or a pipe breaks, every in-flight request fails with
/// [`BridgeError::Closed`].
async fn worker_handler_loop(
    mut child: Child,
    stdin: ChildStdin,
    stdout: ChildStdout,
    mut cmd_rx: mpsc::Receiver<WorkerCommand>,
) {
    let mut writer = FramedWrite::new(stdin, LinesCodec::new());
    let mut reader = FramedRead::new(stdout, LinesCodec::new());
    let mut pending: HashMap<u64, PendingTx> = HashMap::new();
    let next_id = AtomicU64::new(1);

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break };
                let id = next_id.fetch_add(1, Ordering::Relaxed);
                let request = WorkerRequest {
                    id,
                    script: &cmd.script,
                    args: &cmd.args,
                };
                let Ok(line) = serde_json::to_string(&request) else {
                    let _ = cmd.response_tx.send(Err(BridgeError::Closed));
                    continue;
                };
                let _ = pending.insert(id, cmd.response_tx);
                if writer.send(line).await.is_err() {
                    break;
                }
            }
            line = reader.next() => {
                let Some(Ok(line)) = line else { break };
                let response: WorkerResponse = match serde_json::from_str(&line) {
                    Ok(response) => response,
                    Err(err) => {
                        warn!(%err, "discarding unparseable worker line");
                        continue;
                    }
                };
                let Some(tx) = pending.remove(&response.id) else {
                    debug!(id = response.id, "response for unknown request id");
                    continue;
                };
                let outcome = match response.error {
                    Some(message) => Err(BridgeError::Remote(message)),
                    None => Ok(response.result.unwrap_or(Value::Null)),
                };
                let _ = tx.send(outcome);
            }
        }
    }

    for (_, tx) in pending.drain() {
        let _ = tx.send(Err(BridgeError::Closed));
    }
    let _ = child.kill().await;
}
