//! Realtime connection manager.
//!
//! Owns a single WebSocket client connection to the gateway's realtime
//! endpoint and keeps it alive through a reconnect loop with
//! exponential backoff. At most one transport exists at a time; state
//! transitions are observable through [`RealtimeManager::state`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backoff::reconnect_delay;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Observable lifecycle of the realtime connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport, and none being established.
    Disconnected,
    /// First connection attempt in flight.
    Connecting,
    /// Transport open and healthy.
    Connected,
    /// Waiting out a backoff delay before trying again.
    Reconnecting,
}

/// Realtime connection configuration.
#[derive(Clone, Debug)]
pub struct RealtimeConfig {
    /// Full WebSocket URL of the realtime endpoint.
    pub url: String,
    /// Reconnection attempt ceiling. Once consecutive failures reach
    /// this count the manager settles in `Disconnected`.
    pub max_attempts: u32,
    /// How long a received message stays readable in the last-message
    /// slot.
    pub message_ttl: Duration,
}

impl RealtimeConfig {
    /// Configuration with default ceiling and message TTL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_attempts: 5,
            message_ttl: Duration::from_secs(1),
        }
    }
}

struct Inner {
    state: parking_lot::Mutex<ConnectionState>,
    attempts: AtomicU32,
    last_message: parking_lot::Mutex<Option<String>>,
    message_generation: AtomicU64,
    out_tx: parking_lot::Mutex<Option<mpsc::Sender<String>>>,
    events: broadcast::Sender<String>,
}

impl Inner {
    fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
    }
}

/// Handle to the realtime connection driver.
///
/// Dropping the handle does not tear the connection down; call
/// [`RealtimeManager::shutdown`] for a clean close.
pub struct RealtimeManager {
    inner: Arc<Inner>,
    cancel: CancellationToken,
    driver: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl RealtimeManager {
    /// Start the connection driver.
    pub fn connect(config: RealtimeConfig) -> Self {
        let (events, _) = broadcast::channel(256);
        let inner = Arc::new(Inner {
            state: parking_lot::Mutex::new(ConnectionState::Disconnected),
            attempts: AtomicU32::new(0),
            last_message: parking_lot::Mutex::new(None),
            message_generation: AtomicU64::new(0),
            out_tx: parking_lot::Mutex::new(None),
            events,
        });
        let cancel = CancellationToken::new();
        let driver = tokio::spawn(driver_loop(
            config,
            Arc::clone(&inner),
            cancel.clone(),
        ));
        Self {
            inner,
            cancel,
            driver: parking_lot::Mutex::new(Some(driver)),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock()
    }

    /// Whether a transport is currently open.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Consecutive failed attempts since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    /// Whether the driver has stopped for good, either through
    /// [`RealtimeManager::shutdown`] or by exhausting its reconnect
    /// ceiling. A finished driver never reconnects.
    pub fn is_finished(&self) -> bool {
        self.driver
            .lock()
            .as_ref()
            .is_none_or(JoinHandle::is_finished)
    }

    /// The most recently received message, if it arrived within the
    /// configured TTL.
    pub fn last_message(&self) -> Option<String> {
        self.inner.last_message.lock().clone()
    }

    /// Subscribe to every message received from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.inner.events.subscribe()
    }

    /// Send a text message over the transport. A no-op while no
    /// transport is open.
    pub fn send(&self, text: impl Into<String>) {
        let guard = self.inner.out_tx.lock();
        match guard.as_ref() {
            Some(tx) => {
                if tx.try_send(text.into()).is_err() {
                    warn!("outbound realtime queue full, dropping message");
                }
            }
            None => warn!("realtime channel not open, dropping outbound message"),
        }
    }

    /// Close the transport and stop the driver.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self.driver.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

/// Connection driver loop.
///
/// One iteration per connection attempt. A successful open resets the
/// attempt counter; each failure doubles the delay until the ceiling
/// is reached, at which point the driver settles in `Disconnected`.
async fn driver_loop(config: RealtimeConfig, inner: Arc<Inner>, cancel: CancellationToken) {
    loop {
        inner.set_state(ConnectionState::Connecting);
        let connection = tokio::select! {
            _ = cancel.cancelled() => {
                inner.set_state(ConnectionState::Disconnected);
                return;
            }
            result = connect_async(&config.url) => result,
        };

        match connection {
            Ok((ws, _)) => {
                info!(url = %config.url, "realtime channel open");
                inner.attempts.store(0, Ordering::SeqCst);
                let (out_tx, out_rx) = mpsc::channel::<String>(64);
                *inner.out_tx.lock() = Some(out_tx);
                inner.set_state(ConnectionState::Connected);

                let cancelled =
                    run_connected(ws, &inner, &cancel, out_rx, config.message_ttl).await;

                *inner.out_tx.lock() = None;
                if cancelled {
                    inner.set_state(ConnectionState::Disconnected);
                    return;
                }
                warn!(url = %config.url, "realtime channel closed");
            }
            Err(err) => {
                debug!(%err, url = %config.url, "realtime connect failed");
            }
        }

        let attempt = inner.attempts.load(Ordering::SeqCst);
        if attempt >= config.max_attempts {
            warn!(attempts = attempt, "reconnect ceiling reached, giving up");
            inner.set_state(ConnectionState::Disconnected);
            return;
        }
        let delay = reconnect_delay(attempt);
        let _ = inner.attempts.fetch_add(1, Ordering::SeqCst);
        inner.set_state(ConnectionState::Reconnecting);
        debug!(?delay, attempt, "waiting before reconnect");
        tokio::select! {
            _ = cancel.cancelled() => {
                inner.set_state(ConnectionState::Disconnected);
                return;
            }
            () = tokio::time::sleep(delay) => {}
        }
    }
}

/// Pump one open transport until it closes or the driver is cancelled.
/// Returns `true` when the exit was a cancellation.
async fn run_connected(
    ws: WsStream,
    inner: &Arc<Inner>,
    cancel: &CancellationToken,
    mut out_rx: mpsc::Receiver<String>,
    ttl: Duration,
) -> bool {
    let (mut ws_tx, mut ws_rx) = ws.split();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = ws_tx.send(Message::Close(None)).await;
                return true;
            }
            outbound = out_rx.recv() => {
                let Some(text) = outbound else { return false };
                if ws_tx.send(Message::Text(text.into())).await.is_err() {
                    return false;
                }
            }
            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let text = text.to_string();
                        store_message(inner, &text, ttl);
                        let _ = inner.events.send(text);
                    }
                    Some(Ok(Message::Close(_))) | None => return false,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(%err, "realtime read error");
                        return false;
                    }
                }
            }
        }
    }
}

/// Store a message in the last-message slot and schedule its expiry.
/// A newer message supersedes the pending expiry of an older one.
fn store_message(inner: &Arc<Inner>, text: &str, ttl: Duration) {
    let generation = inner.message_generation.fetch_add(1, Ordering::SeqCst) + 1;
    *inner.last_message.lock() = Some(text.to_string());
    let inner = Arc::clone(inner);
    let _ = tokio::spawn(async move {
        tokio::time::sleep(ttl).await;
        if inner.message_generation.load(Ordering::SeqCst) == generation {
            *inner.last_message.lock() = None;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..400 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test(start_paused = true)]
    async fn receives_and_expires_last_message() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(Message::Text(r#"{"type":"alert"}"#.into()))
                .await
                .unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let manager = RealtimeManager::connect(RealtimeConfig::new(format!("ws://{addr}")));
        let mut events = manager.subscribe();
        let received = events.recv().await.unwrap();
        assert_eq!(received, r#"{"type":"alert"}"#);
        assert_eq!(manager.last_message().as_deref(), Some(r#"{"type":"alert"}"#));
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(manager.attempts(), 0);

        // slot clears once the TTL elapses
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(manager.last_message().is_none());

        manager.shutdown().await;
        server.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_with_backoff_and_resets_attempts() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            // first connection is dropped immediately, second is held
            let (stream, _) = listener.accept().await.unwrap();
            let ws = accept_async(stream).await.unwrap();
            drop(ws);
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let manager = RealtimeManager::connect(RealtimeConfig::new(format!("ws://{addr}")));
        wait_until(|| manager.attempts() == 1).await;
        wait_until(|| manager.is_connected() && manager.attempts() == 0).await;

        manager.shutdown().await;
        server.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn consecutive_failures_after_an_open_double_the_delay() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            // one successful open, then the port goes dark
            let (stream, _) = listener.accept().await.unwrap();
            let ws = accept_async(stream).await.unwrap();
            drop(ws);
            drop(listener);
        });

        let manager = RealtimeManager::connect(RealtimeConfig::new(format!("ws://{addr}")));
        // close after the open costs 1s, the refused reconnect costs 2s
        wait_until(|| manager.attempts() == 2).await;
        assert_eq!(reconnect_delay(2), Duration::from_secs(4));

        manager.shutdown().await;
        server.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_reconnect_ceiling() {
        // bind then drop so nothing listens on the port
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut config = RealtimeConfig::new(format!("ws://{addr}"));
        config.max_attempts = 3;
        let manager = RealtimeManager::connect(config);

        wait_until(|| manager.state() == ConnectionState::Disconnected).await;
        assert_eq!(manager.attempts(), 3);
        manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn zero_ceiling_finishes_after_one_failed_connect() {
        // bind then drop so nothing listens on the port
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut config = RealtimeConfig::new(format!("ws://{addr}"));
        config.max_attempts = 0;
        let manager = RealtimeManager::connect(config);

        // the driver must terminate even though no attempt was counted
        wait_until(|| manager.is_finished()).await;
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(manager.attempts(), 0);
        manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn send_while_disconnected_is_a_noop() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut config = RealtimeConfig::new(format!("ws://{addr}"));
        config.max_attempts = 0;
        let manager = RealtimeManager::connect(config);

        manager.send("ignored");
        wait_until(|| manager.state() == ConnectionState::Disconnected).await;
        manager.send("also ignored");
        manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn send_reaches_the_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                let _ = tx.send(text.to_string());
            }
        });

        let manager = RealtimeManager::connect(RealtimeConfig::new(format!("ws://{addr}")));
        wait_until(|| manager.is_connected()).await;
        manager.send("subscribe:executions");

        assert_eq!(rx.await.unwrap(), "subscribe:executions");
        manager.shutdown().await;
        server.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_closes_the_transport() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
            let _ = tx.send(());
        });

        let manager = RealtimeManager::connect(RealtimeConfig::new(format!("ws://{addr}")));
        wait_until(|| manager.is_connected()).await;
        manager.shutdown().await;

        assert_eq!(manager.state(), ConnectionState::Disconnected);
        rx.await.unwrap();
        server.abort();
    }
}
