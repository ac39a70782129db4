//! Transparent WebSocket passthrough.
//!
//! Once a client upgrade is accepted, the gateway opens its own
//! connection to the upstream and relays frames in both directions
//! without inspecting them. Either side closing tears down the pair.

use axum::extract::ws::{CloseFrame as AxCloseFrame, Message as AxMessage, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as TMessage;
use tokio_tungstenite::tungstenite::protocol::CloseFrame as TCloseFrame;
use tracing::{debug, warn};

/// Going away / internal error close code sent when the upstream leg
/// cannot be established.
const CLOSE_UPSTREAM_GONE: u16 = 1011;

/// Relay frames between an accepted client socket and the upstream.
pub async fn bridge(mut client: WebSocket, target: String) {
    let upstream = match connect_async(&target).await {
        Ok((ws, _)) => ws,
        Err(err) => {
            warn!(%err, %target, "upstream websocket connect failed");
            let _ = client
                .send(AxMessage::Close(Some(AxCloseFrame {
                    code: CLOSE_UPSTREAM_GONE,
                    reason: "upstream unreachable".into(),
                })))
                .await;
            return;
        }
    };

    let (mut client_tx, mut client_rx) = client.split();
    let (mut upstream_tx, mut upstream_rx) = upstream.split();

    loop {
        tokio::select! {
            msg = client_rx.next() => match msg {
                Some(Ok(msg)) => {
                    if upstream_tx.send(to_tungstenite(msg)).await.is_err() {
                        break;
                    }
                }
                _ => {
                    let _ = upstream_tx.send(TMessage::Close(None)).await;
                    break;
                }
            },
            msg = upstream_rx.next() => match msg {
                Some(Ok(msg)) => {
                    let Some(msg) = to_axum(msg) else { continue };
                    if client_tx.send(msg).await.is_err() {
                        break;
                    }
                }
                _ => {
                    let _ = client_tx.send(AxMessage::Close(None)).await;
                    break;
                }
            },
        }
    }
    debug!(%target, "websocket bridge closed");
}

fn to_tungstenite(msg: AxMessage) -> TMessage {
    match msg {
        AxMessage::Text(text) => TMessage::Text(text.as_str().into()),
        AxMessage::Binary(data) => TMessage::Binary(data),
        AxMessage::Ping(data) => TMessage::Ping(data),
        AxMessage::Pong(data) => TMessage::Pong(data),
        AxMessage::Close(frame) => TMessage::Close(frame.map(|f| TCloseFrame {
            code: f.code.into(),
            reason: f.reason.as_str().to_owned().into(),
        })),
    }
}

fn to_axum(msg: TMessage) -> Option<AxMessage> {
    match msg {
        TMessage::Text(text) => Some(AxMessage::Text(text.as_str().into())),
        TMessage::Binary(data) => Some(AxMessage::Binary(data)),
        TMessage::Ping(data) => Some(AxMessage::Ping(data)),
        TMessage::Pong(data) => Some(AxMessage::Pong(data)),
        TMessage::Close(frame) => Some(AxMessage::Close(frame.map(|f| AxCloseFrame {
            code: f.code.into(),
            reason: f.reason.as_str().into(),
        }))),
        // raw frames never surface from a configured client
        TMessage::Frame(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_frames_convert_both_ways() {
        let out = to_tungstenite(AxMessage::Text("hello".into()));
        assert!(matches!(&out, TMessage::Text(t) if t.as_str() == "hello"));
        let back = to_axum(out).unwrap();
        assert!(matches!(&back, AxMessage::Text(t) if t.as_str() == "hello"));
    }

    #[test]
    fn close_frame_preserves_code_and_reason() {
        let out = to_tungstenite(AxMessage::Close(Some(AxCloseFrame {
            code: 1001,
            reason: "going away".into(),
        })));
        let TMessage::Close(Some(frame)) = out else {
            panic!("expected close frame");
        };
        assert_eq!(u16::from(frame.code), 1001);
        assert_eq!(frame.reason.as_str(), "going away");
    }

    #[test]
    fn control_frames_convert() {
        assert!(to_axum(TMessage::Ping(vec![1].into())).is_some());
        assert!(to_axum(TMessage::Pong(vec![2].into())).is_some());
    }
}
