//! Plain HTTP forwarding to the backend upstream.
//!
//! Request bodies keep their inbound framing: a `Content-Length` body
//! is forwarded sized, anything else streams through chunked. Response
//! bodies always stream. An unreachable upstream becomes a 502 rather
//! than an error bubbling out of the handler.

use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::server::AppState;

/// Headers that describe the connection to the gateway itself and must
/// not be passed through to the other side.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Forward one request to the upstream and stream the response back.
pub async fn forward(state: &AppState, req: Request) -> Response {
    let path_and_query = req
        .uri()
        .path_and_query()
        .map_or("/", |pq| pq.as_str())
        .to_string();
    let target = format!("{}{}", state.upstream_base, path_and_query);

    let (parts, body) = req.into_parts();
    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);
    // reqwest re-derives these from the target and the body it is given
    let _ = headers.remove(header::HOST);
    let declared_len = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    let _ = headers.remove(header::CONTENT_LENGTH);

    // A sized inbound body is forwarded sized so the upstream sees the
    // same framing; bodies without a declared length stream through.
    let body = match declared_len {
        Some(len) => match axum::body::to_bytes(body, len).await {
            Ok(bytes) => reqwest::Body::from(bytes),
            Err(err) => {
                warn!(%err, "failed to read request body");
                return (StatusCode::BAD_REQUEST, "invalid request body".to_string())
                    .into_response();
            }
        },
        None => reqwest::Body::wrap_stream(body.into_data_stream()),
    };

    let outcome = state
        .client
        .request(parts.method, &target)
        .headers(headers)
        .body(body)
        .send()
        .await;

    match outcome {
        Ok(upstream) => {
            let status = upstream.status();
            let mut headers = upstream.headers().clone();
            strip_hop_by_hop(&mut headers);

            let mut builder = Response::builder().status(status);
            if let Some(slot) = builder.headers_mut() {
                *slot = headers;
            }
            builder
                .body(Body::from_stream(upstream.bytes_stream()))
                .unwrap_or_else(|err| bad_gateway(&err.to_string()))
        }
        Err(err) => {
            warn!(%err, %target, "upstream request failed");
            bad_gateway(&err.to_string())
        }
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        let _ = headers.remove(name);
    }
}

fn bad_gateway(detail: &str) -> Response {
    (
        StatusCode::BAD_GATEWAY,
        format!("upstream unreachable: {detail}"),
    )
        .into_response()
}
