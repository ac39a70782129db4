//! WebSocket endpoint derivation.

/// Derive the WebSocket URL for `path` from an HTTP page origin.
///
/// `http://` origins map to `ws://`, `https://` to `wss://`; anything
/// already carrying a `ws` scheme passes through. A bare `host:port`
/// is treated as plain HTTP.
pub fn endpoint_from_origin(origin: &str, path: &str) -> String {
    let origin = origin.trim_end_matches('/');
    let base = if let Some(rest) = origin.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = origin.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if origin.starts_with("ws://") || origin.starts_with("wss://") {
        origin.to_string()
    } else {
        format!("ws://{origin}")
    };
    format!("{base}{path}")
}
