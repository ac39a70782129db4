//! Public listener: API forwarding plus static assets.
//!
//! A single port serves everything. Requests under the API prefix are
//! forwarded to the backend upstream, WebSocket upgrades included;
//! everything else is served from the static root, with unknown paths
//! falling back to `index.html` at 200 so client-side routes deep-link
//! correctly. API paths never fall back to static content.

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::Router;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{Request, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use tollgate_settings::{ServerSettings, UpstreamSettings};

use crate::errors::Result;
use crate::{upstream, ws};

/// Proxy configuration.
#[derive(Clone, Debug)]
pub struct ProxyConfig {
    /// Host to bind.
    pub host: String,
    /// Public port; 0 picks a free one.
    pub port: u16,
    /// Path prefix reserved for the upstream.
    pub api_prefix: String,
    /// Static asset root.
    pub static_root: PathBuf,
    /// Upstream host.
    pub upstream_host: String,
    /// Upstream port.
    pub upstream_port: u16,
}

impl ProxyConfig {
    /// Build a proxy configuration from settings.
    pub fn from_settings(server: &ServerSettings, upstream: &UpstreamSettings) -> Self {
        Self {
            host: server.host.clone(),
            port: server.port,
            api_prefix: server.api_prefix.clone(),
            static_root: PathBuf::from(&server.static_root),
            upstream_host: upstream.host.clone(),
            upstream_port: upstream.port,
        }
    }
}

/// Shared state accessible from handlers.
#[derive(Clone)]
pub struct AppState {
    /// Pooled HTTP client for upstream requests.
    pub client: reqwest::Client,
    /// `http://host:port` of the upstream.
    pub upstream_base: String,
    /// `ws://host:port` of the upstream.
    pub upstream_ws_base: String,
}

/// The public-facing gateway server.
pub struct ProxyServer {
    config: ProxyConfig,
}

impl ProxyServer {
    /// Create a server from its configuration.
    pub fn new(config: ProxyConfig) -> Self {
        Self { config }
    }

    /// The proxy configuration.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Build the router with API forwarding and static fallback.
    pub fn router(&self) -> Router {
        let upstream_authority =
            format!("{}:{}", self.config.upstream_host, self.config.upstream_port);
        let state = AppState {
            client: reqwest::Client::new(),
            upstream_base: format!("http://{upstream_authority}"),
            upstream_ws_base: format!("ws://{upstream_authority}"),
        };

        let static_files = ServeDir::new(&self.config.static_root)
            .fallback(ServeFile::new(self.config.static_root.join("index.html")));

        let prefix = self.config.api_prefix.trim_end_matches('/');
        Router::new()
            .route(prefix, any(proxy_handler))
            .route(&format!("{prefix}/"), any(proxy_handler))
            .route(&format!("{prefix}/{{*path}}"), any(proxy_handler))
            .fallback_service(static_files)
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind the public socket and serve until cancelled.
    pub async fn listen(&self, cancel: CancellationToken) -> Result<(SocketAddr, JoinHandle<()>)> {
        let listener =
            tokio::net::TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;
        info!(%addr, "gateway listening");

        let app = self.router();
        let handle = tokio::spawn(async move {
            let shutdown = async move { cancel.cancelled().await };
            if let Err(err) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!(%err, "gateway server error");
            }
        });
        Ok((addr, handle))
    }
}

/// Everything under the API prefix lands here. WebSocket upgrades get
/// a relay to the upstream, plain requests are forwarded.
async fn proxy_handler(
    State(state): State<AppState>,
    upgrade: std::result::Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    req: Request,
) -> Response {
    match upgrade {
        Ok(upgrade) => {
            let path_and_query = req
                .uri()
                .path_and_query()
                .map_or("/", |pq| pq.as_str())
                .to_string();
            let target = format!("{}{}", state.upstream_ws_base, path_and_query);
            upgrade
                .on_upgrade(move |socket| ws::bridge(socket, target))
                .into_response()
        }
        Err(_) => upstream::forward(&state, req).await,
    }
}
