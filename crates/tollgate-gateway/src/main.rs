//! # tollgate-gateway
//!
//! Gateway binary for the billing dashboard: supervises the backend
//! and frontend children, serves the single public port, and offers
//! maintenance subcommands for invoking work units and tailing
//! realtime notifications.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tollgate_bridge::{Bridge, BridgeConfig};
use tollgate_core::Notification;
use tollgate_proxy::{ProxyConfig, ProxyServer};
use tollgate_realtime::{RealtimeConfig, RealtimeManager, endpoint_from_origin};
use tollgate_settings::GatewaySettings;
use tollgate_supervisor::Supervisor;

/// Telecom billing dashboard gateway.
#[derive(Parser, Debug)]
#[command(name = "tollgate", about = "Telecom billing dashboard gateway")]
struct Cli {
    /// Path to the settings file (defaults to ./tollgate.json).
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start both children and serve the public port.
    Serve,
    /// Run one interpreter work unit and print its JSON result.
    Invoke {
        /// Work unit source text.
        script: String,
        /// Arguments passed after the source text.
        args: Vec<String>,
    },
    /// Tail realtime notifications from a running gateway.
    Watch {
        /// Page origin of the gateway.
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        origin: String,
    },
}

fn load_settings(config: Option<&PathBuf>) -> Result<GatewaySettings> {
    match config {
        Some(path) => tollgate_settings::load_settings_from_path(path)
            .with_context(|| format!("failed to load settings from {}", path.display())),
        None => tollgate_settings::load_settings().context("failed to load settings"),
    }
}

fn bridge_from(settings: &GatewaySettings) -> Bridge {
    Bridge::new(BridgeConfig {
        interpreter: settings.bridge.interpreter.clone(),
        interpreter_args: settings.bridge.interpreter_args.clone(),
        max_concurrency: settings.bridge.max_concurrency,
        timeout: Duration::from_millis(settings.bridge.timeout_ms),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_ref())?;

    match cli.command {
        Command::Serve => serve(settings).await,
        Command::Invoke { script, args } => invoke(&settings, &script, &args).await,
        Command::Watch { origin } => watch(&settings, &origin).await,
    }
}

/// Start the children in order, then serve until interrupted.
async fn serve(settings: GatewaySettings) -> Result<()> {
    let supervisor = Supervisor::from_settings(&settings.supervisor);
    supervisor
        .start()
        .await
        .context("failed to start children")?;

    let cancel = CancellationToken::new();
    let proxy = ProxyServer::new(ProxyConfig::from_settings(
        &settings.server,
        &settings.upstream,
    ));
    let (addr, handle) = match proxy.listen(cancel.clone()).await {
        Ok(listening) => listening,
        Err(err) => {
            supervisor.shutdown().await;
            return Err(err).context("failed to bind the public port");
        }
    };
    info!(%addr, "gateway ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("shutting down");

    cancel.cancel();
    let _ = handle.await;
    supervisor.shutdown().await;
    info!("shutdown complete");
    Ok(())
}

async fn invoke(settings: &GatewaySettings, script: &str, args: &[String]) -> Result<()> {
    let bridge = bridge_from(settings);
    let value = bridge.invoke(script, args).await?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

/// Decode and print notifications until interrupted or the channel is
/// permanently lost.
async fn watch(settings: &GatewaySettings, origin: &str) -> Result<()> {
    let url = endpoint_from_origin(origin, &settings.realtime.path);
    info!(%url, "watching realtime notifications");

    let mut config = RealtimeConfig::new(url);
    config.max_attempts = settings.realtime.max_attempts;
    config.message_ttl = Duration::from_millis(settings.realtime.message_ttl_ms);
    let manager = RealtimeManager::connect(config);
    let mut events = manager.subscribe();
    let mut state_poll = tokio::time::interval(Duration::from_millis(500));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = state_poll.tick() => {
                if manager.is_finished() {
                    warn!("realtime channel lost, giving up");
                    break;
                }
            }
            event = events.recv() => match event {
                Ok(text) => match serde_json::from_str::<Notification>(&text) {
                    Ok(notification) => println!("{notification:?}"),
                    Err(err) => warn!(%err, "dropping malformed notification"),
                },
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "notification stream lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    manager.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn cli_serve_parses() {
        let cli = Cli::parse_from(["tollgate", "serve"]);
        assert!(matches!(cli.command, Command::Serve));
        assert!(cli.config.is_none());
    }

    #[test]
    fn cli_invoke_captures_script_and_args() {
        let cli = Cli::parse_from(["tollgate", "invoke", "print(1)", "a", "b"]);
        match cli.command {
            Command::Invoke { script, args } => {
                assert_eq!(script, "print(1)");
                assert_eq!(args, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected invoke, got {other:?}"),
        }
    }

    #[test]
    fn cli_watch_default_origin() {
        let cli = Cli::parse_from(["tollgate", "watch"]);
        match cli.command {
            Command::Watch { origin } => assert_eq!(origin, "http://127.0.0.1:8080"),
            other => panic!("expected watch, got {other:?}"),
        }
    }

    #[test]
    fn cli_custom_config_path() {
        let cli = Cli::parse_from(["tollgate", "--config", "/tmp/gw.json", "serve"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/gw.json")));
    }

    #[test]
    fn settings_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let settings = load_settings(Some(&path)).unwrap();
        assert_eq!(settings.server.port, 8080);
    }

    #[test]
    fn bridge_uses_configured_interpreter() {
        let mut settings = GatewaySettings::default();
        settings.bridge.interpreter = "python3.12".into();
        // construction alone must respect the settings
        let _ = bridge_from(&settings);
        assert_eq!(settings.bridge.interpreter, "python3.12");
    }
}
