//! `roster-server` binary.
//!
//! Usage: `roster-server [CONFIG_PATH]`. Without an argument the path comes
//! from `ROSTER_CONFIG_PATH`, then `config.toml` in the working directory.

use roster_server::config::{self, LoggingConfig};
use roster_server::{app, bootstrap, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Returns the config path and where it came from, for the startup log.
fn config_path() -> (String, &'static str) {
    let non_blank = |value: &String| !value.trim().is_empty();

    if let Some(path) = std::env::args().nth(1).filter(non_blank) {
        (path, "argument")
    } else if let Some(path) = std::env::var("ROSTER_CONFIG_PATH").ok().filter(non_blank) {
        (path, "ROSTER_CONFIG_PATH")
    } else {
        (DEFAULT_CONFIG_PATH.to_string(), "default")
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        fmt.json().init();
    } else {
        fmt.init();
    }
}

#[tokio::main]
async fn main() {
    let (path, source) = config_path();

    // A missing file means defaults plus ROSTER_* overrides; a bad one is fatal.
    let config = config::load_config(Some(path.as_str()))
        .unwrap_or_else(|e| panic!("roster config {path} ({source}) is unusable: {e}"));

    init_tracing(&config.logging);
    tracing::info!(%path, source, "configuration loaded");

    let service = bootstrap::build_service(&config)
        .unwrap_or_else(|e| panic!("account service could not start: {e}"));

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let router = app(AppState {
        service: Arc::new(service),
        enable_admin_routes: config.server.enable_admin_routes,
    });

    let listener = TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| panic!("cannot listen for account requests on {addr}: {e}"));
    tracing::info!(%addr, "accepting account requests");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("account server stopped unexpectedly");

    tracing::info!("in-flight requests drained, exiting");
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let interrupt = async {
        tokio::signal::ctrl_c()
            .await
            .expect("cannot install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("cannot install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal = tokio::select! {
        () = interrupt => "SIGINT",
        () = terminate => "SIGTERM",
    };
    tracing::info!(signal, "shutting down, no new account requests accepted");
}
