//! PixHook server - mTLS-authenticated PIX webhook receiver.
//!
//! Runs two listeners over the same router:
//! - plaintext on `PORT` for development and the web UI
//! - mTLS on `HTTPS_PORT` for the bank's webhook calls
//!
//! If the certificate material cannot be loaded the mTLS listener is skipped
//! and the server keeps running in plaintext only.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::{net::TcpListener, sync::watch, task::JoinHandle};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pixhook::ledger::{LedgerStore, MemoryLedger};
use pixhook::realtime::Notifier;
use pixhook::shutdown::shutdown_signal;
use pixhook::tls::{serve_tls, TrustBundle};
use pixhook::web::{router, AppState, ENDPOINTS};
use pixhook::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("pixhook_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        https_port = config.https_port,
        require_client_cert = config.require_client_cert,
        ledger_retention_days = ?config.ledger_retention_days,
        realtime_buffer = config.realtime_buffer,
        simulate_webhook_enabled = config.simulate_webhook_enabled,
        public_dir = %config.public_dir.display(),
        "config_loaded"
    );

    // Create application state
    let ledger: Arc<dyn LedgerStore> = Arc::new(MemoryLedger::new(config.ledger_retention_days));
    let notifier = Notifier::new(config.realtime_buffer);
    let state = AppState::new(config.clone(), ledger, notifier);

    let app = router(state, &config.public_dir);

    // Both listeners stop when this flips
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let tls_task = match start_tls_listener(&config, app.clone(), shutdown_rx).await {
        Ok(task) => Some(task),
        Err(e) => {
            warn!(error = ?e, "mtls_listener_disabled");
            None
        }
    };

    // Bind plaintext listener
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    log_endpoints("http", addr);
    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("web_server_shutting_down");
    // Err only means the TLS listener is already gone
    let _ = shutdown_tx.send(true);

    if let Some(task) = tls_task {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = ?e, "mtls_listener_failed"),
            Err(e) => error!(error = %e, "mtls_listener_task_panicked"),
        }
    }

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Load the trust bundle, bind `HTTPS_PORT` and spawn the mTLS listener.
async fn start_tls_listener(
    config: &Config,
    app: Router,
    shutdown: watch::Receiver<bool>,
) -> Result<JoinHandle<Result<()>>> {
    let bundle = TrustBundle::load(&config.tls).context("Failed to load certificates")?;
    let server_config = bundle
        .server_config(config.require_client_cert)
        .context("Failed to build TLS configuration")?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.https_port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind mTLS address")?;

    log_endpoints("https", addr);
    info!(address = %addr, "mtls_server_listening");

    Ok(tokio::spawn(serve_tls(listener, server_config, app, shutdown)))
}

fn log_endpoints(scheme: &str, addr: SocketAddr) {
    let endpoints = ENDPOINTS
        .iter()
        .map(|(method, path)| format!("{method} {path}"))
        .collect::<Vec<_>>()
        .join(", ");

    info!(
        scheme = scheme,
        base_url = %format!("{scheme}://localhost:{}", addr.port()),
        endpoints = %endpoints,
        "endpoints_available"
    );
}
