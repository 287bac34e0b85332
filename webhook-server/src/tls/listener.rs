//! mTLS listener serving the shared router.
//!
//! `axum::serve` has no hook for per-connection TLS state, so connections are
//! accepted here, the handshake is run with tokio-rustls, and each request is
//! tagged with the connection's [`TlsConnectInfo`] before reaching the router.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{extract::Request, Router};
use hyper::body::Incoming;
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto,
};
use rustls::ServerConfig;
use tokio::{net::TcpListener, sync::watch};
use tokio_rustls::TlsAcceptor;
use tower::Service;
use tracing::{debug, info, warn};

use super::TlsConnectInfo;

/// Handshakes that take longer than this are dropped.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause after an accept error that is not tied to a single connection.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// How long to wait before accepting again after `error`.
///
/// Errors about one peer (reset, aborted, refused) are retried at once.
/// Anything else, such as running out of file descriptors, repeats on every
/// call until resources free up, so the loop backs off.
fn accept_backoff(error: &io::Error) -> Option<Duration> {
    match error.kind() {
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset => None,
        _ => Some(ACCEPT_ERROR_BACKOFF),
    }
}

/// Accept TLS connections until `shutdown` flips to true.
///
/// Handshake failures (including rejected client certificates when the
/// handshake requires one) are logged and the socket dropped; there is no
/// HTTP exchange to answer on yet.
pub async fn serve_tls(
    listener: TcpListener,
    config: Arc<ServerConfig>,
    app: Router,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let acceptor = TlsAcceptor::from(config);

    loop {
        let (stream, remote_addr) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "tls_accept_failed");
                    if let Some(delay) = accept_backoff(&e) {
                        tokio::time::sleep(delay).await;
                    }
                    continue;
                }
            },
            _ = shutdown.changed() => {
                info!("tls_listener_stopping");
                break;
            }
        };

        let acceptor = acceptor.clone();
        let app = app.clone();

        tokio::spawn(async move {
            let tls_stream =
                match tokio::time::timeout(HANDSHAKE_TIMEOUT, acceptor.accept(stream)).await {
                    Ok(Ok(tls_stream)) => tls_stream,
                    Ok(Err(e)) => {
                        warn!(remote_addr = %remote_addr, error = %e, "tls_handshake_failed");
                        return;
                    }
                    Err(_) => {
                        warn!(remote_addr = %remote_addr, "tls_handshake_timeout");
                        return;
                    }
                };

            let info = TlsConnectInfo::new(remote_addr, tls_stream.get_ref().1.peer_certificates());
            debug!(
                remote_addr = %remote_addr,
                has_client_cert = info.peer_certificate.is_some(),
                "tls_connection_established"
            );

            let service = hyper::service::service_fn(move |mut request: Request<Incoming>| {
                request.extensions_mut().insert(info.clone());
                let mut router = app.clone();
                router.call(request)
            });

            if let Err(e) = auto::Builder::new(TokioExecutor::new())
                .serve_connection_with_upgrades(TokioIo::new(tls_stream), service)
                .await
            {
                debug!(remote_addr = %remote_addr, error = %e, "tls_connection_error");
            }
        });
    }

    Ok(())
}
