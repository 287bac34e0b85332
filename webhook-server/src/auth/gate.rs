//! mTLS authentication gate.
//!
//! Runs once per request before any handler. The service can sit behind a
//! TLS-terminating reverse proxy that forwards its verdict in headers, or
//! terminate TLS itself; which deployment applies is decided per request
//! from the evidence present.
//!
//! Forwarded headers are only trustworthy if the proxy overwrites any copy a
//! client sends. That is a deployment requirement, not something checked here.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use rustls::pki_types::CertificateDer;
use tracing::{info, warn};

use super::dn::parse_optional_dn;
use super::identity::{CertificateDecodeError, ClientIdentity};
use crate::config::ProxyHeaderNames;
use crate::error::AppError;
use crate::tls::TlsConnectInfo;

/// Value of the verification header when the proxy accepted the certificate.
pub const PROXY_VERIFY_SUCCESS: &str = "SUCCESS";

/// What the request carries that could prove the caller's identity.
#[derive(Debug, Clone, PartialEq)]
pub enum Evidence<'a> {
    /// Verdict forwarded by a TLS-terminating proxy.
    ProxyHeaders { verify: &'a str, dn: Option<&'a str> },
    /// This process terminated TLS; the leaf certificate if one was presented.
    DirectPeerCert(Option<&'a CertificateDer<'static>>),
    /// Plaintext request without proxy headers.
    None,
}

impl<'a> Evidence<'a> {
    /// Pick the evidence path for a request. Proxy headers take precedence.
    pub fn collect(
        headers: &'a HeaderMap,
        tls: Option<&'a TlsConnectInfo>,
        names: &ProxyHeaderNames,
    ) -> Self {
        let cert = header_value(headers, &names.cert);
        let verify = header_value(headers, &names.verify);

        if let (Some(_), Some(verify)) = (cert, verify) {
            return Evidence::ProxyHeaders {
                verify,
                dn: header_value(headers, &names.dn),
            };
        }

        match tls {
            Some(info) => Evidence::DirectPeerCert(info.peer_certificate.as_ref()),
            None => Evidence::None,
        }
    }
}

/// Non-empty header value as text.
fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// Result of evaluating the evidence.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Authenticated(ClientIdentity),
    Rejected(Rejection),
    /// No evidence at all; the request continues without an identity.
    Unauthenticated,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("proxy reported client certificate verification result {verify:?}")]
    ProxyVerificationFailed { verify: String },

    #[error("client certificate not provided")]
    CertificateMissing,

    #[error(transparent)]
    CertificateInvalid(#[from] CertificateDecodeError),
}

impl From<Rejection> for AppError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::ProxyVerificationFailed { .. } => AppError::unauthorized(
                "Client certificate missing or invalid",
                "Access denied - mTLS authentication required",
            ),
            Rejection::CertificateMissing => AppError::unauthorized(
                "Client certificate not provided",
                "Access denied - mTLS authentication required",
            ),
            Rejection::CertificateInvalid(e) => {
                AppError::unauthorized("Client certificate invalid", e.to_string())
            }
        }
    }
}

/// Decide the outcome for a piece of evidence.
pub fn authenticate(evidence: Evidence<'_>) -> Outcome {
    match evidence {
        Evidence::ProxyHeaders { verify, dn } => {
            if verify != PROXY_VERIFY_SUCCESS {
                return Outcome::Rejected(Rejection::ProxyVerificationFailed {
                    verify: verify.to_string(),
                });
            }
            Outcome::Authenticated(ClientIdentity::from_proxy(parse_optional_dn(dn)))
        }
        Evidence::DirectPeerCert(None) => Outcome::Rejected(Rejection::CertificateMissing),
        Evidence::DirectPeerCert(Some(cert)) => {
            match ClientIdentity::from_peer_certificate(cert.as_ref()) {
                Ok(identity) => Outcome::Authenticated(identity),
                Err(e) => Outcome::Rejected(e.into()),
            }
        }
        Evidence::None => Outcome::Unauthenticated,
    }
}

/// State for [`mtls_gate`].
#[derive(Debug, Clone)]
pub struct MtlsGate {
    pub headers: ProxyHeaderNames,
}

impl MtlsGate {
    pub fn new(headers: ProxyHeaderNames) -> Arc<Self> {
        Arc::new(Self { headers })
    }
}

/// Axum middleware attaching a [`ClientIdentity`] or answering 401.
///
/// Handlers that need an authenticated caller must look for the identity in
/// the request extensions: plaintext requests pass through without one.
pub async fn mtls_gate(
    State(gate): State<Arc<MtlsGate>>,
    mut request: Request,
    next: Next,
) -> Response {
    let outcome = {
        let evidence = Evidence::collect(
            request.headers(),
            request.extensions().get::<TlsConnectInfo>(),
            &gate.headers,
        );
        authenticate(evidence)
    };

    match outcome {
        Outcome::Authenticated(identity) => {
            info!(
                client_cn = %identity.common_name(),
                source = ?identity.source,
                path = %request.uri().path(),
                "mtls_client_authenticated"
            );
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Outcome::Rejected(rejection) => {
            warn!(
                reason = %rejection,
                path = %request.uri().path(),
                remote_addr = ?request.extensions().get::<TlsConnectInfo>().map(|i| i.remote_addr),
                "mtls_client_rejected"
            );
            AppError::from(rejection).into_response()
        }
        Outcome::Unauthenticated => next.run(request).await,
    }
}
