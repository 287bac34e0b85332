//! Per-connection TLS facts exposed to request handlers.

use std::net::SocketAddr;

use rustls::pki_types::CertificateDer;

/// Inserted into the extensions of every request served by the mTLS listener.
///
/// Its absence tells the authentication gate the request arrived over
/// plaintext, where there is no handshake to inspect.
#[derive(Debug, Clone)]
pub struct TlsConnectInfo {
    pub remote_addr: SocketAddr,
    /// Leaf certificate the client presented, already verified by rustls.
    pub peer_certificate: Option<CertificateDer<'static>>,
}

impl TlsConnectInfo {
    pub fn new(remote_addr: SocketAddr, peer_certificates: Option<&[CertificateDer<'_>]>) -> Self {
        Self {
            remote_addr,
            peer_certificate: peer_certificates
                .and_then(|certs| certs.first())
                .map(|cert| cert.clone().into_owned()),
        }
    }
}
