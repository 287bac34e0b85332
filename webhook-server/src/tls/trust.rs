//! Certificate trust store for the mTLS listener.
//!
//! Loaded once at startup. The bank publishes its chain as separate files
//! (leaf, intermediate, root) plus a bundled chain used to verify the
//! certificates its webhook clients present.

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use tracing::info;

use crate::config::TlsPaths;
use crate::error::ConfigError;

/// Certificate material backing the mTLS listener. Immutable once loaded.
pub struct TrustBundle {
    pub server_certificate: CertificateDer<'static>,
    pub intermediate_certificate: CertificateDer<'static>,
    pub root_certificate: CertificateDer<'static>,
    /// CA chain used to verify client certificates
    pub full_chain: Vec<CertificateDer<'static>>,
    private_key: PrivateKeyDer<'static>,
}

impl fmt::Debug for TrustBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustBundle")
            .field("full_chain_len", &self.full_chain.len())
            .finish_non_exhaustive()
    }
}

impl TrustBundle {
    /// Read every artifact from disk. Any missing or unparsable file fails the load.
    pub fn load(paths: &TlsPaths) -> Result<Self, ConfigError> {
        let bundle = Self {
            server_certificate: load_first_certificate(&paths.server_cert)?,
            intermediate_certificate: load_first_certificate(&paths.intermediate_cert)?,
            root_certificate: load_first_certificate(&paths.root_cert)?,
            full_chain: load_certificates(&paths.chain)?,
            private_key: load_private_key(&paths.private_key)?,
        };

        info!(
            server_cert = %paths.server_cert.display(),
            chain = %paths.chain.display(),
            chain_len = bundle.full_chain.len(),
            "trust_bundle_loaded"
        );

        Ok(bundle)
    }

    /// Build the rustls server configuration for the mTLS listener.
    ///
    /// Client certificates are always requested and, when presented, verified
    /// against the chain and root. With `require_client_cert` unset a client
    /// may complete the handshake without one and the gate answers 401.
    pub fn server_config(&self, require_client_cert: bool) -> Result<Arc<ServerConfig>, ConfigError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());

        let mut roots = RootCertStore::empty();
        let (added, ignored) = roots.add_parsable_certificates(
            self.full_chain
                .iter()
                .cloned()
                .chain(std::iter::once(self.root_certificate.clone())),
        );
        if added == 0 {
            return Err(ConfigError::NoClientRoots);
        }

        let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider.clone());
        let verifier = if require_client_cert {
            verifier
        } else {
            verifier.allow_unauthenticated()
        };
        let verifier = verifier
            .build()
            .map_err(|e| ConfigError::Tls(format!("failed to build client verifier: {e}")))?;

        let presented_chain = vec![
            self.server_certificate.clone(),
            self.intermediate_certificate.clone(),
        ];

        let config = ServerConfig::builder_with_provider(provider)
            .with_protocol_versions(&[&rustls::version::TLS13, &rustls::version::TLS12])
            .map_err(|e| ConfigError::Tls(e.to_string()))?
            .with_client_cert_verifier(verifier)
            .with_single_cert(presented_chain, self.private_key.clone_key())
            .map_err(|e| ConfigError::Tls(format!("invalid server certificate or key: {e}")))?;

        info!(
            client_roots = added,
            client_roots_ignored = ignored,
            require_client_cert = require_client_cert,
            "tls_server_config_built"
        );

        Ok(Arc::new(config))
    }
}

fn open(path: &Path) -> Result<BufReader<File>, ConfigError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })
}

/// All certificates in a PEM file.
fn load_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, ConfigError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    if certs.is_empty() {
        return Err(ConfigError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

fn load_first_certificate(path: &Path) -> Result<CertificateDer<'static>, ConfigError> {
    load_certificates(path)?
        .into_iter()
        .next()
        .ok_or_else(|| ConfigError::NoCertificates(path.to_path_buf()))
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, ConfigError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| ConfigError::NoPrivateKey(path.to_path_buf()))
}
