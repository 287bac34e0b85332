//! Authenticated client identity attached to requests by the mTLS gate.

use serde::Serialize;
use sha2::{Digest, Sha256};
use x509_parser::objects::{oid2abbrev, oid_registry};
use x509_parser::prelude::*;

use super::dn::DnAttributes;

/// Where the certificate verdict came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentitySource {
    /// This process terminated TLS and inspected the peer certificate.
    Direct,
    /// A reverse proxy terminated TLS and forwarded its verdict in headers.
    Proxy,
}

/// Identity of a caller that passed client-certificate authentication.
///
/// Lives in the request extensions for the duration of one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientIdentity {
    pub subject: DnAttributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<DnAttributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    /// SHA-256 of the DER certificate, colon-separated uppercase hex.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    pub verified: bool,
    pub source: IdentitySource,
}

impl ClientIdentity {
    /// Identity vouched for by a TLS-terminating proxy.
    pub fn from_proxy(subject: DnAttributes) -> Self {
        Self {
            subject,
            issuer: None,
            serial_number: None,
            fingerprint: None,
            verified: true,
            source: IdentitySource::Proxy,
        }
    }

    /// Identity read from a peer certificate the TLS layer already verified.
    ///
    /// Chain and validity checks happen during the handshake; this only decodes.
    pub fn from_peer_certificate(der: &[u8]) -> Result<Self, CertificateDecodeError> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| CertificateDecodeError(e.to_string()))?;

        Ok(Self {
            subject: name_attributes(cert.subject()),
            issuer: Some(name_attributes(cert.issuer())),
            serial_number: Some(format!("{:X}", cert.serial)),
            fingerprint: Some(sha256_fingerprint(der)),
            verified: true,
            source: IdentitySource::Direct,
        })
    }

    /// Subject Common Name, for logging.
    pub fn common_name(&self) -> &str {
        self.subject.get("CN").map(String::as_str).unwrap_or("Unknown")
    }

    /// Short form echoed back in webhook acknowledgements.
    pub fn summary(&self) -> ClientSummary {
        ClientSummary {
            subject: Some(self.subject.clone()),
            source: self.source.into(),
            verified: Some(self.verified),
        }
    }
}

/// Caller description in webhook responses; also covers unauthenticated callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<DnAttributes>,
    pub source: SummarySource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
}

impl ClientSummary {
    pub fn unauthenticated() -> Self {
        Self {
            subject: None,
            source: SummarySource::Unauthenticated,
            verified: None,
        }
    }

    pub fn for_identity(identity: Option<&ClientIdentity>) -> Self {
        identity
            .map(ClientIdentity::summary)
            .unwrap_or_else(Self::unauthenticated)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SummarySource {
    Direct,
    Proxy,
    Unauthenticated,
}

impl From<IdentitySource> for SummarySource {
    fn from(source: IdentitySource) -> Self {
        match source {
            IdentitySource::Direct => SummarySource::Direct,
            IdentitySource::Proxy => SummarySource::Proxy,
        }
    }
}

/// Attributes of a certificate name, keyed by short name (`CN`, `O`, ...).
///
/// Read from the ASN.1 structure so values containing commas survive intact.
/// Unknown attribute types fall back to their dotted OID; values that are not
/// string types are skipped.
fn name_attributes(name: &X509Name<'_>) -> DnAttributes {
    let registry = oid_registry();
    let mut attributes = DnAttributes::new();

    for attr in name.iter_attributes() {
        let Ok(value) = attr.as_str() else {
            continue;
        };
        let key = oid2abbrev(attr.attr_type(), registry)
            .map(str::to_string)
            .unwrap_or_else(|_| attr.attr_type().to_id_string());
        attributes.insert(key, value.to_string());
    }

    attributes
}

/// The peer presented bytes that are not a decodable X.509 certificate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to decode client certificate: {0}")]
pub struct CertificateDecodeError(pub String);

/// SHA-256 fingerprint formatted like browsers show it (`AB:CD:...`).
pub fn sha256_fingerprint(der: &[u8]) -> String {
    Sha256::digest(der)
        .iter()
        .map(|b| hex::encode_upper([*b]))
        .collect::<Vec<_>>()
        .join(":")
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::dn::parse_dn;

    #[test]
    fn test_from_peer_certificate() {
        let cert = test_certs::self_signed("bb-webhook-client", "Banco do Brasil");

        let identity = ClientIdentity::from_peer_certificate(&cert.der).unwrap();

        assert_eq!(identity.source, IdentitySource::Direct);
        assert!(identity.verified);
        assert_eq!(identity.common_name(), "bb-webhook-client");
        assert_eq!(identity.subject["O"], "Banco do Brasil");
        // Self-signed: issuer equals subject
        assert_eq!(identity.issuer.as_ref(), Some(&identity.subject));
        assert!(identity.serial_number.is_some());
        assert_eq!(identity.fingerprint, Some(sha256_fingerprint(&cert.der)));
    }

    #[test]
    fn test_subject_value_with_comma() {
        let cert = test_certs::self_signed("bb-client", "Banco do Brasil, S.A.");

        let identity = ClientIdentity::from_peer_certificate(&cert.der).unwrap();

        assert_eq!(identity.subject.get("CN").map(String::as_str), Some("bb-client"));
        assert_eq!(
            identity.subject.get("O").map(String::as_str),
            Some("Banco do Brasil, S.A.")
        );
        assert_eq!(identity.subject.len(), 2);
    }

    #[test]
    fn test_from_peer_certificate_garbage() {
        let err = ClientIdentity::from_peer_certificate(b"definitely not DER").unwrap_err();
        assert!(err.to_string().starts_with("failed to decode client certificate"));
    }

    #[test]
    fn test_proxy_identity() {
        let identity = ClientIdentity::from_proxy(parse_dn("CN=proxy-client"));
        assert_eq!(identity.source, IdentitySource::Proxy);
        assert!(identity.issuer.is_none());
        assert_eq!(identity.common_name(), "proxy-client");
    }

    #[test]
    fn test_common_name_unknown() {
        let identity = ClientIdentity::from_proxy(DnAttributes::new());
        assert_eq!(identity.common_name(), "Unknown");
    }

    #[test]
    fn test_summary_serialization() {
        let identity = ClientIdentity::from_proxy(parse_dn("CN=Alice"));
        let json = serde_json::to_value(ClientSummary::for_identity(Some(&identity))).unwrap();
        assert_eq!(json["source"], "proxy");
        assert_eq!(json["verified"], true);
        assert_eq!(json["subject"]["CN"], "Alice");

        let json = serde_json::to_value(ClientSummary::for_identity(None)).unwrap();
        assert_eq!(json, serde_json::json!({ "source": "unauthenticated" }));
    }

    #[test]
    fn test_fingerprint_format() {
        let fingerprint = sha256_fingerprint(b"test certificate data");
        // 32 bytes * 2 hex chars + 31 colons
        assert_eq!(fingerprint.len(), 95);
        assert!(fingerprint
            .chars()
            .all(|c| c == ':' || c.is_ascii_digit() || c.is_ascii_uppercase()));
    }
}
