//! Distinguished Name parsing.
//!
//! Used for the `X-SSL-Client-DN` header written by a TLS-terminating proxy.
//! Its format is not under our control, so parsing is lenient: anything that
//! does not look like `KEY=VALUE` is dropped. Peer certificates are read from
//! their ASN.1 structure instead.

use std::collections::BTreeMap;

/// Flat attribute lookup built from a DN, e.g. `{"CN": "Alice", "O": "Bank"}`.
pub type DnAttributes = BTreeMap<String, String>;

/// Parse a DN of the form `KEY1=VALUE1,KEY2=VALUE2,...`.
///
/// - Empty input yields an empty map.
/// - Segments without `=`, or with an empty key or value after trimming, are skipped.
/// - A repeated key keeps its last value.
pub fn parse_dn(dn: &str) -> DnAttributes {
    let mut attributes = DnAttributes::new();

    for segment in dn.split(',') {
        let Some((key, value)) = segment.split_once('=') else {
            continue;
        };

        let key = key.trim();
        let value = value.trim();
        if key.is_empty() || value.is_empty() {
            continue;
        }

        attributes.insert(key.to_string(), value.to_string());
    }

    attributes
}

/// Same as [`parse_dn`] for an optional header value.
pub fn parse_optional_dn(dn: Option<&str>) -> DnAttributes {
    dn.map(parse_dn).unwrap_or_default()
}
