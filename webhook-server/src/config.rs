//! Configuration module for environment variable parsing.
//!
//! Every setting has a default so the plaintext listener can start with no
//! environment at all. Certificate paths default to the `cert/` directory
//! layout the bank's onboarding kit ships with.

use std::env;
use std::path::PathBuf;

use tracing::warn;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the plaintext listener (development, web UI)
    pub port: u16,

    /// Port for the mTLS listener (production ingestion)
    pub https_port: u16,

    /// Certificate file locations for the mTLS listener
    pub tls: TlsPaths,

    /// Hard-reject clients without a valid certificate during the handshake.
    ///
    /// When false the handshake succeeds without a client certificate and the
    /// authentication gate answers 401 instead.
    pub require_client_cert: bool,

    /// Header names injected by a TLS-terminating reverse proxy
    pub proxy_headers: ProxyHeaderNames,

    /// Directory with the static web UI
    pub public_dir: PathBuf,

    /// Number of days kept in the ledger. `None` keeps everything.
    pub ledger_retention_days: Option<u32>,

    /// Capacity of the real-time broadcast buffer per subscriber
    pub realtime_buffer: usize,

    /// Whether `POST /simular-webhook` is served
    pub simulate_webhook_enabled: bool,
}

/// Paths of the certificate artifacts making up the trust bundle.
#[derive(Debug, Clone)]
pub struct TlsPaths {
    pub server_cert: PathBuf,
    pub private_key: PathBuf,
    pub intermediate_cert: PathBuf,
    pub root_cert: PathBuf,
    pub chain: PathBuf,
}

/// Headers a reverse proxy uses to forward its client-certificate verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyHeaderNames {
    /// Client certificate (presence is what matters)
    pub cert: String,
    /// Verification result, `SUCCESS` when the proxy accepted the certificate
    pub verify: String,
    /// Subject Distinguished Name of the client certificate
    pub dn: String,
}

impl Default for ProxyHeaderNames {
    fn default() -> Self {
        Self {
            cert: "x-ssl-client-cert".to_string(),
            verify: "x-ssl-client-verify".to_string(),
            dn: "x-ssl-client-dn".to_string(),
        }
    }
}

impl Default for TlsPaths {
    fn default() -> Self {
        Self {
            server_cert: PathBuf::from("./cert/api_webhook_bb_com_br.crt"),
            private_key: PathBuf::from("./cert/server.key"),
            intermediate_cert: PathBuf::from("./cert/2-GeoTrust_EV_RSA_CA_G2.cer"),
            root_cert: PathBuf::from("./cert/1-DigiCert_Global_Root_G2.cer"),
            chain: PathBuf::from("./cert/bb-webhook-chain.crt"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            https_port: 3443,
            tls: TlsPaths::default(),
            require_client_cert: false,
            proxy_headers: ProxyHeaderNames::default(),
            public_dir: PathBuf::from("public"),
            ledger_retention_days: Some(30),
            realtime_buffer: 64,
            simulate_webhook_enabled: true,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Config::default();
        let tls_defaults = defaults.tls;
        let header_defaults = defaults.proxy_headers;

        Config {
            port: parse_var("PORT", defaults.port),

            https_port: parse_var("HTTPS_PORT", defaults.https_port),

            tls: TlsPaths {
                server_cert: path_var("TLS_CERT_PATH", tls_defaults.server_cert),
                private_key: path_var("TLS_KEY_PATH", tls_defaults.private_key),
                intermediate_cert: path_var(
                    "TLS_INTERMEDIATE_CERT_PATH",
                    tls_defaults.intermediate_cert,
                ),
                root_cert: path_var("TLS_ROOT_CERT_PATH", tls_defaults.root_cert),
                chain: path_var("TLS_CHAIN_PATH", tls_defaults.chain),
            },

            require_client_cert: parse_bool("MTLS_REQUIRE_CLIENT_CERT", defaults.require_client_cert),

            proxy_headers: ProxyHeaderNames {
                cert: header_var("PROXY_CERT_HEADER", header_defaults.cert),
                verify: header_var("PROXY_VERIFY_HEADER", header_defaults.verify),
                dn: header_var("PROXY_DN_HEADER", header_defaults.dn),
            },

            public_dir: path_var("PUBLIC_DIR", defaults.public_dir),

            // 0 disables pruning
            ledger_retention_days: match parse_var(
                "LEDGER_RETENTION_DAYS",
                defaults.ledger_retention_days.unwrap_or(0),
            ) {
                0 => None,
                days => Some(days),
            },

            realtime_buffer: parse_var("REALTIME_BUFFER", defaults.realtime_buffer).max(1),

            simulate_webhook_enabled: parse_bool(
                "SIMULATE_WEBHOOK_ENABLED",
                defaults.simulate_webhook_enabled,
            ),
        }
    }
}

/// Parse a variable with `FromStr`, falling back to the default on absence or garbage.
fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse() {
        Ok(v) => v,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}

/// Parse a boolean flag. Accepts true/false, 1/0, yes/no, on/off.
fn parse_bool(name: &str, default: bool) -> bool {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" => false,
        _ => {
            warn!(env_var = name, value = %raw, "Invalid boolean, using default");
            default
        }
    }
}

fn path_var(name: &str, default: PathBuf) -> PathBuf {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or(default)
}

/// Header names are matched case-insensitively, so they are stored lowercased.
fn header_var(name: &str, default: String) -> String {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
}
