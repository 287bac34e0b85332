//! TLS termination for the mTLS listener.
//!
//! - [`TrustBundle`]: certificate material loaded at startup
//! - [`serve_tls`]: accept loop running the handshake and serving the router
//! - [`TlsConnectInfo`]: per-connection facts handed to the authentication gate

pub mod connect_info;
pub mod listener;
pub mod trust;

pub use connect_info::TlsConnectInfo;
pub use listener::serve_tls;
pub use trust::TrustBundle;
