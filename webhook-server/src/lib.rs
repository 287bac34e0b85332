//! PixHook - mTLS-authenticated PIX payment webhook receiver.
//!
//! This library provides the modules behind two binaries:
//! - `pixhook-server`: plaintext and mTLS listeners sharing one router
//! - `pixhook-keepalive`: health prober that keeps a hosted server awake
//!
//! ## Architecture
//!
//! ```text
//! Bank → TLS (proxy or direct) → mTLS gate → /webhook → Ledger → Notifier → /ws viewers
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod keepalive;
pub mod ledger;
pub mod pix;
pub mod realtime;
pub mod shutdown;
pub mod tls;
pub mod web;

// Re-export commonly used types
pub use auth::{ClientIdentity, MtlsGate};
pub use config::Config;
pub use error::{AppError, ConfigError, ValidationError};
pub use ledger::{LedgerStore, MemoryLedger};
pub use pix::{decode_notification, PaymentEvent};
pub use realtime::{Notifier, RealtimeEvent};
pub use web::{router, AppState};
