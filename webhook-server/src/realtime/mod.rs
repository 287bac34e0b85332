//! Real-time fan-out of ledger updates to connected viewers.
//!
//! ```text
//! webhook → Notifier::publish() → broadcast channel → socket task → viewer
//!                                                   ↑
//!                        on connect: snapshot of today's entry
//! ```

pub mod notifier;
pub mod socket;

pub use notifier::{DailySnapshot, Notifier, RealtimeEvent};
pub use socket::realtime_socket;
