//! PIX payment notifications from the bank's webhook.
//!
//! ```text
//! body bytes → decode_notification() → Vec<PaymentEvent> → ledger
//! ```

pub mod decode;
pub mod sample;
pub mod types;

pub use decode::decode_notification;
pub use sample::sample_notification;
pub use types::{Amount, PaymentEvent, Payer, PixPayer, PixRecord, TaxId};
