//! Per-date ledger of received payments.
//!
//! Handlers only see the [`LedgerStore`] trait so the in-memory store can be
//! swapped for a persistent or shared backend.

pub mod memory;

use anyhow::Result;
use chrono::{NaiveDate, Utc};

use crate::pix::PaymentEvent;

pub use memory::MemoryLedger;

/// Storage for payment events keyed by processing date.
pub trait LedgerStore: Send + Sync {
    /// Events stored under `date` in arrival order. Unknown dates are empty.
    fn get(&self, date: NaiveDate) -> Result<Vec<PaymentEvent>>;

    /// Append `events` under `date` and return the whole updated entry.
    ///
    /// The read of the updated entry is part of the same atomic step, so two
    /// concurrent appends never observe a snapshot missing their own events.
    fn append(&self, date: NaiveDate, events: Vec<PaymentEvent>) -> Result<Vec<PaymentEvent>>;
}

/// Date key for events received now. Always the server's UTC date, never
/// the payment's own timestamp.
pub fn processing_date() -> NaiveDate {
    Utc::now().date_naive()
}
