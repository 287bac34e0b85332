//! In-memory ledger.

use std::collections::BTreeMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use chrono::{Duration, NaiveDate};
use tracing::info;

use super::LedgerStore;
use crate::pix::PaymentEvent;

/// Process-local ledger behind a single lock.
///
/// With a retention window, creating the entry for a new date drops every
/// date that fell out of the window. Without one the ledger grows for the
/// life of the process.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    entries: RwLock<BTreeMap<NaiveDate, Vec<PaymentEvent>>>,
    retention_days: Option<u32>,
}

impl MemoryLedger {
    pub fn new(retention_days: Option<u32>) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            retention_days,
        }
    }

    /// Number of dates currently held.
    pub fn date_count(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }
}

/// Oldest date kept when `date` is the newest. `None` when out of range.
fn retention_cutoff(date: NaiveDate, days: u32) -> Option<NaiveDate> {
    Duration::try_days(i64::from(days.saturating_sub(1)))
        .and_then(|window| date.checked_sub_signed(window))
}

impl LedgerStore for MemoryLedger {
    fn get(&self, date: NaiveDate) -> Result<Vec<PaymentEvent>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| anyhow!("ledger lock poisoned"))?;
        Ok(entries.get(&date).cloned().unwrap_or_default())
    }

    fn append(&self, date: NaiveDate, events: Vec<PaymentEvent>) -> Result<Vec<PaymentEvent>> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| anyhow!("ledger lock poisoned"))?;

        if !entries.contains_key(&date) {
            // A window reaching past the earliest representable date prunes nothing
            if let Some(cutoff) = self.retention_days.and_then(|days| retention_cutoff(date, days)) {
                let before = entries.len();
                let kept = entries.split_off(&cutoff);
                *entries = kept;
                if entries.len() < before {
                    info!(
                        cutoff = %cutoff,
                        pruned_dates = before - entries.len(),
                        "ledger_dates_pruned"
                    );
                }
            }
        }

        let entry = entries.entry(date).or_default();
        entry.extend(events);
        Ok(entry.clone())
    }
}
