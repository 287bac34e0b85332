//! Broadcast of ledger updates.

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::pix::PaymentEvent;

/// All events of one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySnapshot {
    pub data: NaiveDate,
    pub pagamentos: Vec<PaymentEvent>,
}

/// Message pushed to viewers, serialized as `{"event": ..., "payload": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload")]
pub enum RealtimeEvent {
    /// New payments arrived; carries the full entry for the date.
    #[serde(rename = "novoPagamento")]
    NewPayment(DailySnapshot),
    /// Sent once to a viewer right after it connects.
    #[serde(rename = "pagamentosAtuais")]
    CurrentPayments(DailySnapshot),
}

/// Fire-and-forget publisher.
///
/// The channel is bounded: a viewer that falls more than `capacity` messages
/// behind skips ahead. Every message carries the whole day, so the next one it
/// does receive brings it back in sync.
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: broadcast::Sender<RealtimeEvent>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Broadcast the updated entry for `date` to every connected viewer.
    pub fn publish(&self, date: NaiveDate, events: Vec<PaymentEvent>) {
        let event = RealtimeEvent::NewPayment(DailySnapshot {
            data: date,
            pagamentos: events,
        });

        // Err only means nobody is listening
        match self.sender.send(event) {
            Ok(receivers) => debug!(receivers = receivers, "realtime_broadcast_sent"),
            Err(_) => debug!("realtime_broadcast_no_subscribers"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
