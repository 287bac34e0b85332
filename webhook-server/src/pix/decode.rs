//! Strict decoding of webhook bodies.
//!
//! The batch is all-or-nothing: the first element that fails rejects the
//! whole notification, so a partially valid batch never reaches the ledger.

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use super::types::{PaymentEvent, PixRecord};
use crate::error::ValidationError;

/// Decode a `{ "pix": [...] }` body into payment events.
pub fn decode_notification(body: &[u8]) -> Result<Vec<PaymentEvent>, ValidationError> {
    let envelope: Value =
        serde_json::from_slice(body).map_err(|e| ValidationError::InvalidJson(e.to_string()))?;

    let records = envelope
        .get("pix")
        .and_then(Value::as_array)
        .ok_or(ValidationError::MissingPixArray)?;

    let events = records
        .iter()
        .enumerate()
        .map(|(index, raw)| decode_record(index, raw))
        .collect::<Result<Vec<_>, _>>()?;

    info!(record_count = events.len(), "pix_notification_decoded");

    Ok(events)
}

fn decode_record(index: usize, raw: &Value) -> Result<PaymentEvent, ValidationError> {
    PixRecord::deserialize(raw)
        .map_err(|e| e.to_string())
        .and_then(PixRecord::into_event)
        .map_err(|reason| {
            warn!(index = index, reason = %reason, "pix_record_rejected");
            ValidationError::InvalidRecord { index, reason }
        })
}
