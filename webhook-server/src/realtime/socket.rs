//! WebSocket endpoint for live viewers.

use std::sync::atomic::{AtomicU64, Ordering};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use super::notifier::{DailySnapshot, RealtimeEvent};
use crate::ledger::{processing_date, LedgerStore};
use crate::web::AppState;

static NEXT_VIEWER_ID: AtomicU64 = AtomicU64::new(1);

/// `GET /ws`: upgrade and stream ledger updates.
pub async fn realtime_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_viewer(socket, state))
}

async fn handle_viewer(socket: WebSocket, state: AppState) {
    let viewer_id = NEXT_VIEWER_ID.fetch_add(1, Ordering::Relaxed);

    // Subscribe before reading the snapshot so nothing published in between is lost
    let mut updates = state.notifier.subscribe();
    let (mut sender, mut receiver) = socket.split();

    info!(viewer_id = viewer_id, "realtime_viewer_connected");

    let date = processing_date();
    let pagamentos = match state.ledger.get(date) {
        Ok(events) => events,
        Err(e) => {
            error!(viewer_id = viewer_id, error = ?e, "realtime_snapshot_failed");
            return;
        }
    };

    let snapshot = RealtimeEvent::CurrentPayments(DailySnapshot {
        data: date,
        pagamentos,
    });
    if send_event(&mut sender, &snapshot).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(event) => {
                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(viewer_id = viewer_id, skipped = skipped, "realtime_viewer_lagged");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // Viewers only listen
                Some(Ok(_)) => {}
            },
        }
    }

    info!(viewer_id = viewer_id, "realtime_viewer_disconnected");
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &RealtimeEvent,
) -> Result<(), ()> {
    let text = serde_json::to_string(event).map_err(|e| {
        error!(error = %e, "realtime_event_serialize_failed");
    })?;

    sender.send(Message::Text(text)).await.map_err(|e| {
        warn!(error = %e, "realtime_send_failed");
    })
}
