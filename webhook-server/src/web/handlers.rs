//! HTTP endpoint handlers.
//!
//! The mTLS gate has already run by the time any of these is called; handlers
//! only read the [`ClientIdentity`] it may have left in the request extensions.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{NaiveDate, SecondsFormat, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::auth::{ClientIdentity, ClientSummary};
use crate::error::{AppError, ValidationError};
use crate::ledger::{processing_date, LedgerStore};
use crate::pix::{decode_notification, sample_notification, Amount, PaymentEvent};
use crate::realtime::Notifier;
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub ledger: Arc<dyn LedgerStore>,
    pub notifier: Notifier,
    pub started_at: Instant,
    /// Held across append and publish so broadcasts leave in commit order
    ingest_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(config: Config, ledger: Arc<dyn LedgerStore>, notifier: Notifier) -> Self {
        Self {
            config: Arc::new(config),
            ledger,
            notifier,
            started_at: Instant::now(),
            ingest_lock: Arc::new(Mutex::new(())),
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    /// Seconds since the server started
    pub uptime: f64,
    pub memory: MemoryUsage,
}

/// Process memory in bytes. Fields are absent where the platform does not
/// expose them.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rss: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_size: Option<u64>,
}

impl MemoryUsage {
    /// Read from `/proc/self/status`.
    pub fn current() -> Self {
        std::fs::read_to_string("/proc/self/status")
            .map(|status| Self::from_proc_status(&status))
            .unwrap_or_default()
    }

    fn from_proc_status(status: &str) -> Self {
        // Lines look like "VmRSS:     12345 kB"
        let field = |name: &str| {
            status
                .lines()
                .find_map(|line| line.strip_prefix(name))
                .and_then(|rest| rest.trim().trim_end_matches("kB").trim().parse::<u64>().ok())
                .map(|kb| kb * 1024)
        };

        Self {
            rss: field("VmRSS:"),
            virtual_size: field("VmSize:"),
        }
    }
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        uptime: state.started_at.elapsed().as_secs_f64(),
        memory: MemoryUsage::current(),
    })
}

// =============================================================================
// PIX Webhook
// =============================================================================

/// Acknowledgement for an accepted notification.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub message: String,
    /// Processing date the events were stored under
    pub data: NaiveDate,
    pub client: ClientSummary,
}

/// `POST /webhook`: ingest a PIX notification.
///
/// The body is decoded as a whole before anything is stored, so a malformed
/// element leaves the ledger untouched.
pub async fn pix_webhook(
    State(state): State<AppState>,
    identity: Option<Extension<ClientIdentity>>,
    body: Bytes,
) -> Result<Json<WebhookResponse>, AppError> {
    let identity = identity.map(|Extension(identity)| identity);

    let events = decode_notification(&body).map_err(|e| {
        warn!(
            error = %e,
            client_cn = identity.as_ref().map(ClientIdentity::common_name),
            "pix_webhook_rejected"
        );
        e
    })?;

    let response = ingest(&state, identity.as_ref(), events)?;
    Ok(Json(response))
}

/// Store a decoded batch and notify viewers.
fn ingest(
    state: &AppState,
    identity: Option<&ClientIdentity>,
    events: Vec<PaymentEvent>,
) -> Result<WebhookResponse, AppError> {
    let date = processing_date();
    let count = events.len();

    for event in &events {
        info!(
            txid = event.transaction_id.as_deref().unwrap_or("-"),
            end_to_end_id = %event.end_to_end_id,
            amount = %event.amount,
            payer = %event.payer.name,
            client_cn = identity.map(ClientIdentity::common_name),
            "pix_payment_received"
        );
    }

    {
        let _ordered = state
            .ingest_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("ingest lock poisoned"))?;

        let entry = state.ledger.append(date, events)?;
        info!(date = %date, count = count, day_total = entry.len(), "pix_payments_stored");

        state.notifier.publish(date, entry);
    }

    Ok(WebhookResponse {
        success: true,
        message: format!("{count} payment(s) processed"),
        data: date,
        client: ClientSummary::for_identity(identity),
    })
}

// =============================================================================
// Ledger Queries
// =============================================================================

/// Payments stored under one date.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentsResponse {
    pub data: NaiveDate,
    pub pagamentos: Vec<PaymentEvent>,
    pub total: usize,
    pub valor_total: Amount,
}

impl PaymentsResponse {
    fn new(data: NaiveDate, pagamentos: Vec<PaymentEvent>) -> Self {
        Self {
            data,
            total: pagamentos.len(),
            valor_total: pagamentos.iter().sum(),
            pagamentos,
        }
    }
}

/// `GET /api/pagamentos/:data`
pub async fn payments_for_date(
    State(state): State<AppState>,
    Path(raw_date): Path<String>,
) -> Result<Json<PaymentsResponse>, AppError> {
    let date = NaiveDate::parse_from_str(&raw_date, "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDate(raw_date))?;

    let events = state.ledger.get(date)?;
    Ok(Json(PaymentsResponse::new(date, events)))
}

/// `GET /api/pagamentos`: today's payments.
pub async fn payments_today(
    State(state): State<AppState>,
) -> Result<Json<PaymentsResponse>, AppError> {
    let date = processing_date();
    let events = state.ledger.get(date)?;
    Ok(Json(PaymentsResponse::new(date, events)))
}

// =============================================================================
// Client Info
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfoResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_cert: Option<ClientIdentity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    pub message: &'static str,
}

/// `GET /api/client-info`: echo the caller's certificate identity.
pub async fn client_info(identity: Option<Extension<ClientIdentity>>) -> Response {
    match identity {
        Some(Extension(identity)) => Json(ClientInfoResponse {
            authenticated: true,
            client_cert: Some(identity),
            error: None,
            message: "Client authenticated via mTLS",
        })
        .into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(ClientInfoResponse {
                authenticated: false,
                client_cert: None,
                error: Some("No client certificate"),
                message: "This endpoint requires mTLS authentication",
            }),
        )
            .into_response(),
    }
}

// =============================================================================
// Development Simulation
// =============================================================================

#[derive(Debug, Serialize)]
pub struct SimulationResponse {
    pub message: &'static str,
    pub result: WebhookResponse,
}

/// `POST /simular-webhook`: push the sample notification through ingestion.
pub async fn simulate_webhook(
    State(state): State<AppState>,
) -> Result<Json<SimulationResponse>, AppError> {
    if !state.config.simulate_webhook_enabled {
        return Err(AppError::NotFound);
    }

    let body = serde_json::to_vec(&sample_notification())
        .map_err(|e| AppError::Internal(e.into()))?;
    let events = decode_notification(&body)?;

    info!(count = events.len(), "pix_webhook_simulated");
    let result = ingest(&state, None, events)?;

    Ok(Json(SimulationResponse {
        message: "Simulated webhook processed",
        result,
    }))
}
