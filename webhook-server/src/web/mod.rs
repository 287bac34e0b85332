//! HTTP surface shared by the plaintext and mTLS listeners.
//!
//! Both listeners serve the same [`router`]. Only the mTLS listener tags
//! requests with a `TlsConnectInfo`, which is what makes the gate demand a
//! client certificate there.

pub mod handlers;

use std::path::Path;

use axum::{
    http::Method,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::auth::{mtls_gate, MtlsGate};
use crate::realtime::realtime_socket;

pub use handlers::{
    client_info, health, payments_for_date, payments_today, pix_webhook, simulate_webhook,
    AppState, ClientInfoResponse, HealthResponse, MemoryUsage, PaymentsResponse,
    SimulationResponse, WebhookResponse,
};

/// Routes served on every listener, as `(method, path)` for startup logs.
pub const ENDPOINTS: &[(&str, &str)] = &[
    ("POST", "/webhook"),
    ("GET", "/api/pagamentos"),
    ("GET", "/api/pagamentos/:data"),
    ("GET", "/api/client-info"),
    ("GET", "/health"),
    ("POST", "/simular-webhook"),
    ("GET", "/ws"),
];

/// Build the application router.
///
/// Paths that match no route fall through to the static UI in `public_dir`.
pub fn router(state: AppState, public_dir: &Path) -> Router {
    let gate = MtlsGate::new(state.config.proxy_headers.clone());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/webhook", post(pix_webhook))
        .route("/api/pagamentos", get(payments_today))
        .route("/api/pagamentos/:data", get(payments_for_date))
        .route("/api/client-info", get(client_info))
        .route("/health", get(health))
        .route("/simular-webhook", post(simulate_webhook))
        .route("/ws", get(realtime_socket))
        .fallback_service(ServeDir::new(public_dir))
        .layer(middleware::from_fn_with_state(gate, mtls_gate))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use rustls::pki_types::CertificateDer;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::auth::identity::test_certs;
    use crate::ledger::{processing_date, LedgerStore, MemoryLedger};
    use crate::realtime::{Notifier, RealtimeEvent};
    use crate::tls::TlsConnectInfo;
    use crate::Config;

    fn test_state(config: Config) -> AppState {
        AppState::new(config, Arc::new(MemoryLedger::new(Some(30))), Notifier::new(16))
    }

    fn test_router(state: AppState) -> Router {
        let public_dir = state.config.public_dir.clone();
        router(state, &public_dir)
    }

    fn notification(txid: &str, valor: &str) -> Value {
        json!({
            "pix": [{
                "endToEndId": "E60746948202103082223A7540Db1234",
                "txid": txid,
                "valor": valor,
                "horario": "2026-10-16T12:30:00.000Z",
                "pagador": { "cpf": "93492239293", "nome": "VICTOR LOPES DORNELES" }
            }]
        })
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn over_tls(mut request: Request<Body>, cert: Option<Vec<u8>>) -> Request<Body> {
        request.extensions_mut().insert(TlsConnectInfo {
            remote_addr: "10.0.0.7:44321".parse().unwrap(),
            peer_certificate: cert.map(CertificateDer::from),
        });
        request
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_unknown_date_is_empty() {
        let app = test_router(test_state(Config::default()));

        let (status, body) = send(&app, get_request("/api/pagamentos/2099-01-01")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], "2099-01-01");
        assert_eq!(body["pagamentos"], json!([]));
        assert_eq!(body["total"], 0);
        assert_eq!(body["valorTotal"].as_f64(), Some(0.0));
    }

    #[tokio::test]
    async fn test_invalid_date_is_bad_request() {
        let app = test_router(test_state(Config::default()));

        for path in ["/api/pagamentos/2024-02-30", "/api/pagamentos/hoje"] {
            let (status, body) = send(&app, get_request(path)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{path}");
            assert!(body["error"].as_str().unwrap().contains("invalid date"));
        }
    }

    #[tokio::test]
    async fn test_webhook_stores_and_notifies() {
        let state = test_state(Config::default());
        let mut viewer = state.notifier.subscribe();
        let app = test_router(state);

        let payload = notification("123234443", "100.00");
        let (status, body) = send(&app, post_json("/webhook", &payload)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["client"]["source"], "unauthenticated");

        let (status, body) = send(&app, get_request("/api/pagamentos")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["valorTotal"].as_f64(), Some(100.0));
        assert_eq!(body["pagamentos"][0]["txid"], "123234443");

        let RealtimeEvent::NewPayment(snapshot) = viewer.recv().await.unwrap() else {
            panic!("expected novoPagamento");
        };
        assert_eq!(snapshot.pagamentos.len(), 1);
        assert_eq!(snapshot.pagamentos[0].transaction_id.as_deref(), Some("123234443"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_webhooks_broadcast_in_commit_order() {
        let state = AppState::new(
            Config::default(),
            Arc::new(MemoryLedger::new(None)),
            Notifier::new(64),
        );
        let mut viewer = state.notifier.subscribe();
        let app = test_router(state);

        let posts = (0..20)
            .map(|i| {
                let app = app.clone();
                tokio::spawn(async move {
                    let payload = notification(&format!("c-{i}"), "1.00");
                    send(&app, post_json("/webhook", &payload)).await.0
                })
            })
            .collect::<Vec<_>>();
        for post in posts {
            assert_eq!(post.await.unwrap(), StatusCode::OK);
        }

        // Every broadcast carries the day so far; sizes must only grow
        for expected in 1..=20 {
            let RealtimeEvent::NewPayment(snapshot) = viewer.recv().await.unwrap() else {
                panic!("expected novoPagamento");
            };
            assert_eq!(snapshot.pagamentos.len(), expected);
        }
    }

    #[tokio::test]
    async fn test_duplicate_txid_is_kept() {
        let app = test_router(test_state(Config::default()));
        let payload = notification("dup-1", "10.50");

        for _ in 0..2 {
            let (status, _) = send(&app, post_json("/webhook", &payload)).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (_, body) = send(&app, get_request("/api/pagamentos")).await;
        assert_eq!(body["total"], 2);
        assert_eq!(body["valorTotal"].as_f64(), Some(21.0));
    }

    #[tokio::test]
    async fn test_malformed_webhook_rejected() {
        let state = test_state(Config::default());
        let ledger = state.ledger.clone();
        let app = test_router(state);

        let (status, _) = send(&app, post_json("/webhook", &json!({ "foo": 1 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let mut batch = notification("ok-1", "5.00");
        batch["pix"].as_array_mut().unwrap().push(json!({
            "endToEndId": "E2",
            "valor": "abc",
            "horario": "2026-10-16T12:30:00Z",
            "pagador": { "nome": "X" }
        }));
        let (status, body) = send(&app, post_json("/webhook", &batch)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("pix[1]"));

        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .body(Body::from("not json"))
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Nothing from the rejected batches was stored
        assert!(ledger.get(processing_date()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_proxy_verify_failure_is_unauthorized() {
        let app = test_router(test_state(Config::default()));

        let mut request = post_json("/webhook", &notification("p-1", "1.00"));
        let headers = request.headers_mut();
        headers.insert("x-ssl-client-cert", "-----BEGIN CERTIFICATE-----".parse().unwrap());
        headers.insert("x-ssl-client-verify", "FAILED:self signed".parse().unwrap());
        headers.insert("x-ssl-client-dn", "CN=bb-client".parse().unwrap());

        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Client certificate missing or invalid");
    }

    #[tokio::test]
    async fn test_proxy_success_identity_in_response() {
        let app = test_router(test_state(Config::default()));

        let mut request = post_json("/webhook", &notification("p-2", "1.00"));
        let headers = request.headers_mut();
        headers.insert("x-ssl-client-cert", "-----BEGIN CERTIFICATE-----".parse().unwrap());
        headers.insert("x-ssl-client-verify", "SUCCESS".parse().unwrap());
        headers.insert("x-ssl-client-dn", "CN=bb-client,O=Banco do Brasil".parse().unwrap());

        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["client"]["source"], "proxy");
        assert_eq!(body["client"]["subject"]["CN"], "bb-client");
    }

    #[tokio::test]
    async fn test_tls_without_certificate_is_unauthorized() {
        let app = test_router(test_state(Config::default()));

        let request = over_tls(post_json("/webhook", &notification("t-1", "1.00")), None);
        let (status, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Client certificate not provided");
    }

    #[tokio::test]
    async fn test_client_info() {
        let app = test_router(test_state(Config::default()));

        let (status, body) = send(&app, get_request("/api/client-info")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["authenticated"], false);

        let cert = test_certs::self_signed("bb-webhook-client", "Banco do Brasil");
        let request = over_tls(get_request("/api/client-info"), Some(cert.der));
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["authenticated"], true);
        assert_eq!(body["clientCert"]["source"], "direct");
        assert_eq!(body["clientCert"]["subject"]["CN"], "bb-webhook-client");
        assert!(body["clientCert"]["fingerprint"].is_string());
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_router(test_state(Config::default()));

        let (status, body) = send(&app, get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "OK");
        assert!(body["uptime"].is_number());
        assert!(body["timestamp"].is_string());
        assert!(body["memory"].is_object());
    }

    #[tokio::test]
    async fn test_simulate_webhook() {
        let app = test_router(test_state(Config::default()));

        let (status, body) = send(&app, post_json("/simular-webhook", &json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["success"], true);

        let (_, body) = send(&app, get_request("/api/pagamentos")).await;
        assert_eq!(body["total"], 1);
    }

    #[tokio::test]
    async fn test_simulate_webhook_disabled() {
        let config = Config {
            simulate_webhook_enabled: false,
            ..Config::default()
        };
        let app = test_router(test_state(config));

        let (status, _) = send(&app, post_json("/simular-webhook", &json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_static_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>PIX</h1>").unwrap();
        let config = Config {
            public_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        let app = test_router(test_state(config));

        let response = app.oneshot(get_request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"<h1>PIX</h1>");
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let app = test_router(test_state(Config::default()));

        let request = Request::builder()
            .method("OPTIONS")
            .uri("/webhook")
            .header("origin", "https://painel.example")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }
}
