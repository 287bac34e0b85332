//! Keep-alive prober.
//!
//! Hosting platforms that idle sleeping services can be kept awake by
//! polling `/health` on a fixed interval. Failures are logged and the loop
//! carries on.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::{error, info, warn};
use url::Url;

/// Default probe interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Probe interval with `--frequent`.
pub const FREQUENT_INTERVAL: Duration = Duration::from_secs(60);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of a single probe.
#[derive(Debug, Clone, PartialEq)]
pub enum PingOutcome {
    /// Server answered with a JSON body carrying its uptime.
    Healthy { uptime: f64, elapsed: Duration },
    /// Server answered but the body was not the expected JSON.
    InvalidBody { status: u16, elapsed: Duration },
    /// Request never got a response.
    Failed { reason: String },
}

#[derive(Debug, Deserialize)]
struct HealthBody {
    uptime: f64,
}

/// Periodically probes a server's health endpoint.
#[derive(Debug, Clone)]
pub struct KeepAlive {
    client: Client,
    target: Url,
    interval: Duration,
}

impl KeepAlive {
    pub fn new(base_url: &str, interval: Duration) -> Result<Self> {
        let target = health_url(base_url)?;
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            target,
            interval,
        })
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    /// Probe once and log the outcome.
    pub async fn ping(&self) -> PingOutcome {
        let started = Instant::now();

        let response = match self.client.get(self.target.clone()).send().await {
            Ok(resp) => resp,
            Err(e) => {
                error!(url = %self.target, error = %e, "keepalive_ping_failed");
                return PingOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let status = response.status().as_u16();
        let body = response.json::<HealthBody>().await;
        let elapsed = started.elapsed();

        match body {
            Ok(health) => {
                info!(
                    url = %self.target,
                    status_code = status,
                    uptime_seconds = health.uptime,
                    response_ms = elapsed.as_millis() as u64,
                    "keepalive_ping_ok"
                );
                PingOutcome::Healthy {
                    uptime: health.uptime,
                    elapsed,
                }
            }
            Err(e) => {
                warn!(
                    url = %self.target,
                    status_code = status,
                    response_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "keepalive_ping_invalid_body"
                );
                PingOutcome::InvalidBody { status, elapsed }
            }
        }
    }

    /// Probe immediately, then once per interval, until `shutdown` resolves.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: std::future::Future<Output = ()>,
    {
        info!(
            url = %self.target,
            interval_seconds = self.interval.as_secs(),
            "keepalive_started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.ping().await;
                }
                _ = &mut shutdown => break,
            }
        }

        info!(url = %self.target, "keepalive_stopped");
    }
}

/// `<base>/health`, keeping any path prefix on the base URL.
pub fn health_url(base_url: &str) -> Result<Url> {
    let mut base = Url::parse(base_url).with_context(|| format!("Invalid URL: {base_url}"))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join("health")
        .with_context(|| format!("Cannot build health URL from {base_url}"))
}
