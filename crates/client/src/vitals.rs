//! Web-vitals reporter.
//!
//! Builds the full nine-field payload for every metric and hands it to the
//! transport: as a beacon when the transport has one, otherwise as a POST
//! flagged `keepalive` so it outlives page teardown.

use std::time::{SystemTime, UNIX_EPOCH};

use siad_core::vitals::{VitalRating, WebVitalPayload, WEB_VITALS_PATH};

use crate::error::ClientError;

/// A metric as produced by the measuring library.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub id: String,
    pub name: String,
    pub value: f64,
    pub rating: VitalRating,
    pub delta: f64,
    pub navigation_type: String,
}

/// Where the metric was taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    pub href: String,
    pub user_agent: String,
}

/// How a payload left the reporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Beacon,
    Post { keepalive: bool },
}

pub trait VitalsTransport: Send + Sync {
    /// Whether [`VitalsTransport::send_beacon`] is available.
    fn has_beacon(&self) -> bool;

    /// Queue `body` for delivery without waiting. Returns whether it was
    /// queued.
    fn send_beacon(&self, url: &str, body: &str) -> bool;

    /// Returns once the POST is sent, or once it is queued when called from
    /// inside a tokio runtime.
    fn post(&self, url: &str, body: &str, keepalive: bool) -> Result<(), ClientError>;
}

/// Plain HTTP transport: no beacon, POST with `Connection: keep-alive`.
#[derive(Debug, Clone)]
pub struct HttpVitalsTransport {
    agent: ureq::Agent,
}

impl Default for HttpVitalsTransport {
    fn default() -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
        }
    }
}

impl VitalsTransport for HttpVitalsTransport {
    fn has_beacon(&self) -> bool {
        false
    }

    fn send_beacon(&self, _url: &str, _body: &str) -> bool {
        false
    }

    fn post(&self, url: &str, body: &str, keepalive: bool) -> Result<(), ClientError> {
        let agent = self.agent.clone();
        let (url, body) = (url.to_string(), body.to_string());
        let send = move || {
            let mut request = agent.post(&url).header("Content-Type", "application/json");
            if keepalive {
                request = request.header("Connection", "keep-alive");
            }
            request
                .send(&body)
                .map(|_| ())
                .map_err(|e| ClientError::Transport(e.to_string()))
        };
        match tokio::runtime::Handle::try_current() {
            // Inside a runtime the request goes to the blocking pool.
            Ok(handle) => {
                handle.spawn_blocking(move || {
                    if let Err(e) = send() {
                        tracing::debug!(error = %e, "web-vitals post failed");
                    }
                });
                Ok(())
            }
            Err(_) => send(),
        }
    }
}

pub struct VitalsReporter<T> {
    transport: T,
    endpoint: String,
}

impl<T: VitalsTransport> VitalsReporter<T> {
    /// `base_url` is the backend origin; the collection path is appended.
    pub fn new(transport: T, base_url: &str) -> Self {
        Self {
            transport,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), WEB_VITALS_PATH),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn payload(metric: &Metric, page: &PageContext, timestamp: u64) -> WebVitalPayload {
        WebVitalPayload {
            id: metric.id.clone(),
            name: metric.name.clone(),
            value: metric.value,
            rating: metric.rating,
            delta: metric.delta,
            navigation_type: metric.navigation_type.clone(),
            href: page.href.clone(),
            user_agent: page.user_agent.clone(),
            timestamp,
        }
    }

    /// Send one metric. Delivery failures are logged, never returned.
    pub fn report(&self, metric: &Metric, page: &PageContext) -> Delivery {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let payload = Self::payload(metric, page, timestamp);
        let body = match serde_json::to_string(&payload) {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(error = %e, "could not encode web-vitals payload");
                return Delivery::Post { keepalive: true };
            }
        };

        if self.transport.has_beacon() {
            if !self.transport.send_beacon(&self.endpoint, &body) {
                tracing::debug!(metric = %metric.name, "web-vitals beacon was not queued");
            }
            Delivery::Beacon
        } else {
            if let Err(e) = self.transport.post(&self.endpoint, &body, true) {
                tracing::debug!(metric = %metric.name, error = %e, "web-vitals post failed");
            }
            Delivery::Post { keepalive: true }
        }
    }
}
