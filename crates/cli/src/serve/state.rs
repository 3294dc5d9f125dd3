//! Application state: storage handle, rate limiting, sessions and the
//! web-vitals buffer.

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use tokio::sync::Mutex;

use siad_core::clock;
use siad_core::model::{AuditLog, User};
use siad_core::vitals::WebVitalPayload;
use siad_storage::ArchiveStorage;

use super::media::MediaConfig;
use super::signing::DocumentSigner;
use super::RATE_LIMIT_WINDOW_SECS;

/// Per-IP request tracker: (request count, window start time).
type IpTracker = HashMap<IpAddr, (u64, Instant)>;

/// In-memory per-IP rate limiter.
pub(crate) struct RateLimiter {
    tracker: Mutex<IpTracker>,
    /// Maximum requests per window.
    pub(crate) max_requests: u64,
}

impl RateLimiter {
    pub(crate) fn new(max_requests: u64) -> Self {
        Self {
            tracker: Mutex::new(HashMap::new()),
            max_requests,
        }
    }

    /// Check if a request from the given IP is allowed.
    /// Returns Ok(()) if allowed, Err(retry_after_secs) if rate limited.
    pub(crate) async fn check(&self, ip: IpAddr) -> Result<(), u64> {
        let mut tracker = self.tracker.lock().await;
        let now = Instant::now();

        let entry = tracker.entry(ip).or_insert((0, now));

        let elapsed = now.duration_since(entry.1).as_secs();
        if elapsed >= RATE_LIMIT_WINDOW_SECS {
            entry.0 = 0;
            entry.1 = now;
        }

        entry.0 += 1;
        if entry.0 > self.max_requests {
            Err(RATE_LIMIT_WINDOW_SECS.saturating_sub(elapsed))
        } else {
            Ok(())
        }
    }
}

struct Session {
    user_id: String,
    expires_at: Instant,
}

/// Opaque access tokens mapped to user ids, each with a fixed lifetime.
pub(crate) struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    ttl: Duration,
}

impl SessionStore {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub(crate) fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a fresh 32-byte token for `user_id`.
    pub(crate) async fn create(&self, user_id: &str) -> String {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let token = URL_SAFE_NO_PAD.encode(bytes);

        let mut sessions = self.sessions.lock().await;
        let now = Instant::now();
        sessions.retain(|_, s| s.expires_at > now);
        sessions.insert(
            token.clone(),
            Session {
                user_id: user_id.to_string(),
                expires_at: now + self.ttl,
            },
        );
        token
    }

    /// The user id behind a live token. Expired tokens are dropped.
    pub(crate) async fn resolve(&self, token: &str) -> Option<String> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get(token) {
            Some(s) if s.expires_at > Instant::now() => Some(s.user_id.clone()),
            Some(_) => {
                sessions.remove(token);
                None
            }
            None => None,
        }
    }

    pub(crate) async fn revoke(&self, token: &str) {
        self.sessions.lock().await.remove(token);
    }
}

/// Bounded FIFO of collected web-vitals samples.
pub(crate) struct VitalsBuffer {
    samples: Mutex<VecDeque<WebVitalPayload>>,
    capacity: usize,
}

impl VitalsBuffer {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub(crate) async fn push(&self, sample: WebVitalPayload) {
        let mut samples = self.samples.lock().await;
        if samples.len() == self.capacity {
            samples.pop_front();
        }
        samples.push_back(sample);
    }

    pub(crate) async fn snapshot(&self) -> Vec<WebVitalPayload> {
        self.samples.lock().await.iter().cloned().collect()
    }
}

/// Application state shared across request handlers.
pub(crate) struct AppState {
    pub(crate) storage: Arc<dyn ArchiveStorage>,
    pub(crate) rate_limiter: RateLimiter,
    pub(crate) sessions: SessionStore,
    pub(crate) signer: DocumentSigner,
    pub(crate) media: MediaConfig,
    pub(crate) vitals: VitalsBuffer,
    /// Serializes multi-record writes (sign, revert, flow updates).
    pub(crate) write_lock: Mutex<()>,
}

impl AppState {
    /// Append an audit entry. A failed append is logged, never surfaced.
    pub(crate) async fn audit(
        &self,
        user: Option<&User>,
        action: &str,
        entity_type: &str,
        entity_id: Option<&str>,
        details: serde_json::Value,
        ip: Option<IpAddr>,
    ) {
        let entry = AuditLog {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user.map(|u| u.id.clone()),
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.map(str::to_string),
            details,
            ip_address: ip.map(|ip| ip.to_string()),
            created_at: clock::now(),
        };
        if let Err(e) = self.storage.append_audit(entry).await {
            tracing::warn!(error = %e, action, entity_type, "could not write audit entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rate_limiter_blocks_after_max() {
        let limiter = RateLimiter::new(2);
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        assert!(limiter.check(ip).await.is_ok());
        assert!(limiter.check(ip).await.is_ok());
        let retry = limiter.check(ip).await.unwrap_err();
        assert!(retry <= RATE_LIMIT_WINDOW_SECS);

        let other: IpAddr = "10.0.0.2".parse().unwrap();
        assert!(limiter.check(other).await.is_ok());
    }

    #[tokio::test]
    async fn sessions_resolve_until_revoked() {
        let store = SessionStore::new(Duration::from_secs(60));
        let token = store.create("u1").await;
        assert_eq!(URL_SAFE_NO_PAD.decode(&token).unwrap().len(), 32);
        assert_eq!(store.resolve(&token).await.as_deref(), Some("u1"));
        store.revoke(&token).await;
        assert_eq!(store.resolve(&token).await, None);
    }

    #[tokio::test]
    async fn expired_sessions_do_not_resolve() {
        let store = SessionStore::new(Duration::ZERO);
        let token = store.create("u1").await;
        assert_eq!(store.resolve(&token).await, None);
    }

    #[tokio::test]
    async fn vitals_buffer_drops_oldest() {
        let buffer = VitalsBuffer::new(2);
        for i in 0..3 {
            buffer
                .push(WebVitalPayload {
                    id: format!("v{i}"),
                    name: "LCP".to_string(),
                    value: 1.0,
                    rating: siad_core::vitals::VitalRating::Good,
                    delta: 1.0,
                    navigation_type: "navigate".to_string(),
                    href: "/".to_string(),
                    user_agent: "test".to_string(),
                    timestamp: i,
                })
                .await;
        }
        let ids: Vec<_> = buffer.snapshot().await.into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["v1", "v2"]);
    }
}
