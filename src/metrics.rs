use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Business and abuse counters, reported by `/health/metrics`.
#[derive(Clone)]
pub struct Metrics {
    pub orders_created: Arc<AtomicU64>,
    pub payments_verified: Arc<AtomicU64>,
    pub payments_rejected: Arc<AtomicU64>,
    pub emails_sent: Arc<AtomicU64>,
    pub emails_failed: Arc<AtomicU64>,
    pub logins_succeeded: Arc<AtomicU64>,
    pub logins_failed: Arc<AtomicU64>,
    pub requests_rate_limited: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            orders_created: Arc::new(AtomicU64::new(0)),
            payments_verified: Arc::new(AtomicU64::new(0)),
            payments_rejected: Arc::new(AtomicU64::new(0)),
            emails_sent: Arc::new(AtomicU64::new(0)),
            emails_failed: Arc::new(AtomicU64::new(0)),
            logins_succeeded: Arc::new(AtomicU64::new(0)),
            logins_failed: Arc::new(AtomicU64::new(0)),
            requests_rate_limited: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_orders_created(&self) {
        Self::bump(&self.orders_created);
    }

    pub fn inc_payments_verified(&self) {
        Self::bump(&self.payments_verified);
    }

    pub fn inc_payments_rejected(&self) {
        Self::bump(&self.payments_rejected);
    }

    pub fn inc_emails_sent(&self) {
        Self::bump(&self.emails_sent);
    }

    pub fn inc_emails_failed(&self) {
        Self::bump(&self.emails_failed);
    }

    pub fn inc_logins_succeeded(&self) {
        Self::bump(&self.logins_succeeded);
    }

    pub fn inc_logins_failed(&self) {
        Self::bump(&self.logins_failed);
    }

    pub fn inc_rate_limited(&self) {
        Self::bump(&self.requests_rate_limited);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            orders_created: self.orders_created.load(Ordering::Relaxed),
            payments_verified: self.payments_verified.load(Ordering::Relaxed),
            payments_rejected: self.payments_rejected.load(Ordering::Relaxed),
            emails_sent: self.emails_sent.load(Ordering::Relaxed),
            emails_failed: self.emails_failed.load(Ordering::Relaxed),
            logins_succeeded: self.logins_succeeded.load(Ordering::Relaxed),
            logins_failed: self.logins_failed.load(Ordering::Relaxed),
            requests_rate_limited: self.requests_rate_limited.load(Ordering::Relaxed),
            uptime_seconds: self.uptime_seconds(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub orders_created: u64,
    pub payments_verified: u64,
    pub payments_rejected: u64,
    pub emails_sent: u64,
    pub emails_failed: u64,
    pub logins_succeeded: u64,
    pub logins_failed: u64,
    pub requests_rate_limited: u64,
    pub uptime_seconds: u64,
}
