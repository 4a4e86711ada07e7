//! Process-wide request counters exposed on `GET /metrics`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug)]
pub struct Metrics {
    started: Instant,
    /// Every request seen by the middleware.
    requests_total: AtomicU64,
    /// Responses with status >= 400.
    errors_total: AtomicU64,
    by_method: Mutex<BTreeMap<String, u64>>,
    by_status: Mutex<BTreeMap<u16, u64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub requests_by_method: BTreeMap<String, u64>,
    pub requests_by_status: BTreeMap<String, u64>,
    pub errors_total: u64,
    pub uptime_seconds: f64,
    pub timestamp: String,
}

impl Default for Metrics {
    fn default() -> Self { Self::new() }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            requests_total: AtomicU64::new(0),
            errors_total: AtomicU64::new(0),
            by_method: Mutex::new(BTreeMap::new()),
            by_status: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn record(&self, method: &str, status: u16) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if status >= 400 { self.errors_total.fetch_add(1, Ordering::Relaxed); }
        *self.by_method.lock().entry(method.to_string()).or_insert(0) += 1;
        *self.by_status.lock().entry(status).or_insert(0) += 1;
    }

    pub fn uptime(&self) -> Duration { self.started.elapsed() }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let uptime = (self.uptime().as_secs_f64() * 100.0).round() / 100.0;
        MetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_by_method: self.by_method.lock().clone(),
            requests_by_status: self.by_status.lock().iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            errors_total: self.errors_total.load(Ordering::Relaxed),
            uptime_seconds: uptime,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }
}
