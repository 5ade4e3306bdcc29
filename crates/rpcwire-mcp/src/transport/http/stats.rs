//! Per-worker request counters and the stats snapshot built from them.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::time::Instant;

/// Process-local counters for one worker.
#[derive(Debug)]
pub struct Counters {
    requests_total: AtomicU64,
    started_at: Instant,
}

impl Default for Counters {
    fn default() -> Self {
        Self::new()
    }
}

impl Counters {
    pub fn new() -> Self {
        Self {
            requests_total: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn record_request(&self) -> u64 {
        self.requests_total.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn snapshot(&self, sse: Option<SseFigures>) -> StatsSnapshot {
        StatsSnapshot::compute(self.uptime_seconds(), self.requests_total(), sse)
    }
}

/// SSE gauges, present only when SSE is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SseFigures {
    pub connections_active: usize,
    pub sessions_active: usize,
    pub max_connections: usize,
}

/// Point-in-time view of a worker's counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub uptime_seconds: u64,
    pub requests_total: u64,
    pub requests_per_second: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sse_connections_active: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sse_sessions_active: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sse_max_connections: Option<usize>,
}

impl StatsSnapshot {
    /// Build a snapshot; the rate is 0 while uptime is still 0.
    pub fn compute(uptime_seconds: u64, requests_total: u64, sse: Option<SseFigures>) -> Self {
        let requests_per_second = if uptime_seconds == 0 {
            0.0
        } else {
            requests_total as f64 / uptime_seconds as f64
        };

        Self {
            uptime_seconds,
            requests_total,
            requests_per_second,
            sse_connections_active: sse.map(|s| s.connections_active),
            sse_sessions_active: sse.map(|s| s.sessions_active),
            sse_max_connections: sse.map(|s| s.max_connections),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_zero_uptime_has_zero_rate() {
        let snapshot = StatsSnapshot::compute(0, 42, None);
        assert_eq!(snapshot.requests_per_second, 0.0);
    }

    #[test]
    fn test_rate_and_optional_fields() {
        let sse = SseFigures {
            connections_active: 3,
            sessions_active: 2,
            max_connections: 10,
        };
        let snapshot = StatsSnapshot::compute(4, 10, Some(sse));
        assert_eq!(snapshot.requests_per_second, 2.5);

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["sse_connections_active"], json!(3));
        assert_eq!(value["sse_max_connections"], json!(10));

        let bare = serde_json::to_value(StatsSnapshot::compute(4, 10, None)).unwrap();
        assert!(bare.get("sse_connections_active").is_none());
    }

    #[test]
    fn test_record_request() {
        let counters = Counters::new();
        counters.record_request();
        assert_eq!(counters.record_request(), 2);
        assert_eq!(counters.requests_total(), 2);
    }
}
