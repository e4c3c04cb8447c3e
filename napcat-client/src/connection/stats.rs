//! Per-connection counters
//!
//! Everything the reader loop and fan-out drop or skip silently is counted
//! here so it can be inspected without turning on debug logging.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Inbound text frames read from the transport
    pub frames_received: u64,
    /// Inbound frames that were not a JSON object
    pub decode_errors: u64,
    /// Responses whose echo matched no pending request
    pub unmatched_responses: u64,
    /// Requests written to the transport
    pub requests_sent: u64,
    /// Requests whose caller gave up waiting
    pub requests_timed_out: u64,
    /// Event frames offered to the subscriber set
    pub events_broadcast: u64,
    /// Buffered events evicted to make room for newer ones
    pub events_evicted: u64,
    /// New events dropped because a queue could not take them at all
    pub events_dropped: u64,
}

/// Live counters for one connection
#[derive(Debug, Default)]
pub struct ConnectionStats {
    frames_received: AtomicU64,
    decode_errors: AtomicU64,
    unmatched_responses: AtomicU64,
    requests_sent: AtomicU64,
    requests_timed_out: AtomicU64,
    events_broadcast: AtomicU64,
    events_evicted: AtomicU64,
    events_dropped: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_frame(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unmatched(&self) {
        self.unmatched_responses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_request(&self) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timeout(&self) {
        self.requests_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_broadcast(&self) {
        self.events_broadcast.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_evicted(&self) {
        self.events_evicted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current values
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            unmatched_responses: self.unmatched_responses.load(Ordering::Relaxed),
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            requests_timed_out: self.requests_timed_out.load(Ordering::Relaxed),
            events_broadcast: self.events_broadcast.load(Ordering::Relaxed),
            events_evicted: self.events_evicted.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stats_are_zero() {
        let stats = ConnectionStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn test_counters_are_independent() {
        let stats = ConnectionStats::new();
        stats.record_frame();
        stats.record_frame();
        stats.record_decode_error();
        stats.record_evicted();
        stats.record_dropped();

        let snap = stats.snapshot();
        assert_eq!(snap.frames_received, 2);
        assert_eq!(snap.decode_errors, 1);
        assert_eq!(snap.events_evicted, 1);
        assert_eq!(snap.events_dropped, 1);
        assert_eq!(snap.requests_sent, 0);
        assert_eq!(snap.unmatched_responses, 0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let stats = ConnectionStats::new();
        stats.record_request();
        stats.record_timeout();
        let json = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(json["requests_sent"], 1);
        assert_eq!(json["requests_timed_out"], 1);
    }
}
