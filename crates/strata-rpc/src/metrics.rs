//! Client-level call statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters for one client instance.
///
/// All operations use relaxed ordering — these are statistics, not
/// synchronization. Owned by the [`RpcClient`](crate::RpcClient) and
/// readable by embedders via [`RpcClient::metrics`](crate::RpcClient::metrics).
#[derive(Debug, Default)]
pub struct RpcMetrics {
    calls: AtomicU64,
    multi_calls: AtomicU64,
    attempts: AtomicU64,
    failed_attempts: AtomicU64,
    remote_errors: AtomicU64,
}

impl RpcMetrics {
    pub(crate) fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_multi_call(&self) {
        self.multi_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed_attempt(&self) {
        self.failed_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_remote_error(&self) {
        self.remote_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Logical calls started via `call`.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Logical fan-out calls started via `call_multi`.
    pub fn multi_calls(&self) -> u64 {
        self.multi_calls.load(Ordering::Relaxed)
    }

    /// Physical per-peer attempts, across all calls.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Attempts that failed (transport, decode or remote error).
    pub fn failed_attempts(&self) -> u64 {
        self.failed_attempts.load(Ordering::Relaxed)
    }

    /// Attempts answered with a declared application error.
    pub fn remote_errors(&self) -> u64 {
        self.remote_errors.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero_and_advance() {
        let metrics = RpcMetrics::default();
        assert_eq!(metrics.calls(), 0);
        assert_eq!(metrics.attempts(), 0);

        metrics.record_call();
        metrics.record_attempt();
        metrics.record_attempt();
        metrics.record_failed_attempt();
        metrics.record_remote_error();
        metrics.record_multi_call();

        assert_eq!(metrics.calls(), 1);
        assert_eq!(metrics.multi_calls(), 1);
        assert_eq!(metrics.attempts(), 2);
        assert_eq!(metrics.failed_attempts(), 1);
        assert_eq!(metrics.remote_errors(), 1);
    }
}
