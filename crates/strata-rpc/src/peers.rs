//! Peer ranking and quality bookkeeping for one RPC protocol.
//!
//! The manager absorbs loosely-ordered quality signals (successes,
//! failures, bad-peer verdicts) from concurrent callers and produces the
//! candidate list each call round works through. Ranking is deliberately
//! simple: connectivity order from the transport, bad peers removed,
//! sticky peer first — the client already retries across the whole list.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use strata_transport::{PeerId, PeerTransport, ProtocolId};

/// Quality record for one (protocol, peer) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerStats {
    /// Successful protocol interactions.
    pub successes: u64,
    /// Consecutive failures since the last success.
    pub failures: u64,
    /// Latency of the most recent completed attempt.
    pub last_latency: Option<Duration>,
}

struct Inner {
    stats: HashMap<PeerId, PeerStats>,
    bad: HashSet<PeerId>,
    sticky_peer: Option<PeerId>,
}

/// Tracks, ranks and filters peers for one protocol.
///
/// Cheap to clone; all clones share state behind one mutex. Records are
/// created on first observation and never deleted — peers that churn away
/// simply stop appearing in the transport's connected set.
#[derive(Clone)]
pub struct PeerManager {
    transport: Arc<dyn PeerTransport>,
    protocol: ProtocolId,
    sticky_enabled: bool,
    min_republish_interval: Duration,
    inner: Arc<Mutex<Inner>>,
}

impl PeerManager {
    pub fn new(
        transport: Arc<dyn PeerTransport>,
        protocol: ProtocolId,
        sticky_enabled: bool,
        min_republish_interval: Duration,
    ) -> Self {
        Self {
            transport,
            protocol,
            sticky_enabled,
            min_republish_interval,
            inner: Arc::new(Mutex::new(Inner {
                stats: HashMap::new(),
                bad: HashSet::new(),
                sticky_peer: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The prioritized candidate list for the next call round.
    ///
    /// Currently connected peers minus the bad set; when sticky mode is on
    /// and the sticky peer is connected, it moves to the front. Empty when
    /// no peers are known — never an error.
    pub async fn get_best_peers(&self) -> Vec<PeerId> {
        let connected = self.transport.connected_peers(&self.protocol).await;

        let inner = self.lock();
        let mut peers: Vec<PeerId> = connected
            .into_iter()
            .filter(|p| !inner.bad.contains(p))
            .collect();

        if self.sticky_enabled {
            if let Some(sticky) = inner.sticky_peer {
                if let Some(pos) = peers.iter().position(|p| *p == sticky) {
                    peers.remove(pos);
                    peers.insert(0, sticky);
                }
            }
        }

        peers
    }

    /// Record a successful protocol interaction with `peer`.
    ///
    /// Clears the peer's failure streak and, in sticky mode, pins it as
    /// the first choice for subsequent calls.
    pub fn record_success(&self, peer: PeerId, latency: Duration) {
        let mut inner = self.lock();
        let stats = inner.stats.entry(peer).or_default();
        stats.successes += 1;
        stats.failures = 0;
        stats.last_latency = Some(latency);

        if self.sticky_enabled && !inner.bad.contains(&peer) {
            inner.sticky_peer = Some(peer);
        }
    }

    /// Record an unsuccessful protocol interaction with `peer`.
    ///
    /// Failures alone never exclude a peer — timeouts and transient
    /// network errors are expected. Stickiness is kept: the sticky peer
    /// is released only by [`record_bad_peer`](Self::record_bad_peer).
    pub fn record_failure(&self, peer: PeerId, latency: Duration) {
        let mut inner = self.lock();
        let stats = inner.stats.entry(peer).or_default();
        stats.failures += 1;
        stats.last_latency = Some(latency);
    }

    /// Record a malicious or protocol-corrupting interaction with `peer`.
    ///
    /// The peer is excluded from [`get_best_peers`](Self::get_best_peers)
    /// for the lifetime of this manager instance; later successes do not
    /// rehabilitate it.
    pub fn record_bad_peer(&self, peer: PeerId) {
        tracing::debug!(%peer, protocol = %self.protocol, "excluding bad peer");

        let mut inner = self.lock();
        inner.bad.insert(peer);
        if inner.sticky_peer == Some(peer) {
            inner.sticky_peer = None;
        }
    }

    /// Minimum interval callers must respect when republishing the same
    /// message over the gossip path. Pass-through configuration — not part
    /// of ranking.
    pub fn min_republish_interval(&self) -> Duration {
        self.min_republish_interval
    }

    /// Snapshot of the quality record for `peer`, if one exists yet.
    pub fn stats(&self, peer: &PeerId) -> Option<PeerStats> {
        self.lock().stats.get(peer).cloned()
    }
}
