//! Deferred peer feedback.
//!
//! Transport success alone does not make a peer good — only the caller
//! can judge whether the payload it got back was semantically sound. A
//! successful attempt therefore returns a [`PeerFeedback`] handle, and
//! the caller commits exactly one verdict once it knows.

use std::fmt;
use std::time::Duration;

use strata_transport::PeerId;

use crate::peers::PeerManager;

/// One-shot handle reporting the semantic outcome of a successful attempt.
///
/// Bound to the peer that answered and the latency measured for that
/// specific attempt. Every verdict consumes the handle, so recording
/// twice is a compile error rather than a runtime hazard.
#[must_use = "record a verdict so peer ranking can adapt"]
pub struct PeerFeedback {
    target: Option<Target>,
}

struct Target {
    peers: PeerManager,
    peer_id: PeerId,
    latency: Duration,
}

impl PeerFeedback {
    pub(crate) fn new(peers: PeerManager, peer_id: PeerId, latency: Duration) -> Self {
        Self {
            target: Some(Target {
                peers,
                peer_id,
                latency,
            }),
        }
    }

    /// A handle that records nothing. For callers that must hand a
    /// feedback instance onward without participating in scoring.
    pub fn nop() -> Self {
        Self { target: None }
    }

    /// The peer this handle is bound to; `None` for a nop handle.
    pub fn peer_id(&self) -> Option<PeerId> {
        self.target.as_ref().map(|t| t.peer_id)
    }

    /// The response was good: clear the peer's failure streak and, in
    /// sticky mode, pin it.
    pub fn record_success(self) {
        if let Some(t) = self.target {
            t.peers.record_success(t.peer_id, t.latency);
        }
    }

    /// The response was unusable (stale, incomplete, ...): count a
    /// failure without excluding the peer.
    pub fn record_failure(self) {
        if let Some(t) = self.target {
            t.peers.record_failure(t.peer_id, t.latency);
        }
    }

    /// The response was malicious or corrupt: exclude the peer from
    /// selection for the lifetime of the manager.
    pub fn record_bad_peer(self) {
        if let Some(t) = self.target {
            t.peers.record_bad_peer(t.peer_id);
        }
    }
}

impl fmt::Debug for PeerFeedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Some(t) => f
                .debug_struct("PeerFeedback")
                .field("peer_id", &t.peer_id)
                .field("latency", &t.latency)
                .finish(),
            None => f.write_str("PeerFeedback(nop)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use strata_transport::testing::MemoryTransport;
    use strata_transport::{ProtocolId, RuntimeId, Version};

    fn peer(seed: u8) -> PeerId {
        PeerId::from_bytes([seed; 32])
    }

    fn manager_with_peers(seeds: &[u8]) -> PeerManager {
        let protocol =
            ProtocolId::new(RuntimeId::from_bytes([0; 32]), "echo", Version::new(1, 0, 0));
        let transport = Arc::new(MemoryTransport::new());
        for &seed in seeds {
            transport.register_fn(peer(seed), |req| async move { Some(req) });
        }
        PeerManager::new(transport, protocol, true, Duration::from_secs(60))
    }

    #[test]
    fn success_verdict_reaches_the_manager() {
        let mgr = manager_with_peers(&[1]);
        let feedback = PeerFeedback::new(mgr.clone(), peer(1), Duration::from_millis(5));
        assert_eq!(feedback.peer_id(), Some(peer(1)));

        feedback.record_success();
        let stats = mgr.stats(&peer(1)).unwrap();
        assert_eq!(stats.successes, 1);
        assert_eq!(stats.last_latency, Some(Duration::from_millis(5)));
    }

    #[tokio::test]
    async fn bad_peer_verdict_excludes_the_peer() {
        let mgr = manager_with_peers(&[1, 2]);
        let feedback = PeerFeedback::new(mgr.clone(), peer(1), Duration::from_millis(5));
        feedback.record_bad_peer();
        assert_eq!(mgr.get_best_peers().await, vec![peer(2)]);
    }

    #[test]
    fn nop_records_nothing() {
        let feedback = PeerFeedback::nop();
        assert_eq!(feedback.peer_id(), None);
        feedback.record_success();
    }

    #[test]
    fn debug_shows_bound_peer() {
        let mgr = manager_with_peers(&[1]);
        let feedback = PeerFeedback::new(mgr, peer(1), Duration::from_millis(5));
        let debug = format!("{feedback:?}");
        assert!(debug.contains("PeerFeedback"));
        assert!(debug.contains("peer_id"));
        feedback.record_failure();

        assert_eq!(format!("{:?}", PeerFeedback::nop()), "PeerFeedback(nop)");
    }
}
