//! The capability traits a peer-to-peer host implements for the RPC layer.

use crate::{PeerId, ProtocolId, TransportError};

/// Opens request/response streams to connected peers.
///
/// In production this is backed by the node's P2P host; in tests by
/// [`testing::MemoryTransport`](crate::testing::MemoryTransport).
#[async_trait::async_trait]
pub trait PeerTransport: Send + Sync {
    /// Open a bidirectional frame stream to `peer` for `protocol`.
    ///
    /// The peer must already be connected — opening a stream never dials.
    async fn open_stream(
        &self,
        peer: PeerId,
        protocol: &ProtocolId,
    ) -> Result<Box<dyn RpcStream>, TransportError>;

    /// Peers currently reachable for `protocol`, in the host's
    /// preference order.
    async fn connected_peers(&self, protocol: &ProtocolId) -> Vec<PeerId>;
}

/// One bidirectional, frame-oriented stream.
///
/// Callers bound each operation with their own deadline
/// (`tokio::time::timeout`); the stream itself never blocks forever on
/// behalf of the caller. Dropping the stream releases it — there is no
/// separate close call, so cleanup holds on every exit path including
/// cancellation.
#[async_trait::async_trait]
pub trait RpcStream: Send {
    /// Write one frame.
    async fn write_frame(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Read one frame of at most `max_size` bytes.
    async fn read_frame(&mut self, max_size: usize) -> Result<Vec<u8>, TransportError>;
}
