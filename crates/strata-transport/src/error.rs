use crate::PeerId;

/// Errors returned by the strata transport seam.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to open stream to {peer_id}: {source}")]
    OpenStream {
        peer_id: PeerId,
        #[source]
        source: anyhow::Error,
    },

    #[error("write to {peer_id} failed: {source}")]
    Write {
        peer_id: PeerId,
        #[source]
        source: anyhow::Error,
    },

    #[error("read failed: {0}")]
    Read(#[source] anyhow::Error),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("peer {peer_id} is not connected")]
    PeerNotConnected { peer_id: PeerId },

    #[error("transport is shut down")]
    Shutdown,

    #[error("invalid peer id: {0}")]
    InvalidPeerId(String),

    #[error("invalid runtime id: {0}")]
    InvalidRuntimeId(String),
}
