//! Peer-aware RPC for strata compute and runtime workers.
//!
//! Routes named method calls over a peer-to-peer stream transport to a
//! dynamically-changing, partially-trusted peer set. Peers are ranked by
//! past experience ([`PeerManager`]), calls retry across rounds without
//! violating caller deadlines ([`RpcClient::call`]), fan-out queries run
//! under a bounded worker pool ([`RpcClient::call_multi`]), and callers
//! grade responses after the fact through one-shot [`PeerFeedback`]
//! handles.
//!
//! Wire format: MessagePack envelopes over length-delimited frames; the
//! transport itself is the [`strata_transport::PeerTransport`] seam.

pub mod client;
mod codec;
pub mod envelope;
pub mod error;
pub mod feedback;
pub mod metrics;
pub mod peers;

pub use client::{
    CallOptions, ClientConfig, PeerFilter, RpcClient, DEFAULT_RETRY_INTERVAL,
    REQUEST_WRITE_DEADLINE,
};
pub use envelope::{ErrorBody, Request, Response};
pub use error::RpcError;
pub use feedback::PeerFeedback;
pub use metrics::RpcMetrics;
pub use peers::{PeerManager, PeerStats};

// Re-export the transport seam types callers need to construct a client.
pub use strata_transport::{PeerId, PeerTransport, ProtocolId, RuntimeId, Version};
