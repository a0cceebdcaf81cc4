use strata_transport::TransportError;

use crate::envelope::ErrorBody;

/// RPC-layer errors.
///
/// Transport and decode failures are absorbed per attempt (they feed peer
/// scoring and the call moves to the next candidate); callers of
/// [`RpcClient::call`](crate::RpcClient::call) only ever see `Remote`,
/// `Exhausted`, `Cancelled`, or a serialization failure of their own body.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// The peer answered with a declared application error. Distinct from
    /// transport failure: the round-trip worked, the remote said no.
    #[error("remote error: {0}")]
    Remote(ErrorBody),

    /// Every peer in every round failed. `last_remote` carries the most
    /// recent application error observed, if any peer got that far.
    #[error("call failed on all peers")]
    Exhausted { last_remote: Option<ErrorBody> },

    #[error("call cancelled")]
    Cancelled,
}

impl From<rmp_serde::encode::Error> for RpcError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        RpcError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for RpcError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        RpcError::Deserialization(e.to_string())
    }
}
