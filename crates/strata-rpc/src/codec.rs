//! Stream codec adapter — one attempt's request/response exchange.
//!
//! Write the request frame under the strict write deadline, then read
//! and decode the response frame under the caller's per-peer response
//! deadline. Deadline expiry surfaces as
//! [`TransportError::DeadlineExceeded`].

use std::time::Duration;

use strata_transport::{RpcStream, TransportError};
use tokio::time::timeout;

use crate::envelope::Response;
use crate::error::RpcError;

pub(crate) async fn exchange(
    stream: &mut dyn RpcStream,
    request: &[u8],
    write_deadline: Duration,
    read_deadline: Duration,
    max_response_size: usize,
) -> Result<Response, RpcError> {
    timeout(write_deadline, stream.write_frame(request))
        .await
        .map_err(|_| RpcError::Transport(TransportError::DeadlineExceeded))??;

    let frame = timeout(read_deadline, stream.read_frame(max_response_size))
        .await
        .map_err(|_| RpcError::Transport(TransportError::DeadlineExceeded))??;

    Response::from_bytes(&frame)
}
