//! Peer-aware RPC client.
//!
//! Routes one logical call to 1..N physical attempts against ranked
//! peers: a single-peer mode with constant-backoff retry rounds, and a
//! fan-out mode that queries many peers under a bounded worker pool.
//! Cancellation is the caller's [`CancellationToken`]; it is honored at
//! every blocking wait and dropping an in-flight attempt releases its
//! stream.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{oneshot, Semaphore};
use tokio_util::sync::CancellationToken;

use strata_transport::{PeerId, PeerTransport, ProtocolId, TransportError};

use crate::codec;
use crate::envelope::{ErrorBody, Request, Response};
use crate::error::RpcError;
use crate::feedback::PeerFeedback;
use crate::metrics::RpcMetrics;
use crate::peers::PeerManager;

/// Maximum time one attempt may spend opening its stream and writing the
/// request frame.
pub const REQUEST_WRITE_DEADLINE: Duration = Duration::from_secs(5);

/// Backoff between retry rounds unless overridden per call.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

const DEFAULT_MAX_RESPONSE_SIZE: usize = 1024 * 1024;
const DEFAULT_MIN_REPUBLISH_INTERVAL: Duration = Duration::from_secs(60);

/// Restricts which connected peers a client may call.
pub trait PeerFilter: Send + Sync {
    /// Whether the given peer should be used for calls.
    fn is_peer_acceptable(&self, peer_id: &PeerId) -> bool;
}

/// Client construction options. Builder pattern, sensible defaults:
///
/// ```
/// use strata_rpc::ClientConfig;
///
/// let config = ClientConfig::new()
///     .sticky_peers(true)
///     .max_response_size(4 * 1024 * 1024);
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    pub(crate) sticky_peers: bool,
    pub(crate) peer_filter: Option<Arc<dyn PeerFilter>>,
    pub(crate) max_response_size: usize,
    pub(crate) min_republish_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self {
            sticky_peers: false,
            peer_filter: None,
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
            min_republish_interval: DEFAULT_MIN_REPUBLISH_INTERVAL,
        }
    }

    /// Pin the last successful peer as first choice until it is deemed
    /// bad by feedback (default: off).
    pub fn sticky_peers(mut self, enabled: bool) -> Self {
        self.sticky_peers = enabled;
        self
    }

    /// Only call peers accepted by `filter`.
    pub fn peer_filter(mut self, filter: impl PeerFilter + 'static) -> Self {
        self.peer_filter = Some(Arc::new(filter));
        self
    }

    /// Maximum response frame size (default: 1 MiB).
    pub fn max_response_size(mut self, bytes: usize) -> Self {
        self.max_response_size = bytes;
        self
    }

    /// Minimum republish interval reported to gossip-publish callers
    /// (default: 60 s).
    pub fn min_republish_interval(mut self, interval: Duration) -> Self {
        self.min_republish_interval = interval;
        self
    }
}

/// Per-call options.
#[derive(Debug, Clone)]
pub struct CallOptions {
    pub(crate) max_retries: u32,
    pub(crate) retry_interval: Duration,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl CallOptions {
    pub fn new() -> Self {
        Self {
            max_retries: 0,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }

    /// Additional full rounds to run after the first one fails
    /// (default: 0 — a single round).
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Constant backoff between rounds (default: 1 s).
    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }
}

/// RPC client for one protocol.
///
/// Cheap to clone: clones share the peer manager, metrics and transport.
/// The peer-manager surface is re-exposed here so callers that bypass
/// `call` (gossip-style publish) still participate in peer scoring.
#[derive(Clone)]
pub struct RpcClient {
    transport: Arc<dyn PeerTransport>,
    protocol: ProtocolId,
    peers: PeerManager,
    config: ClientConfig,
    metrics: Arc<RpcMetrics>,
}

impl RpcClient {
    pub fn new(
        transport: Arc<dyn PeerTransport>,
        protocol: ProtocolId,
        config: ClientConfig,
    ) -> Self {
        let peers = PeerManager::new(
            transport.clone(),
            protocol.clone(),
            config.sticky_peers,
            config.min_republish_interval,
        );
        Self {
            transport,
            protocol,
            peers,
            config,
            metrics: Arc::new(RpcMetrics::default()),
        }
    }

    pub fn protocol(&self) -> &ProtocolId {
        &self.protocol
    }

    pub fn metrics(&self) -> &RpcMetrics {
        &self.metrics
    }

    pub fn peer_manager(&self) -> &PeerManager {
        &self.peers
    }

    // ── Peer manager surface ───────────────────────────────────────────

    pub async fn get_best_peers(&self) -> Vec<PeerId> {
        self.peers.get_best_peers().await
    }

    pub fn record_success(&self, peer: PeerId, latency: Duration) {
        self.peers.record_success(peer, latency);
    }

    pub fn record_failure(&self, peer: PeerId, latency: Duration) {
        self.peers.record_failure(peer, latency);
    }

    pub fn record_bad_peer(&self, peer: PeerId) {
        self.peers.record_bad_peer(peer);
    }

    pub fn min_republish_interval(&self) -> Duration {
        self.peers.min_republish_interval()
    }

    // ── Calls ──────────────────────────────────────────────────────────

    /// Route `method` to one of the peers supporting the protocol, ranked
    /// by past experience.
    ///
    /// Tries each ranked peer in order; transport, decode and remote
    /// failures all fall through to the next candidate, first success
    /// wins. When a whole round fails and `opts.max_retries` allows,
    /// waits `opts.retry_interval` and runs another round against a
    /// freshly-ranked list. Each peer attempt is bounded by
    /// `max_peer_response_time` on the read side.
    ///
    /// On success returns the decoded response and a [`PeerFeedback`]
    /// handle the caller should resolve after judging the payload.
    pub async fn call<B, R>(
        &self,
        ctx: &CancellationToken,
        method: &str,
        body: &B,
        max_peer_response_time: Duration,
        opts: CallOptions,
    ) -> Result<(R, PeerFeedback), RpcError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        tracing::debug!(method, protocol = %self.protocol, "call");
        self.metrics.record_call();

        let request = encode_request(method, body)?;

        let mut last_remote = None;
        let mut round = 0u32;
        loop {
            if ctx.is_cancelled() {
                return Err(RpcError::Cancelled);
            }

            match self
                .try_peers::<R>(ctx, method, &request, max_peer_response_time, &mut last_remote)
                .await
            {
                Ok(result) => return Ok(result),
                Err(RpcError::Cancelled) => return Err(RpcError::Cancelled),
                Err(_) => {} // round exhausted, maybe retry below
            }

            if round >= opts.max_retries {
                break;
            }
            round += 1;

            tokio::select! {
                _ = ctx.cancelled() => return Err(RpcError::Cancelled),
                _ = tokio::time::sleep(opts.retry_interval) => {}
            }
        }

        Err(RpcError::Exhausted { last_remote })
    }

    /// Route `method` to up to all acceptable peers concurrently, at most
    /// `max_parallel` attempts in flight at once.
    ///
    /// Each peer gets exactly one attempt. Per-peer failures are skipped,
    /// never fatal. Cancellation stops the collection immediately:
    /// results gathered so far are returned without error, and only a
    /// cancellation with nothing collected yet fails the call.
    pub async fn call_multi<B, R>(
        &self,
        ctx: &CancellationToken,
        method: &str,
        body: &B,
        max_peer_response_time: Duration,
        max_parallel: usize,
    ) -> Result<(Vec<R>, Vec<PeerFeedback>), RpcError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned + Send + 'static,
    {
        tracing::debug!(method, protocol = %self.protocol, "call multiple");
        self.metrics.record_multi_call();

        let request = encode_request(method, body)?;
        let limiter = Arc::new(Semaphore::new(max_parallel.max(1)));

        // One single-attempt task per acceptable peer; each reports over
        // its own channel so results can be collected in submission order.
        let mut pending = Vec::new();
        for peer_id in self.peers.get_best_peers().await {
            if !self.is_peer_acceptable(&peer_id) {
                continue;
            }

            let (tx, rx) = oneshot::channel();
            pending.push(rx);

            let client = self.clone();
            let ctx = ctx.clone();
            let request = request.clone();
            let limiter = limiter.clone();
            tokio::spawn(async move {
                let _permit = match limiter.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                let result = tokio::select! {
                    _ = ctx.cancelled() => return,
                    result = client.call_one::<R>(peer_id, &request, max_peer_response_time) => result,
                };
                let _ = tx.send(result);
            });
        }

        let mut responses = Vec::new();
        let mut feedbacks = Vec::new();
        for rx in pending {
            tokio::select! {
                _ = ctx.cancelled() => {
                    if responses.is_empty() {
                        return Err(RpcError::Cancelled);
                    }
                    break;
                }
                result = rx => match result {
                    Ok(Ok((response, feedback))) => {
                        responses.push(response);
                        feedbacks.push(feedback);
                    }
                    // Failed attempt, or the task bailed out on
                    // cancellation — skip either way.
                    Ok(Err(_)) | Err(_) => {}
                },
            }
        }

        Ok((responses, feedbacks))
    }

    // ── Internal ───────────────────────────────────────────────────────

    fn is_peer_acceptable(&self, peer_id: &PeerId) -> bool {
        match &self.config.peer_filter {
            Some(filter) => filter.is_peer_acceptable(peer_id),
            None => true,
        }
    }

    /// One round: every acceptable ranked peer, in order, until a success.
    async fn try_peers<R: DeserializeOwned>(
        &self,
        ctx: &CancellationToken,
        method: &str,
        request: &Bytes,
        max_peer_response_time: Duration,
        last_remote: &mut Option<ErrorBody>,
    ) -> Result<(R, PeerFeedback), RpcError> {
        for peer_id in self.peers.get_best_peers().await {
            if !self.is_peer_acceptable(&peer_id) {
                continue;
            }
            if ctx.is_cancelled() {
                return Err(RpcError::Cancelled);
            }

            tracing::debug!(method, %peer_id, "trying peer");

            let attempt = self.call_one::<R>(peer_id, request, max_peer_response_time);
            let result = tokio::select! {
                // Dropping the attempt future drops its stream.
                _ = ctx.cancelled() => return Err(RpcError::Cancelled),
                result = attempt => result,
            };

            match result {
                Ok(success) => return Ok(success),
                Err(RpcError::Remote(body)) => {
                    tracing::debug!(method, %peer_id, error = %body, "peer declared an error");
                    *last_remote = Some(body);
                }
                Err(err) => {
                    tracing::debug!(method, %peer_id, %err, "attempt failed");
                }
            }
        }

        tracing::debug!(method, "no peers could service the request");
        Err(RpcError::Exhausted {
            last_remote: last_remote.clone(),
        })
    }

    /// One physical attempt against one peer.
    ///
    /// A failed attempt (transport, decode or remote error) records an
    /// immediate failure against the peer; only a full transport success
    /// mints a deferred feedback handle, because only the caller can
    /// judge the payload.
    async fn call_one<R: DeserializeOwned>(
        &self,
        peer_id: PeerId,
        request: &Bytes,
        max_peer_response_time: Duration,
    ) -> Result<(R, PeerFeedback), RpcError> {
        self.metrics.record_attempt();
        let start = Instant::now();

        match self
            .exchange_with_peer::<R>(peer_id, request, max_peer_response_time)
            .await
        {
            Ok(value) => {
                let latency = start.elapsed();
                let feedback = PeerFeedback::new(self.peers.clone(), peer_id, latency);
                Ok((value, feedback))
            }
            Err(err) => {
                self.metrics.record_failed_attempt();
                if matches!(err, RpcError::Remote(_)) {
                    self.metrics.record_remote_error();
                }
                self.peers.record_failure(peer_id, start.elapsed());
                Err(err)
            }
        }
    }

    async fn exchange_with_peer<R: DeserializeOwned>(
        &self,
        peer_id: PeerId,
        request: &Bytes,
        max_peer_response_time: Duration,
    ) -> Result<R, RpcError> {
        let open = self.transport.open_stream(peer_id, &self.protocol);
        let mut stream = tokio::time::timeout(REQUEST_WRITE_DEADLINE, open)
            .await
            .map_err(|_| RpcError::Transport(TransportError::DeadlineExceeded))??;

        // Stream is released by drop on every path below.
        let response = codec::exchange(
            stream.as_mut(),
            request,
            REQUEST_WRITE_DEADLINE,
            max_peer_response_time,
            self.config.max_response_size,
        )
        .await?;

        match response {
            Response::Ok(payload) => rmp_serde::from_slice(&payload).map_err(Into::into),
            Response::Error(body) => Err(RpcError::Remote(body)),
        }
    }
}

/// Serialize the caller's body once into a request frame shared by every
/// attempt.
fn encode_request<B: Serialize + ?Sized>(method: &str, body: &B) -> Result<Bytes, RpcError> {
    let body = rmp_serde::to_vec(body)?;
    let frame = Request::new(method, body).to_bytes()?;
    Ok(Bytes::from(frame))
}
