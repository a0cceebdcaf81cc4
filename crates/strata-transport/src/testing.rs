//! In-memory transport for tests.
//!
//! Each registered peer is an async handler invoked once per opened
//! stream: it receives the request frame and returns `Some(reply frame)`
//! or `None` to never answer (so caller deadlines fire). Frames travel
//! over a real duplex pipe through [`write_framed`]/[`read_framed`], so
//! the wire discipline matches a production host.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::io::DuplexStream;

use crate::{read_framed, write_framed, PeerId, PeerTransport, ProtocolId, RpcStream, TransportError};

/// Future returned by a stream handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Option<Vec<u8>>> + Send>>;

/// Per-stream request handler: one request frame in, one optional reply out.
pub type StreamHandler = Arc<dyn Fn(Vec<u8>) -> HandlerFuture + Send + Sync>;

const PIPE_BUFFER: usize = 64 * 1024;

struct Inner {
    // Registration order is the "transport preference" order callers see.
    peers: Vec<(PeerId, StreamHandler)>,
    refused: HashSet<PeerId>,
    opened: Vec<(PeerId, String)>,
}

/// In-memory [`PeerTransport`].
pub struct MemoryTransport {
    max_frame_size: usize,
    inner: Mutex<Inner>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            max_frame_size: 1024 * 1024,
            inner: Mutex::new(Inner {
                peers: Vec::new(),
                refused: HashSet::new(),
                opened: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a peer with its stream handler. Re-registering replaces the
    /// handler but keeps the peer's position in the preference order.
    pub fn register(&self, peer: PeerId, handler: StreamHandler) {
        let mut inner = self.lock();
        match inner.peers.iter_mut().find(|(id, _)| *id == peer) {
            Some((_, existing)) => *existing = handler,
            None => inner.peers.push((peer, handler)),
        }
    }

    /// Register a peer from an async closure.
    pub fn register_fn<F, Fut>(&self, peer: PeerId, f: F)
    where
        F: Fn(Vec<u8>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<Vec<u8>>> + Send + 'static,
    {
        self.register(peer, Arc::new(move |req| Box::pin(f(req))));
    }

    /// Disconnect a peer entirely.
    pub fn remove(&self, peer: &PeerId) {
        self.lock().peers.retain(|(id, _)| id != peer);
    }

    /// Keep `peer` listed as connected but make `open_stream` fail.
    pub fn set_refuse_streams(&self, peer: PeerId, refuse: bool) {
        let mut inner = self.lock();
        if refuse {
            inner.refused.insert(peer);
        } else {
            inner.refused.remove(&peer);
        }
    }

    /// Every (peer, protocol) pair a stream was opened for, in order.
    pub fn opened_streams(&self) -> Vec<(PeerId, String)> {
        self.lock().opened.clone()
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PeerTransport for MemoryTransport {
    async fn open_stream(
        &self,
        peer: PeerId,
        protocol: &ProtocolId,
    ) -> Result<Box<dyn RpcStream>, TransportError> {
        let (handler, max_frame) = {
            let mut inner = self.lock();
            if inner.refused.contains(&peer) {
                return Err(TransportError::OpenStream {
                    peer_id: peer,
                    source: anyhow::anyhow!("stream refused"),
                });
            }
            let handler = inner
                .peers
                .iter()
                .find(|(id, _)| *id == peer)
                .map(|(_, h)| h.clone())
                .ok_or(TransportError::PeerNotConnected { peer_id: peer })?;
            inner.opened.push((peer, protocol.as_str().to_string()));
            (handler, self.max_frame_size)
        };

        let (client_io, mut server_io) = tokio::io::duplex(PIPE_BUFFER);

        // Remote side: read one request, answer (or park), exit when the
        // client half goes away.
        tokio::spawn(async move {
            let request = match read_framed(&mut server_io, max_frame).await {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::debug!(%peer, "stream closed before a request arrived: {e}");
                    return;
                }
            };
            match handler(request).await {
                Some(reply) => {
                    let _ = write_framed(&mut server_io, &reply).await;
                }
                None => {
                    // Never answers. Parks on a read that only resolves
                    // when the caller drops its half of the pipe.
                    let _ = read_framed(&mut server_io, max_frame).await;
                }
            }
        });

        Ok(Box::new(MemoryStream {
            peer_id: peer,
            io: client_io,
            max_frame_size: max_frame,
        }))
    }

    async fn connected_peers(&self, _protocol: &ProtocolId) -> Vec<PeerId> {
        self.lock().peers.iter().map(|(id, _)| *id).collect()
    }
}

struct MemoryStream {
    peer_id: PeerId,
    io: DuplexStream,
    max_frame_size: usize,
}

#[async_trait::async_trait]
impl RpcStream for MemoryStream {
    async fn write_frame(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if data.len() > self.max_frame_size {
            return Err(TransportError::FrameTooLarge {
                size: data.len(),
                max: self.max_frame_size,
            });
        }
        write_framed(&mut self.io, data)
            .await
            .map_err(|e| TransportError::Write {
                peer_id: self.peer_id,
                source: e.into(),
            })
    }

    async fn read_frame(&mut self, max_size: usize) -> Result<Vec<u8>, TransportError> {
        read_framed(&mut self.io, max_size).await
    }
}
