//! Versioned protocol identifiers and wire framing.
//!
//! A [`ProtocolId`] scopes which peers a call may target and which
//! sub-protocol the host negotiates for the stream. Two endpoints agree on
//! compatibility from the identifier alone — only the major version is
//! encoded, so no handshake round-trip is needed.

use std::fmt;
use std::str::FromStr;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{parse_hex32, TransportError};

/// Runtime namespace — a 32-byte identifier of the runtime a protocol
/// belongs to. Displayed and parsed as hex, like [`PeerId`](crate::PeerId).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuntimeId([u8; 32]);

impl RuntimeId {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for RuntimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for RuntimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_string();
        write!(f, "RuntimeId({}...)", &hex[..12])
    }
}

impl FromStr for RuntimeId {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex32(s)
            .map(Self)
            .ok_or_else(|| TransportError::InvalidRuntimeId(s.to_string()))
    }
}

/// Semantic protocol version. Only `major` participates in compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
}

impl Version {
    pub fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Versioned protocol key: runtime namespace + protocol name + version.
///
/// Immutable once constructed. The canonical wire form masks the version
/// down to its major component:
///
/// ```
/// use strata_transport::{ProtocolId, RuntimeId, Version};
///
/// let runtime = RuntimeId::from_bytes([0; 32]);
/// let pid = ProtocolId::new(runtime, "committee", Version::new(2, 4, 1));
/// assert!(pid.as_str().ends_with("/committee/2.0.0"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProtocolId {
    runtime_id: RuntimeId,
    name: String,
    version: Version,
    wire: String,
}

impl ProtocolId {
    /// Build the identifier for `name` under `runtime_id`.
    pub fn new(runtime_id: RuntimeId, name: &str, version: Version) -> Self {
        let wire = format!("/strata/{runtime_id}/{name}/{}.0.0", version.major);
        Self {
            runtime_id,
            name: name.to_string(),
            version,
            wire,
        }
    }

    pub fn runtime_id(&self) -> &RuntimeId {
        &self.runtime_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// The canonical string form negotiated with the host.
    pub fn as_str(&self) -> &str {
        &self.wire
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wire)
    }
}

/// Write one length-prefixed frame: u32 big-endian length, then the bytes.
pub async fn write_framed<W: AsyncWrite + Unpin>(w: &mut W, data: &[u8]) -> std::io::Result<()> {
    let len = (data.len() as u32).to_be_bytes();
    w.write_all(&len).await?;
    w.write_all(data).await?;
    w.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame, rejecting frames above `max_size`
/// before allocating.
pub async fn read_framed<R: AsyncRead + Unpin>(
    r: &mut R,
    max_size: usize,
) -> Result<Vec<u8>, TransportError> {
    let mut len_buf = [0u8; 4];
    r.read_exact(&mut len_buf)
        .await
        .map_err(|e| TransportError::Read(e.into()))?;

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max_size {
        return Err(TransportError::FrameTooLarge {
            size: len,
            max: max_size,
        });
    }

    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)
        .await
        .map_err(|e| TransportError::Read(e.into()))?;

    Ok(buf)
}
