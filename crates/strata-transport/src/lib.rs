//! Strata transport seam.
//!
//! The types and capability traits the RPC layer consumes from the
//! peer-to-peer host: peer and runtime identities, versioned protocol
//! identifiers, length-delimited framing, and the [`PeerTransport`] /
//! [`RpcStream`] traits a host implements to hand out streams.
//!
//! The real host (QUIC, libp2p, ...) lives outside this workspace. For
//! tests and embedding experiments the [`testing`] module provides an
//! in-memory implementation.

mod error;
mod protocol;
mod stream;
pub mod testing;

pub use error::TransportError;
pub use protocol::{read_framed, write_framed, ProtocolId, RuntimeId, Version};
pub use stream::{PeerTransport, RpcStream};

use std::fmt;
use std::str::FromStr;

/// Identity of a remote peer — a 32-byte public-key-derived address.
///
/// Opaque to this layer: compared, hashed and logged, never interpreted.
/// Displayed and parsed as a hex string.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId([u8; 32]);

impl PeerId {
    /// Create from raw public-key bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw 32-byte address.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_string();
        write!(f, "PeerId({}...)", &hex[..12])
    }
}

impl FromStr for PeerId {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex32(s)
            .map(Self)
            .ok_or_else(|| TransportError::InvalidPeerId(s.to_string()))
    }
}

impl serde::Serialize for PeerId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for PeerId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Decode exactly 32 bytes of lowercase/uppercase hex.
pub(crate) fn parse_hex32(s: &str) -> Option<[u8; 32]> {
    if s.len() != 64 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let mut out = [0u8; 32];
    for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
        let pair = std::str::from_utf8(chunk).ok()?;
        out[i] = u8::from_str_radix(pair, 16).ok()?;
    }
    Some(out)
}
