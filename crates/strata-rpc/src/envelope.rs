//! RPC wire envelopes.
//!
//! A call is one [`Request`] frame answered by one [`Response`] frame,
//! both MessagePack over the transport's length-delimited framing. The
//! request body and success payload are opaque bytes — this layer frames
//! and routes, the caller owns the payload schema.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RpcError;

/// A framed RPC request: method name plus a pre-serialized body.
///
/// Built once per logical call and reused across every attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub method: String,
    pub body: Vec<u8>,
}

impl Request {
    pub fn new(method: &str, body: Vec<u8>) -> Self {
        Self {
            method: method.to_string(),
            body,
        }
    }

    /// Serialize to MessagePack bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, RpcError> {
        rmp_serde::to_vec(self).map_err(Into::into)
    }

    /// Deserialize from MessagePack bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, RpcError> {
        rmp_serde::from_slice(data).map_err(Into::into)
    }
}

/// Error descriptor a peer returns instead of a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub module: String,
    pub code: u32,
    pub message: String,
}

impl fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: code {}: {}", self.module, self.code, self.message)
    }
}

/// A framed RPC response: a success payload or a declared error, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    Ok(Vec<u8>),
    Error(ErrorBody),
}

impl Response {
    pub fn to_bytes(&self) -> Result<Vec<u8>, RpcError> {
        rmp_serde::to_vec(self).map_err(Into::into)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, RpcError> {
        rmp_serde::from_slice(data).map_err(Into::into)
    }
}
