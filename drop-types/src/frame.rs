//! Binary data frames.
//!
//! Layout: `token bytes ‖ "|data|" ‖ offset (u32, little-endian) ‖ payload`.
//! The payload has no length prefix; it runs to the end of the frame.
//!
//! Only the token is found by scanning, and only within the first
//! `SessionToken::MAX_LEN + 1` bytes. Everything after it is sliced at fixed
//! positions, so a payload that happens to contain `|data|` is harmless.

use crate::error::{CodecError, CodecResult};
use crate::token::SessionToken;
use std::fmt;

/// A chunk of sealed payload addressed to a session.
///
/// Keeps the frame bytes exactly as received so the relay can forward
/// them verbatim.
#[derive(Clone, PartialEq, Eq)]
pub struct DataFrame {
    token: SessionToken,
    offset: u32,
    raw: Vec<u8>,
}

impl DataFrame {
    /// Marker between token and offset.
    pub const MARKER: &'static [u8] = b"|data|";

    /// Width of the offset field.
    pub const OFFSET_LEN: usize = 4;

    /// Parse a binary frame.
    pub fn parse(raw: Vec<u8>) -> CodecResult<Self> {
        let token_end = raw
            .iter()
            .take(SessionToken::MAX_LEN + 1)
            .position(|&b| b == b'|')
            .ok_or(CodecError::MissingDataMarker)?;

        let offset_start = token_end + Self::MARKER.len();
        let header_len = offset_start + Self::OFFSET_LEN;
        if raw.len() < header_len {
            return Err(CodecError::FrameTooShort {
                len: raw.len(),
                min: header_len,
            });
        }
        if &raw[token_end..offset_start] != Self::MARKER {
            return Err(CodecError::MissingDataMarker);
        }

        let token = std::str::from_utf8(&raw[..token_end]).map_err(|_| CodecError::NotUtf8)?;
        let token = SessionToken::parse(token)?;

        let mut offset = [0u8; Self::OFFSET_LEN];
        offset.copy_from_slice(&raw[offset_start..header_len]);

        Ok(Self {
            token,
            offset: u32::from_le_bytes(offset),
            raw,
        })
    }

    /// Build the wire bytes for a frame.
    pub fn encode(token: &SessionToken, offset: u32, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            token.as_bytes().len() + Self::MARKER.len() + Self::OFFSET_LEN + payload.len(),
        );
        out.extend_from_slice(token.as_bytes());
        out.extend_from_slice(Self::MARKER);
        out.extend_from_slice(&offset.to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    /// Session this frame belongs to.
    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    /// Byte offset of the chunk within the file.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Sealed payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.raw[self.header_len()..]
    }

    /// Total frame length in bytes.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Whether the frame carries no payload.
    pub fn is_empty(&self) -> bool {
        self.raw.len() == self.header_len()
    }

    /// The frame exactly as received.
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Consume the frame, returning the received bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.raw
    }

    fn header_len(&self) -> usize {
        self.token.as_bytes().len() + Self::MARKER.len() + Self::OFFSET_LEN
    }
}

impl fmt::Debug for DataFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataFrame")
            .field("token", &self.token)
            .field("offset", &self.offset)
            .field("payload_len", &self.payload().len())
            .finish()
    }
}
