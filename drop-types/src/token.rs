//! Identity types for sealdrop sessions.

use crate::error::CodecError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque key naming one transfer attempt.
///
/// Issued as a UUID v4 string, but any non-empty string without `|` and
/// at most [`SessionToken::MAX_LEN`] bytes long is accepted so that tokens
/// minted by an external front end work unchanged.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionToken(String);

impl SessionToken {
    /// Maximum token length in bytes.
    pub const MAX_LEN: usize = 64;

    /// Create a new random token.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Validate and wrap a token string.
    pub fn parse(raw: &str) -> Result<Self, CodecError> {
        if raw.is_empty() {
            return Err(CodecError::InvalidToken("empty"));
        }
        if raw.len() > Self::MAX_LEN {
            return Err(CodecError::InvalidToken("too long"));
        }
        if raw.contains('|') {
            return Err(CodecError::InvalidToken("contains '|'"));
        }
        Ok(Self(raw.to_string()))
    }

    /// Whether `raw` is what a browser client sends before it knows its
    /// token (`${undefined}` and friends).
    pub fn is_placeholder(raw: &str) -> bool {
        matches!(raw, "" | "undefined" | "null")
    }

    /// Get the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the UTF-8 bytes of the token, as they appear in data frames.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = self.0.char_indices().nth(8).map_or(self.0.len(), |(i, _)| i);
        write!(f, "SessionToken({})", &self.0[..end])
    }
}

impl FromStr for SessionToken {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SessionToken {
    type Error = CodecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SessionToken> for String {
    fn from(token: SessionToken) -> Self {
        token.0
    }
}

/// The two roles a connection can take inside a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Peer that owns the file and pushes chunks.
    Sender,
    /// Peer that downloads the chunks.
    Receiver,
}

impl Role {
    /// Greeting literal that claims this role.
    pub const fn greeting(self) -> &'static str {
        match self {
            Role::Sender => "I am Alice!",
            Role::Receiver => "I am Bob!",
        }
    }

    /// The counterpart role.
    pub const fn other(self) -> Role {
        match self {
            Role::Sender => Role::Receiver,
            Role::Receiver => Role::Sender,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Sender => f.write_str("sender"),
            Role::Receiver => f.write_str("receiver"),
        }
    }
}
