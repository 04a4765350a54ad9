//! Relay-to-peer messages.
//!
//! Every reply is a JSON object with a `result` field. The browser clients
//! switch on `result`, so the shapes here are fixed.

use crate::token::SessionToken;
use serde_json::{json, Value};

/// A text message sent by the relay to a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Sender greeting accepted.
    SenderWelcome {
        /// Bound session.
        token: SessionToken,
    },
    /// Receiver greeting accepted, or file metadata changed.
    Snapshot {
        /// Bound session.
        token: SessionToken,
        /// File name, if the Sender announced it yet.
        name: Option<String>,
        /// File size, if the Sender announced it yet.
        size: Option<u64>,
    },
    /// `fileinfo` stored.
    FileInfoAccepted {
        /// Stored name.
        name: String,
        /// Stored size.
        size: u64,
    },
    /// Receiver sent `ready`; delivered to the Sender.
    PeerReady {
        /// Session that is ready.
        token: SessionToken,
    },
    /// Receiver acknowledged a chunk; delivered to the Sender.
    Received {
        /// Acknowledged offset.
        offset: u32,
    },
    /// End of stream; delivered to the Receiver.
    Eof,
    /// Transfer aborted by the other peer.
    Cancel,
    /// Something went wrong.
    Error {
        /// Human-readable detail.
        detail: String,
    },
}

impl Reply {
    /// Build an error reply.
    pub fn error(detail: impl Into<String>) -> Self {
        Reply::Error {
            detail: detail.into(),
        }
    }

    /// The `result` tag of this reply.
    pub fn result(&self) -> &'static str {
        match self {
            Reply::SenderWelcome { .. } | Reply::Snapshot { .. } | Reply::FileInfoAccepted { .. } => {
                "OK"
            }
            Reply::PeerReady { .. } => "bob is ready",
            Reply::Received { .. } => "RCVD",
            Reply::Eof => "EOF",
            Reply::Cancel => "CANCEL",
            Reply::Error { .. } => "ERROR",
        }
    }

    /// JSON form of the reply.
    pub fn to_json(&self) -> Value {
        let result = self.result();
        match self {
            Reply::SenderWelcome { token } => json!({ "result": result, "id": token }),
            Reply::Snapshot { token, name, size } => json!({
                "result": result,
                "uuid": token,
                "name": name,
                "size": size,
            }),
            Reply::FileInfoAccepted { name, size } => json!({
                "result": result,
                "fileinfo": format!("{name} ({size} bytes)"),
            }),
            Reply::PeerReady { token } => json!({ "result": result, "id": token }),
            Reply::Received { offset } => json!({ "result": result, "offset": offset }),
            Reply::Eof | Reply::Cancel => json!({ "result": result }),
            Reply::Error { detail } => json!({ "result": result, "error": detail }),
        }
    }

    /// Serialized text frame.
    pub fn to_text(&self) -> String {
        self.to_json().to_string()
    }
}
