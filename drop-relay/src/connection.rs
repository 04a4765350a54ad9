//! Live transport connections as seen by session records.

use drop_types::Reply;
use std::fmt;
use std::net::SocketAddr;
use tokio::sync::mpsc;

/// Relay-local identifier of one transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wrap a raw id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw id value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// A message queued for a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// JSON text reply.
    Reply(Reply),
    /// Data frame bytes, forwarded verbatim.
    Frame(Vec<u8>),
}

/// Handle to a connection's outbound queue.
///
/// Records store clones of this handle; the connection's writer task owns
/// the receiving half. Once the writer stops, [`PeerHandle::is_closed`]
/// reports `true`.
#[derive(Clone)]
pub struct PeerHandle {
    id: ConnectionId,
    addr: SocketAddr,
    tx: mpsc::UnboundedSender<Outgoing>,
}

impl PeerHandle {
    /// Create a handle and the queue its writer drains.
    pub fn new(id: ConnectionId, addr: SocketAddr) -> (Self, mpsc::UnboundedReceiver<Outgoing>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { id, addr, tx }, rx)
    }

    /// Connection id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Remote address captured at accept time.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Queue a message. Returns `false` if the connection is gone.
    pub fn send(&self, message: Outgoing) -> bool {
        self.tx.send(message).is_ok()
    }

    /// Queue a text reply.
    pub fn reply(&self, reply: Reply) -> bool {
        self.send(Outgoing::Reply(reply))
    }

    /// Whether the transport behind this handle has closed.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl fmt::Debug for PeerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerHandle")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}
