//! Session registry.
//!
//! Maps a [`SessionToken`] to its [`SessionRecord`]. The map itself is a
//! `DashMap`, whose shard locks only cover insert, lookup and removal.
//! Each record sits behind its own mutex, so frames for unrelated sessions
//! never contend on a shared lock.

use crate::connection::{ConnectionId, PeerHandle};
use dashmap::DashMap;
use drop_types::{FileInfo, Role, SessionToken};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Shared handle to one record.
pub type SharedRecord = Arc<Mutex<SessionRecord>>;

/// Lifecycle stage of a session, derived from the record's fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// At most one role has ever bound and no chunk has moved.
    Unpaired,
    /// Both roles have bound at least once; no chunk has moved yet.
    PairedIdle,
    /// At least one chunk has been forwarded.
    Transferring,
    /// EOF relayed.
    Drained,
    /// A peer cancelled.
    Cancelled,
}

/// Per-session state.
#[derive(Debug)]
pub struct SessionRecord {
    token: SessionToken,
    file: Option<FileInfo>,
    sender: Option<PeerHandle>,
    receiver: Option<PeerHandle>,
    sender_seen: bool,
    receiver_seen: bool,
    receiver_ready: bool,
    last_offset: Option<u32>,
    awaiting_ack: bool,
    drained: bool,
    cancelled: bool,
    created_at: Instant,
    last_activity: Instant,
}

impl SessionRecord {
    /// Create an empty record.
    pub fn new(token: SessionToken) -> Self {
        let now = Instant::now();
        Self {
            token,
            file: None,
            sender: None,
            receiver: None,
            sender_seen: false,
            receiver_seen: false,
            receiver_ready: false,
            last_offset: None,
            awaiting_ack: false,
            drained: false,
            cancelled: false,
            created_at: now,
            last_activity: now,
        }
    }

    /// Session token.
    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    /// Announced file metadata.
    pub fn file(&self) -> Option<&FileInfo> {
        self.file.as_ref()
    }

    pub(crate) fn set_file(&mut self, info: FileInfo) {
        self.file = Some(info);
    }

    /// Connection bound to `role`, if any.
    pub fn peer(&self, role: Role) -> Option<&PeerHandle> {
        match role {
            Role::Sender => self.sender.as_ref(),
            Role::Receiver => self.receiver.as_ref(),
        }
    }

    /// Address captured when `role` bound.
    pub fn addr(&self, role: Role) -> Option<SocketAddr> {
        self.peer(role).map(PeerHandle::addr)
    }

    /// Role that `conn` holds in this session.
    pub fn role_of(&self, conn: ConnectionId) -> Option<Role> {
        if self.sender.as_ref().is_some_and(|p| p.id() == conn) {
            Some(Role::Sender)
        } else if self.receiver.as_ref().is_some_and(|p| p.id() == conn) {
            Some(Role::Receiver)
        } else {
            None
        }
    }

    /// Bind `peer` to `role`, replacing any previous binding.
    ///
    /// Returns the connection that was displaced, if any.
    pub fn bind(&mut self, role: Role, peer: PeerHandle) -> Option<PeerHandle> {
        let slot = match role {
            Role::Sender => {
                self.sender_seen = true;
                &mut self.sender
            }
            Role::Receiver => {
                self.receiver_seen = true;
                &mut self.receiver
            }
        };
        slot.replace(peer)
    }

    /// Clear whichever role `conn` holds.
    pub fn unbind(&mut self, conn: ConnectionId) -> Option<Role> {
        let role = self.role_of(conn)?;
        self.unbind_role(role);
        Some(role)
    }

    pub(crate) fn unbind_role(&mut self, role: Role) -> Option<PeerHandle> {
        match role {
            Role::Sender => self.sender.take(),
            Role::Receiver => self.receiver.take(),
        }
    }

    /// Whether neither role is bound.
    pub fn is_empty(&self) -> bool {
        self.sender.is_none() && self.receiver.is_none()
    }

    /// Whether any role has ever bound.
    pub fn was_claimed(&self) -> bool {
        self.sender_seen || self.receiver_seen
    }

    /// Whether the Receiver has sent `ready`.
    pub fn receiver_ready(&self) -> bool {
        self.receiver_ready
    }

    pub(crate) fn mark_receiver_ready(&mut self) {
        self.receiver_ready = true;
    }

    /// Offset of the last chunk forwarded to the Receiver.
    pub fn last_offset(&self) -> Option<u32> {
        self.last_offset
    }

    /// Whether the last forwarded chunk still needs an `RCVD`.
    pub fn awaiting_ack(&self) -> bool {
        self.awaiting_ack
    }

    pub(crate) fn chunk_forwarded(&mut self, offset: u32) {
        self.last_offset = Some(offset);
        self.awaiting_ack = true;
    }

    pub(crate) fn chunk_acknowledged(&mut self) {
        self.awaiting_ack = false;
    }

    /// Whether EOF has been relayed.
    pub fn is_drained(&self) -> bool {
        self.drained
    }

    pub(crate) fn drain(&mut self) {
        self.drained = true;
    }

    /// Whether a peer cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub(crate) fn cancel(&mut self) {
        self.cancelled = true;
        self.awaiting_ack = false;
    }

    /// Current lifecycle stage.
    pub fn state(&self) -> SessionState {
        if self.cancelled {
            SessionState::Cancelled
        } else if self.drained {
            SessionState::Drained
        } else if self.last_offset.is_some() {
            SessionState::Transferring
        } else if self.sender_seen && self.receiver_seen {
            SessionState::PairedIdle
        } else {
            SessionState::Unpaired
        }
    }

    /// Record activity now.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Time since the record was created.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Time since the last command or frame.
    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }
}

/// Concurrency-safe token → record store.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    records: DashMap<SessionToken, SharedRecord>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh record. Returns `false` if the token already exists.
    pub fn create(&self, token: SessionToken) -> bool {
        match self.records.entry(token) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let record = SessionRecord::new(slot.key().clone());
                slot.insert(Arc::new(Mutex::new(record)));
                true
            }
        }
    }

    /// Look up a record.
    pub fn get(&self, token: &SessionToken) -> Option<SharedRecord> {
        self.records.get(token).map(|entry| entry.value().clone())
    }

    /// Run `f` on the record under its lock.
    ///
    /// Returns `None` if the token is unknown, or if the record was removed
    /// while waiting for its lock.
    pub async fn with_record<R>(
        &self,
        token: &SessionToken,
        f: impl FnOnce(&mut SessionRecord) -> R,
    ) -> Option<R> {
        let record = self.get(token)?;
        let mut guard = record.lock().await;
        let current = self
            .records
            .get(token)
            .is_some_and(|entry| Arc::ptr_eq(entry.value(), &record));
        if !current {
            return None;
        }
        Some(f(&mut *guard))
    }

    /// Remove a record.
    pub fn delete(&self, token: &SessionToken) -> bool {
        self.records.remove(token).is_some()
    }

    /// Remove a record if `pred` holds for it.
    ///
    /// Records currently locked by another task are left alone.
    pub fn remove_if(&self, token: &SessionToken, pred: impl FnOnce(&SessionRecord) -> bool) -> bool {
        self.records
            .remove_if(token, |_, record| {
                record.try_lock().map(|guard| pred(&*guard)).unwrap_or(false)
            })
            .is_some()
    }

    /// Point-in-time list of all records, for the sweep.
    pub fn snapshot(&self) -> Vec<(SessionToken, SharedRecord)> {
        self.records
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Whether `token` is registered.
    pub fn contains(&self, token: &SessionToken) -> bool {
        self.records.contains_key(token)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the registry holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
