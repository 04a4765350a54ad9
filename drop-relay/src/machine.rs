//! Relay state machine.
//!
//! Given a locked [`SessionRecord`], the connection a message arrived on and
//! the parsed message, decide the record's next state and what to send to
//! whom. Nothing here performs I/O. The caller queues the resulting
//! [`Transition`]'s deliveries while it still holds the record lock, so each
//! session's outbound order matches the order decisions were made.
//!
//! Flow control is stop-and-wait with a window of one: after a chunk is
//! forwarded, the Sender may not send another until the Receiver's `RCVD`
//! for that exact offset has been relayed back.

use crate::connection::{Outgoing, PeerHandle};
use crate::error::{ProtocolError, ProtocolResult};
use crate::registry::SessionRecord;
use drop_types::{Command, DataFrame, FileInfo, Reply, Role, SessionToken};
use std::net::SocketAddr;

/// Who a delivery is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The connection the message arrived on.
    Origin,
    /// Whatever connection holds this role right now.
    Role(Role),
}

/// One message to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Recipient.
    pub target: Target,
    /// Payload.
    pub message: Outgoing,
}

/// Audit event for the telemetry sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryEvent {
    /// Sender announced metadata.
    FileInfo {
        /// Session.
        token: SessionToken,
        /// Announced metadata.
        info: FileInfo,
        /// Sender address.
        source: SocketAddr,
    },
    /// EOF relayed.
    TransferComplete {
        /// Session.
        token: SessionToken,
        /// Metadata, if it was ever announced.
        info: Option<FileInfo>,
        /// Receiver address, if bound.
        dest: Option<SocketAddr>,
    },
}

/// Outcome of one message.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Transition {
    /// Messages to deliver, in order.
    pub deliveries: Vec<Delivery>,
    /// Telemetry to emit after the lock is released.
    pub events: Vec<TelemetryEvent>,
}

impl Transition {
    fn send(mut self, target: Target, message: Outgoing) -> Self {
        self.deliveries.push(Delivery { target, message });
        self
    }

    fn reply(self, target: Target, reply: Reply) -> Self {
        self.send(target, Outgoing::Reply(reply))
    }

    fn event(mut self, event: TelemetryEvent) -> Self {
        self.events.push(event);
        self
    }

    /// Refusal sent back to the originating connection.
    pub fn reject(error: ProtocolError) -> Self {
        Self::default().reply(Target::Origin, Reply::error(error.to_string()))
    }

    /// Whether this transition refused the message.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self.deliveries.as_slice(),
            [Delivery {
                target: Target::Origin,
                message: Outgoing::Reply(Reply::Error { .. }),
            }]
        )
    }
}

fn settle(result: ProtocolResult<Transition>) -> Transition {
    result.unwrap_or_else(Transition::reject)
}

/// Refuse commands from the opposite side. Unbound connections may act
/// for any role.
fn permit(record: &SessionRecord, origin: &PeerHandle, expected: Role) -> ProtocolResult<()> {
    match record.role_of(origin.id()) {
        Some(role) if role != expected => Err(ProtocolError::WrongRole(role)),
        _ => Ok(()),
    }
}

fn ensure_open(record: &SessionRecord) -> ProtocolResult<()> {
    if record.is_cancelled() {
        Err(ProtocolError::Cancelled)
    } else if record.is_drained() {
        Err(ProtocolError::Finished)
    } else {
        Ok(())
    }
}

/// Bind `origin` to `role` and welcome it.
pub fn on_greeting(record: &mut SessionRecord, origin: &PeerHandle, role: Role) -> Transition {
    settle(greet(record, origin, role))
}

fn greet(record: &mut SessionRecord, origin: &PeerHandle, role: Role) -> ProtocolResult<Transition> {
    if record.role_of(origin.id()) == Some(role.other()) {
        return Err(ProtocolError::AlreadyBound(role.other()));
    }
    if let Some(previous) = record.bind(role, origin.clone()) {
        if previous.id() != origin.id() {
            tracing::info!(
                "{:?}: {} {} replaced by {}",
                record.token(),
                role,
                previous.id(),
                origin.id()
            );
        }
    }
    record.touch();
    tracing::info!("{:?}: {} bound from {}", record.token(), role, origin.addr());

    let welcome = match role {
        Role::Sender => Reply::SenderWelcome {
            token: record.token().clone(),
        },
        Role::Receiver => snapshot(record),
    };
    let mut transition = Transition::default().reply(Target::Origin, welcome);

    // A returning Sender may have missed the last RCVD while unbound.
    if role == Role::Sender && !record.awaiting_ack() && ensure_open(record).is_ok() {
        if let Some(offset) = record.last_offset() {
            transition = transition.reply(Target::Origin, Reply::Received { offset });
        }
    }
    Ok(transition)
}

/// Apply a control command.
pub fn on_command(record: &mut SessionRecord, origin: &PeerHandle, command: Command) -> Transition {
    record.touch();
    settle(match command {
        Command::FileInfo(info) => file_info(record, origin, info),
        Command::Ready { name } => ready(record, origin, &name),
        Command::Rcvd { offset } => received(record, origin, offset),
        Command::Eof => eof(record, origin),
        Command::Cancel => cancel(record, origin),
        Command::Ping => {
            tracing::debug!("{:?}: ping from {}", record.token(), origin.id());
            Ok(Transition::default())
        }
    })
}

/// Relay a data frame, enforcing stop-and-wait.
pub fn on_data(record: &mut SessionRecord, origin: &PeerHandle, frame: DataFrame) -> Transition {
    record.touch();
    settle(forward(record, origin, frame))
}

fn forward(
    record: &mut SessionRecord,
    origin: &PeerHandle,
    frame: DataFrame,
) -> ProtocolResult<Transition> {
    permit(record, origin, Role::Sender)?;
    ensure_open(record)?;
    if record.peer(Role::Receiver).is_none() {
        return Err(ProtocolError::PeerMissing(Role::Receiver));
    }
    let offset = frame.offset();
    if let Some(last) = record.last_offset() {
        if record.awaiting_ack() {
            // The in-flight chunk may be sent again, e.g. to a Receiver that
            // reconnected before reading it. Nothing past it may.
            if offset != last {
                return Err(ProtocolError::AwaitingAck(last));
            }
            tracing::debug!("{:?}: resending chunk at {}", record.token(), offset);
        } else if offset <= last {
            return Err(ProtocolError::OffsetRegression { offset, last });
        }
    }

    record.chunk_forwarded(offset);
    tracing::debug!(
        "{:?}: forwarding chunk at {} ({} bytes)",
        record.token(),
        offset,
        frame.payload().len()
    );
    Ok(Transition::default().send(
        Target::Role(Role::Receiver),
        Outgoing::Frame(frame.into_bytes()),
    ))
}

fn snapshot(record: &SessionRecord) -> Reply {
    Reply::Snapshot {
        token: record.token().clone(),
        name: record.file().map(|f| f.name.clone()),
        size: record.file().map(|f| f.size),
    }
}

fn file_info(
    record: &mut SessionRecord,
    origin: &PeerHandle,
    info: FileInfo,
) -> ProtocolResult<Transition> {
    permit(record, origin, Role::Sender)?;
    ensure_open(record)?;
    if record.last_offset().is_some() {
        return Err(ProtocolError::MetadataLocked);
    }

    tracing::debug!("{:?}: file info {} ({} bytes)", record.token(), info.name, info.size);
    record.set_file(info.clone());

    let mut transition = Transition::default()
        .reply(
            Target::Origin,
            Reply::FileInfoAccepted {
                name: info.name.clone(),
                size: info.size,
            },
        )
        .event(TelemetryEvent::FileInfo {
            token: record.token().clone(),
            info,
            source: origin.addr(),
        });
    if record.peer(Role::Receiver).is_some() {
        transition = transition.reply(Target::Role(Role::Receiver), snapshot(record));
    }
    Ok(transition)
}

fn ready(record: &mut SessionRecord, origin: &PeerHandle, name: &str) -> ProtocolResult<Transition> {
    permit(record, origin, Role::Receiver)?;
    ensure_open(record)?;
    if record.peer(Role::Sender).is_none() {
        return Err(ProtocolError::PeerMissing(Role::Sender));
    }

    record.mark_receiver_ready();
    tracing::debug!("{:?}: receiver ready for {:?}", record.token(), name);
    Ok(Transition::default().reply(
        Target::Role(Role::Sender),
        Reply::PeerReady {
            token: record.token().clone(),
        },
    ))
}

fn received(
    record: &mut SessionRecord,
    origin: &PeerHandle,
    offset: u32,
) -> ProtocolResult<Transition> {
    permit(record, origin, Role::Receiver)?;
    ensure_open(record)?;
    match record.last_offset() {
        Some(expected) if record.awaiting_ack() => {
            if offset != expected {
                return Err(ProtocolError::OffsetMismatch {
                    got: offset,
                    expected,
                });
            }
        }
        _ => return Err(ProtocolError::NothingInFlight(offset)),
    }

    record.chunk_acknowledged();
    if record.peer(Role::Sender).is_none() {
        tracing::debug!(
            "{:?}: ack for {} recorded, sender not connected",
            record.token(),
            offset
        );
    }
    Ok(Transition::default().reply(Target::Role(Role::Sender), Reply::Received { offset }))
}

fn eof(record: &mut SessionRecord, origin: &PeerHandle) -> ProtocolResult<Transition> {
    permit(record, origin, Role::Sender)?;
    ensure_open(record)?;
    if record.awaiting_ack() {
        if let Some(last) = record.last_offset() {
            return Err(ProtocolError::AwaitingAck(last));
        }
    }

    record.drain();
    tracing::info!("{:?}: transfer complete", record.token());
    Ok(Transition::default()
        .reply(Target::Role(Role::Receiver), Reply::Eof)
        .event(TelemetryEvent::TransferComplete {
            token: record.token().clone(),
            info: record.file().cloned(),
            dest: record.addr(Role::Receiver),
        }))
}

fn cancel(record: &mut SessionRecord, origin: &PeerHandle) -> ProtocolResult<Transition> {
    ensure_open(record)?;
    record.cancel();

    let targets: &[Role] = match record.role_of(origin.id()) {
        Some(Role::Sender) => &[Role::Receiver],
        Some(Role::Receiver) => &[Role::Sender],
        None => &[Role::Sender, Role::Receiver],
    };
    tracing::info!("{:?}: cancelled by {}", record.token(), origin.id());
    Ok(targets.iter().fold(Transition::default(), |t, role| {
        t.reply(Target::Role(*role), Reply::Cancel)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionId;
    use crate::registry::SessionState;

    struct Fixture {
        record: SessionRecord,
        sender: PeerHandle,
        receiver: PeerHandle,
        stranger: PeerHandle,
    }

    fn peer(id: u64) -> PeerHandle {
        let addr: SocketAddr = format!("192.0.2.{id}:4000").parse().unwrap();
        PeerHandle::new(ConnectionId::new(id), addr).0
    }

    fn token() -> SessionToken {
        SessionToken::parse("T1").unwrap()
    }

    fn frame(offset: u32, payload: &[u8]) -> DataFrame {
        DataFrame::parse(DataFrame::encode(&token(), offset, payload)).unwrap()
    }

    fn error_text(t: &Transition) -> String {
        match t.deliveries.as_slice() {
            [Delivery {
                target: Target::Origin,
                message: Outgoing::Reply(Reply::Error { detail }),
            }] => detail.clone(),
            other => panic!("expected a single error reply, got {:?}", other),
        }
    }

    /// Both roles bound, metadata announced.
    fn paired() -> Fixture {
        let mut f = Fixture {
            record: SessionRecord::new(token()),
            sender: peer(1),
            receiver: peer(2),
            stranger: peer(3),
        };
        on_greeting(&mut f.record, &f.sender, Role::Sender);
        on_command(
            &mut f.record,
            &f.sender,
            Command::FileInfo(FileInfo {
                name: "a.bin".into(),
                size: 10,
            }),
        );
        on_greeting(&mut f.record, &f.receiver, Role::Receiver);
        f
    }

    #[test]
    fn sender_greeting_replies_with_id() {
        let mut record = SessionRecord::new(token());
        let sender = peer(1);
        let t = on_greeting(&mut record, &sender, Role::Sender);
        assert_eq!(
            t.deliveries,
            vec![Delivery {
                target: Target::Origin,
                message: Outgoing::Reply(Reply::SenderWelcome { token: token() }),
            }]
        );
        assert_eq!(record.role_of(sender.id()), Some(Role::Sender));
    }

    #[test]
    fn receiver_greeting_returns_snapshot() {
        let f = paired();
        assert_eq!(f.record.state(), SessionState::PairedIdle);

        let mut record = SessionRecord::new(token());
        let t = on_greeting(&mut record, &f.receiver, Role::Receiver);
        assert_eq!(
            t.deliveries[0].message,
            Outgoing::Reply(Reply::Snapshot {
                token: token(),
                name: None,
                size: None,
            })
        );
    }

    #[test]
    fn one_connection_cannot_hold_both_roles() {
        let mut f = paired();
        let t = on_greeting(&mut f.record, &f.sender, Role::Receiver);
        assert_eq!(error_text(&t), "connection already bound as sender");
        assert_eq!(f.record.role_of(f.receiver.id()), Some(Role::Receiver));
    }

    #[test]
    fn fileinfo_is_acknowledged_and_audited() {
        let mut record = SessionRecord::new(token());
        let sender = peer(1);
        on_greeting(&mut record, &sender, Role::Sender);

        let info = FileInfo {
            name: "a.bin".into(),
            size: 10,
        };
        let t = on_command(&mut record, &sender, Command::FileInfo(info.clone()));
        assert_eq!(
            t.deliveries,
            vec![Delivery {
                target: Target::Origin,
                message: Outgoing::Reply(Reply::FileInfoAccepted {
                    name: "a.bin".into(),
                    size: 10,
                }),
            }]
        );
        assert_eq!(
            t.events,
            vec![TelemetryEvent::FileInfo {
                token: token(),
                info: info.clone(),
                source: sender.addr(),
            }]
        );
        assert_eq!(record.file(), Some(&info));
    }

    #[test]
    fn late_fileinfo_is_pushed_to_bound_receiver() {
        let mut record = SessionRecord::new(token());
        let (sender, receiver) = (peer(1), peer(2));
        on_greeting(&mut record, &sender, Role::Sender);
        on_greeting(&mut record, &receiver, Role::Receiver);

        let t = on_command(
            &mut record,
            &sender,
            Command::FileInfo(FileInfo {
                name: "late.txt".into(),
                size: 5,
            }),
        );
        assert_eq!(t.deliveries.len(), 2);
        assert_eq!(
            t.deliveries[1],
            Delivery {
                target: Target::Role(Role::Receiver),
                message: Outgoing::Reply(Reply::Snapshot {
                    token: token(),
                    name: Some("late.txt".into()),
                    size: Some(5),
                }),
            }
        );
    }

    #[test]
    fn ready_is_forwarded_to_sender() {
        let mut f = paired();
        let t = on_command(
            &mut f.record,
            &f.receiver,
            Command::Ready {
                name: "a.bin".into(),
            },
        );
        assert_eq!(
            t.deliveries,
            vec![Delivery {
                target: Target::Role(Role::Sender),
                message: Outgoing::Reply(Reply::PeerReady { token: token() }),
            }]
        );
        assert!(f.record.receiver_ready());
    }

    #[test]
    fn ready_without_sender_is_an_error() {
        let mut record = SessionRecord::new(token());
        let receiver = peer(2);
        on_greeting(&mut record, &receiver, Role::Receiver);
        let t = on_command(&mut record, &receiver, Command::Ready { name: String::new() });
        assert_eq!(error_text(&t), "sender is not connected");
    }

    #[test]
    fn data_frame_is_forwarded_verbatim() {
        let mut f = paired();
        let raw = DataFrame::encode(&token(), 0, b"P0");
        let t = on_data(&mut f.record, &f.sender, DataFrame::parse(raw.clone()).unwrap());
        assert_eq!(
            t.deliveries,
            vec![Delivery {
                target: Target::Role(Role::Receiver),
                message: Outgoing::Frame(raw),
            }]
        );
        assert_eq!(f.record.last_offset(), Some(0));
        assert!(f.record.awaiting_ack());
        assert_eq!(f.record.state(), SessionState::Transferring);
    }

    #[test]
    fn second_chunk_without_ack_is_not_relayed() {
        let mut f = paired();
        on_data(&mut f.record, &f.sender, frame(0, b"P0"));

        let t = on_data(&mut f.record, &f.sender, frame(1024, b"P1"));
        assert!(t.is_rejection());
        assert_eq!(error_text(&t), "chunk at offset 0 has not been acknowledged");
        assert_eq!(f.record.last_offset(), Some(0));
    }

    #[test]
    fn ack_unlocks_next_chunk() {
        let mut f = paired();
        on_data(&mut f.record, &f.sender, frame(0, b"P0"));

        let t = on_command(&mut f.record, &f.receiver, Command::Rcvd { offset: 0 });
        assert_eq!(
            t.deliveries,
            vec![Delivery {
                target: Target::Role(Role::Sender),
                message: Outgoing::Reply(Reply::Received { offset: 0 }),
            }]
        );
        assert!(!f.record.awaiting_ack());

        let t = on_data(&mut f.record, &f.sender, frame(1024, b"P1"));
        assert!(!t.is_rejection());
        assert_eq!(f.record.last_offset(), Some(1024));
    }

    #[test]
    fn offsets_never_move_backwards() {
        let mut f = paired();
        on_data(&mut f.record, &f.sender, frame(2048, b"x"));
        on_command(&mut f.record, &f.receiver, Command::Rcvd { offset: 2048 });

        for offset in [0, 2048] {
            let t = on_data(&mut f.record, &f.sender, frame(offset, b"x"));
            assert!(t.is_rejection(), "offset {offset} should be refused");
        }
        assert_eq!(f.record.last_offset(), Some(2048));
    }

    #[test]
    fn mismatched_ack_is_rejected() {
        let mut f = paired();
        on_data(&mut f.record, &f.sender, frame(0, b"P0"));

        let t = on_command(&mut f.record, &f.receiver, Command::Rcvd { offset: 7 });
        assert_eq!(error_text(&t), "offset mismatch: got 7, expected 0");
        assert!(f.record.awaiting_ack());

        let t = on_command(&mut f.record, &f.receiver, Command::Rcvd { offset: 0 });
        assert!(!t.is_rejection());
        let t = on_command(&mut f.record, &f.receiver, Command::Rcvd { offset: 0 });
        assert_eq!(error_text(&t), "no chunk awaiting acknowledgement (got 0)");
    }

    #[test]
    fn data_requires_a_receiver() {
        let mut record = SessionRecord::new(token());
        let sender = peer(1);
        on_greeting(&mut record, &sender, Role::Sender);
        let t = on_data(&mut record, &sender, frame(0, b"P0"));
        assert_eq!(error_text(&t), "receiver is not connected");
        assert_eq!(record.last_offset(), None);
    }

    #[test]
    fn receiver_cannot_send_data_and_sender_cannot_ack() {
        let mut f = paired();
        let t = on_data(&mut f.record, &f.receiver, frame(0, b"P0"));
        assert_eq!(error_text(&t), "command not permitted for receiver");

        on_data(&mut f.record, &f.sender, frame(0, b"P0"));
        let t = on_command(&mut f.record, &f.sender, Command::Rcvd { offset: 0 });
        assert_eq!(error_text(&t), "command not permitted for sender");
    }

    #[test]
    fn eof_drains_and_forwards() {
        let mut f = paired();
        on_data(&mut f.record, &f.sender, frame(0, b"P0"));
        on_command(&mut f.record, &f.receiver, Command::Rcvd { offset: 0 });

        let t = on_command(&mut f.record, &f.sender, Command::Eof);
        assert_eq!(
            t.deliveries,
            vec![Delivery {
                target: Target::Role(Role::Receiver),
                message: Outgoing::Reply(Reply::Eof),
            }]
        );
        assert_eq!(
            t.events,
            vec![TelemetryEvent::TransferComplete {
                token: token(),
                info: Some(FileInfo {
                    name: "a.bin".into(),
                    size: 10,
                }),
                dest: Some(f.receiver.addr()),
            }]
        );
        assert_eq!(f.record.state(), SessionState::Drained);

        let t = on_data(&mut f.record, &f.sender, frame(1024, b"late"));
        assert_eq!(error_text(&t), "transfer already finished");
        let t = on_command(&mut f.record, &f.sender, Command::Eof);
        assert_eq!(error_text(&t), "transfer already finished");
    }

    #[test]
    fn eof_waits_for_last_ack() {
        let mut f = paired();
        on_data(&mut f.record, &f.sender, frame(0, b"P0"));
        let t = on_command(&mut f.record, &f.sender, Command::Eof);
        assert_eq!(error_text(&t), "chunk at offset 0 has not been acknowledged");
        assert!(!f.record.is_drained());
    }

    #[test]
    fn cancel_notifies_the_other_side() {
        let mut f = paired();
        let t = on_command(&mut f.record, &f.sender, Command::Cancel);
        assert_eq!(
            t.deliveries,
            vec![Delivery {
                target: Target::Role(Role::Receiver),
                message: Outgoing::Reply(Reply::Cancel),
            }]
        );
        assert_eq!(f.record.state(), SessionState::Cancelled);

        let t = on_data(&mut f.record, &f.sender, frame(0, b"P0"));
        assert_eq!(error_text(&t), "transfer was cancelled");
        let t = on_command(&mut f.record, &f.receiver, Command::Cancel);
        assert_eq!(error_text(&t), "transfer was cancelled");
    }

    #[test]
    fn cancel_from_unbound_connection_reaches_both() {
        let mut f = paired();
        let t = on_command(&mut f.record, &f.stranger, Command::Cancel);
        let targets: Vec<_> = t.deliveries.iter().map(|d| d.target).collect();
        assert_eq!(
            targets,
            vec![Target::Role(Role::Sender), Target::Role(Role::Receiver)]
        );
    }

    #[test]
    fn ping_changes_nothing() {
        let mut f = paired();
        let t = on_command(&mut f.record, &f.receiver, Command::Ping);
        assert_eq!(t, Transition::default());
        assert_eq!(f.record.state(), SessionState::PairedIdle);
    }

    #[test]
    fn unbound_connection_may_act_for_a_role() {
        let mut f = paired();
        let t = on_command(
            &mut f.record,
            &f.stranger,
            Command::Ready {
                name: String::new(),
            },
        );
        assert!(!t.is_rejection());
    }

    #[test]
    fn fileinfo_is_refused_once_chunks_flow() {
        let mut f = paired();
        let info = || {
            Command::FileInfo(FileInfo {
                name: "b.bin".into(),
                size: 20,
            })
        };

        on_data(&mut f.record, &f.sender, frame(0, b"P0"));
        let t = on_command(&mut f.record, &f.sender, info());
        assert_eq!(
            error_text(&t),
            "file metadata cannot change once chunks are flowing"
        );
        assert!(t.events.is_empty());

        on_command(&mut f.record, &f.receiver, Command::Rcvd { offset: 0 });
        on_command(&mut f.record, &f.sender, Command::Eof);
        let t = on_command(&mut f.record, &f.sender, info());
        assert_eq!(error_text(&t), "transfer already finished");
        assert_eq!(f.record.file().map(|i| i.size), Some(10));
    }

    #[test]
    fn fileinfo_is_refused_after_cancel() {
        let mut f = paired();
        on_command(&mut f.record, &f.receiver, Command::Cancel);
        let t = on_command(
            &mut f.record,
            &f.sender,
            Command::FileInfo(FileInfo {
                name: "b.bin".into(),
                size: 20,
            }),
        );
        assert_eq!(error_text(&t), "transfer was cancelled");
        assert_eq!(f.record.file().map(|i| i.name.as_str()), Some("a.bin"));
    }

    #[test]
    fn in_flight_chunk_reaches_a_reconnected_receiver() {
        let mut f = paired();
        on_data(&mut f.record, &f.sender, frame(0, b"P0"));

        // Old Receiver drops before reading the chunk.
        f.record.unbind(f.receiver.id());
        let replacement = peer(9);
        on_greeting(&mut f.record, &replacement, Role::Receiver);

        let raw = DataFrame::encode(&token(), 0, b"P0");
        let t = on_data(&mut f.record, &f.sender, DataFrame::parse(raw.clone()).unwrap());
        assert_eq!(
            t.deliveries,
            vec![Delivery {
                target: Target::Role(Role::Receiver),
                message: Outgoing::Frame(raw),
            }]
        );

        // Still a window of one: nothing past the in-flight chunk.
        let t = on_data(&mut f.record, &f.sender, frame(1024, b"P1"));
        assert_eq!(error_text(&t), "chunk at offset 0 has not been acknowledged");

        let t = on_command(&mut f.record, &replacement, Command::Rcvd { offset: 0 });
        assert!(!t.is_rejection());
        let t = on_data(&mut f.record, &f.sender, frame(1024, b"P1"));
        assert!(!t.is_rejection());
    }

    #[test]
    fn returning_sender_learns_acknowledged_offset() {
        let mut f = paired();
        on_data(&mut f.record, &f.sender, frame(0, b"P0"));

        // Sender drops; the ack arrives while it is away.
        f.record.unbind(f.sender.id());
        let t = on_command(&mut f.record, &f.receiver, Command::Rcvd { offset: 0 });
        assert!(!t.is_rejection());

        let replacement = peer(8);
        let t = on_greeting(&mut f.record, &replacement, Role::Sender);
        assert_eq!(
            t.deliveries,
            vec![
                Delivery {
                    target: Target::Origin,
                    message: Outgoing::Reply(Reply::SenderWelcome { token: token() }),
                },
                Delivery {
                    target: Target::Origin,
                    message: Outgoing::Reply(Reply::Received { offset: 0 }),
                },
            ]
        );

        let t = on_data(&mut f.record, &replacement, frame(1024, b"P1"));
        assert!(!t.is_rejection());
    }

    #[test]
    fn returning_sender_with_chunk_in_flight_gets_plain_welcome() {
        let mut f = paired();
        on_data(&mut f.record, &f.sender, frame(0, b"P0"));
        f.record.unbind(f.sender.id());

        let replacement = peer(8);
        let t = on_greeting(&mut f.record, &replacement, Role::Sender);
        assert_eq!(t.deliveries.len(), 1);

        // Resending the unacknowledged chunk is how it recovers.
        let t = on_data(&mut f.record, &replacement, frame(0, b"P0"));
        assert!(!t.is_rejection());
    }

    #[test]
    fn reconnecting_receiver_keeps_progress() {
        let mut f = paired();
        on_data(&mut f.record, &f.sender, frame(0, b"P0"));

        let replacement = peer(9);
        on_greeting(&mut f.record, &replacement, Role::Receiver);
        assert!(f.record.awaiting_ack());

        let t = on_command(&mut f.record, &replacement, Command::Rcvd { offset: 0 });
        assert!(!t.is_rejection());
    }
}
