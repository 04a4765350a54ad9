//! # drop-types
//!
//! Wire format types for the sealdrop rendezvous relay.
//!
//! Two peers, a Sender and a Receiver, talk to the relay over one
//! WebSocket each. Every message on those sockets is one of:
//!
//! - a greeting: `I am Alice!|<token>` or `I am Bob!|<token>`
//! - a control message: `<token>|<command>|<argument>`
//! - a binary data frame: `<token>|data|<u32 LE offset><payload>`
//!
//! The relay answers with JSON [`Reply`] records. Payload bytes are sealed
//! by the peers and are never inspected here.
//!
//! This crate provides:
//! - [`SessionToken`], [`Role`] - Identity types
//! - [`Inbound`], [`Command`], [`FileInfo`] - Parsed peer messages
//! - [`DataFrame`] - Binary chunk framing
//! - [`Reply`] - Relay-to-peer messages
//! - [`CodecError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod command;
mod error;
mod frame;
mod reply;
mod token;

pub use command::{parse_text, Command, FileInfo, Inbound};
pub use error::CodecError;
pub use frame::DataFrame;
pub use reply::Reply;
pub use token::{Role, SessionToken};
