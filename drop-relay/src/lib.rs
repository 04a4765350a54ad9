//! # drop-relay
//!
//! Rendezvous relay for sealdrop file transfers.
//!
//! This crate implements a relay server that:
//! - Pairs a Sender and a Receiver browser under one session token
//! - Forwards sealed chunks from Sender to Receiver, one at a time
//! - Tells the surviving peer when the other one disconnects
//! - Sweeps away sessions both peers have abandoned
//! - Never looks inside a chunk (payloads are sealed by the peers)
//!
//! ## Architecture
//!
//! ```text
//! Sender ──┐                        ┌── Receiver
//!          │       WebSocket        │
//!          ├───────────────────────►│
//!          │                        │
//!      ┌───┴────────────────────────┴───┐
//!      │           drop-relay           │
//!      │  ┌──────────────────────────┐  │
//!      │  │ registry → state machine │  │
//!      │  └──────────────────────────┘  │
//!      │  ┌──────────────────────────┐  │
//!      │  │   SQLite (audit trail)   │  │
//!      │  └──────────────────────────┘  │
//!      └────────────────────────────────┘
//! ```
//!
//! ## Protocol
//!
//! Flow control is stop-and-wait:
//! - Sender → `fileinfo` → Receiver joins and gets a metadata snapshot
//! - Receiver → `ready` → Sender gets `bob is ready`
//! - Sender → data frame at offset N → Receiver
//! - Receiver → `RCVD|N` → Sender may send the next chunk
//! - Sender → `EOF` → Receiver

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cleanup;
pub mod config;
pub mod connection;
pub mod error;
pub mod http;
pub mod limits;
pub mod machine;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod telemetry;
