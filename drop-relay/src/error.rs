//! Error types for drop-relay.

use drop_types::{CodecError, Role};
use std::path::PathBuf;

/// Main error type for drop-relay operations.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Telemetry store error.
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Telemetry store errors.
///
/// These are logged by the relay and never reach a peer.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Database path error.
    #[error("invalid database path: {path}")]
    InvalidPath {
        /// The invalid path.
        path: PathBuf,
    },
}

/// Why a peer's message was refused.
///
/// The `Display` text becomes the `error` field of the `ERROR` reply sent
/// back to the originating connection. Session state is left unchanged.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Message could not be parsed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Token not present in the registry.
    #[error("unknown id {0}")]
    UnknownSession(String),

    /// Command sent from the wrong side of the session.
    #[error("command not permitted for {0}")]
    WrongRole(Role),

    /// Connection tried to claim both roles.
    #[error("connection already bound as {0}")]
    AlreadyBound(Role),

    /// Counterpart needed for this command is absent.
    #[error("{0} is not connected")]
    PeerMissing(Role),

    /// EOF already relayed.
    #[error("transfer already finished")]
    Finished,

    /// Session was cancelled.
    #[error("transfer was cancelled")]
    Cancelled,

    /// A chunk is still in flight.
    #[error("chunk at offset {0} has not been acknowledged")]
    AwaitingAck(u32),

    /// Chunk offset does not move forward.
    #[error("offset {offset} does not advance past {last}")]
    OffsetRegression {
        /// Offending offset.
        offset: u32,
        /// Last forwarded offset.
        last: u32,
    },

    /// `RCVD` for a chunk other than the one in flight.
    #[error("offset mismatch: got {got}, expected {expected}")]
    OffsetMismatch {
        /// Offset in the `RCVD`.
        got: u32,
        /// Offset in flight.
        expected: u32,
    },

    /// `RCVD` with nothing in flight.
    #[error("no chunk awaiting acknowledgement (got {0})")]
    NothingInFlight(u32),

    /// `fileinfo` after chunks started moving.
    #[error("file metadata cannot change once chunks are flowing")]
    MetadataLocked,
}

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Result type alias for protocol decisions.
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;
