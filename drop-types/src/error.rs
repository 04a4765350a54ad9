//! Error types for the sealdrop wire format.

use thiserror::Error;

/// Errors produced while parsing a peer message.
///
/// The `Display` text is what the relay sends back in an `ERROR` reply,
/// so it stays short and free of internal detail.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Control message without the `token|command|argument` shape.
    #[error("invalid message")]
    InvalidMessage,

    /// Greeting literal not followed by `|<token>`.
    #[error("invalid greeting")]
    InvalidGreeting,

    /// Session token failed validation.
    #[error("invalid id: {0}")]
    InvalidToken(&'static str),

    /// Command name not recognized.
    #[error("unknown command {0}")]
    UnknownCommand(String),

    /// `fileinfo` argument was not `{"name": .., "size": ..}`.
    #[error("invalid fileinfo")]
    InvalidFileInfo(#[source] serde_json::Error),

    /// `RCVD` argument was not a decimal u32.
    #[error("invalid offset {0:?}")]
    InvalidOffset(String),

    /// Binary frame shorter than its fixed header.
    #[error("data frame too short: {len} bytes (header needs {min})")]
    FrameTooShort {
        /// Actual frame length.
        len: usize,
        /// Header length implied by the token.
        min: usize,
    },

    /// Binary frame without `|data|` after the token.
    #[error("data frame missing |data| marker")]
    MissingDataMarker,

    /// Token bytes in a data frame are not UTF-8.
    #[error("data frame id is not valid UTF-8")]
    NotUtf8,
}

/// Result type alias for codec operations.
pub type CodecResult<T> = std::result::Result<T, CodecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(CodecError::InvalidMessage.to_string(), "invalid message");
        assert_eq!(
            CodecError::UnknownCommand("PUSH".into()).to_string(),
            "unknown command PUSH"
        );
        assert_eq!(
            CodecError::FrameTooShort { len: 3, min: 46 }.to_string(),
            "data frame too short: 3 bytes (header needs 46)"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CodecError>();
    }
}
