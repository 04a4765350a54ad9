//! Text messages sent by peers.
//!
//! Control messages are `token|command|argument`. Only the first two pipes
//! separate fields; the argument may contain further pipes or be empty.

use crate::error::{CodecError, CodecResult};
use crate::token::{Role, SessionToken};
use serde::{Deserialize, Serialize};

/// File metadata announced by the Sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Display name, opaque to the relay.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
}

/// Control command carried by a text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Sender announces file metadata.
    FileInfo(FileInfo),
    /// Receiver is ready to accept chunks.
    Ready {
        /// Informational display name.
        name: String,
    },
    /// Receiver acknowledges the chunk at `offset`.
    Rcvd {
        /// Offset of the acknowledged chunk.
        offset: u32,
    },
    /// Sender has sent every chunk.
    Eof,
    /// Either peer aborts the transfer.
    Cancel,
    /// Keepalive.
    Ping,
}

impl Command {
    /// Wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::FileInfo(_) => "fileinfo",
            Command::Ready { .. } => "ready",
            Command::Rcvd { .. } => "RCVD",
            Command::Eof => "EOF",
            Command::Cancel => "CANCEL",
            Command::Ping => "PING",
        }
    }

    fn parse(command: &str, argument: &str) -> CodecResult<Self> {
        match command {
            "fileinfo" => serde_json::from_str(argument)
                .map(Command::FileInfo)
                .map_err(CodecError::InvalidFileInfo),
            "ready" => Ok(Command::Ready {
                name: argument.to_string(),
            }),
            "RCVD" => argument
                .parse::<u32>()
                .map(|offset| Command::Rcvd { offset })
                .map_err(|_| CodecError::InvalidOffset(argument.to_string())),
            "EOF" => Ok(Command::Eof),
            "CANCEL" => Ok(Command::Cancel),
            "PING" => Ok(Command::Ping),
            other => Err(CodecError::UnknownCommand(other.to_string())),
        }
    }
}

/// A parsed text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Role claim for a session.
    Greeting {
        /// Role being claimed.
        role: Role,
        /// Session to bind into.
        token: SessionToken,
    },
    /// Token-addressed control command.
    Control {
        /// Target session.
        token: SessionToken,
        /// The command.
        command: Command,
    },
    /// Keepalive sent before the client learned its token; ignored.
    Noise,
}

/// Parse a text message from a peer.
pub fn parse_text(text: &str) -> CodecResult<Inbound> {
    for role in [Role::Sender, Role::Receiver] {
        if let Some(rest) = text.strip_prefix(role.greeting()) {
            let raw = rest.strip_prefix('|').ok_or(CodecError::InvalidGreeting)?;
            return Ok(Inbound::Greeting {
                role,
                token: SessionToken::parse(raw)?,
            });
        }
    }

    let mut parts = text.splitn(3, '|');
    let (raw_token, command, argument) = match (parts.next(), parts.next(), parts.next()) {
        (Some(t), Some(c), Some(a)) => (t, c, a),
        _ => return Err(CodecError::InvalidMessage),
    };

    if command == "PING" && SessionToken::is_placeholder(raw_token) {
        return Ok(Inbound::Noise);
    }

    let token = SessionToken::parse(raw_token)?;
    let command = Command::parse(command, argument)?;
    Ok(Inbound::Control { token, command })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "6f1d2c3b-0a4e-4a8f-9b1c-2d3e4f5a6b7c";

    fn control(text: &str) -> Command {
        match parse_text(text).unwrap() {
            Inbound::Control { token, command } => {
                assert_eq!(token.as_str(), TOKEN);
                command
            }
            other => panic!("expected control message, got {:?}", other),
        }
    }

    #[test]
    fn parses_greetings() {
        let sender = parse_text(&format!("I am Alice!|{TOKEN}")).unwrap();
        assert_eq!(
            sender,
            Inbound::Greeting {
                role: Role::Sender,
                token: SessionToken::parse(TOKEN).unwrap(),
            }
        );

        let receiver = parse_text(&format!("I am Bob!|{TOKEN}")).unwrap();
        assert!(matches!(
            receiver,
            Inbound::Greeting {
                role: Role::Receiver,
                ..
            }
        ));
    }

    #[test]
    fn greeting_without_token_is_rejected() {
        assert!(matches!(
            parse_text("I am Alice!"),
            Err(CodecError::InvalidGreeting)
        ));
        assert!(matches!(
            parse_text("I am Bob!|"),
            Err(CodecError::InvalidToken(_))
        ));
    }

    #[test]
    fn parses_fileinfo() {
        let cmd = control(&format!(
            r#"{TOKEN}|fileinfo|{{"name":"a.bin","size":10}}"#
        ));
        assert_eq!(
            cmd,
            Command::FileInfo(FileInfo {
                name: "a.bin".into(),
                size: 10
            })
        );
    }

    #[test]
    fn fileinfo_argument_may_contain_pipes() {
        let cmd = control(&format!(
            r#"{TOKEN}|fileinfo|{{"name":"a|b|c.txt","size":3}}"#
        ));
        assert_eq!(cmd.name(), "fileinfo");
        if let Command::FileInfo(info) = cmd {
            assert_eq!(info.name, "a|b|c.txt");
        }
    }

    #[test]
    fn malformed_fileinfo_is_an_error() {
        let err = parse_text(&format!("{TOKEN}|fileinfo|not json")).unwrap_err();
        assert!(matches!(err, CodecError::InvalidFileInfo(_)));
        let err = parse_text(&format!(r#"{TOKEN}|fileinfo|{{"name":"x","size":-1}}"#))
            .unwrap_err();
        assert!(matches!(err, CodecError::InvalidFileInfo(_)));
    }

    #[test]
    fn parses_simple_commands() {
        assert_eq!(
            control(&format!("{TOKEN}|ready|movie.mkv")),
            Command::Ready {
                name: "movie.mkv".into()
            }
        );
        assert_eq!(
            control(&format!("{TOKEN}|RCVD|1048576")),
            Command::Rcvd { offset: 1048576 }
        );
        assert_eq!(control(&format!("{TOKEN}|EOF|")), Command::Eof);
        assert_eq!(control(&format!("{TOKEN}|CANCEL|")), Command::Cancel);
        assert_eq!(control(&format!("{TOKEN}|PING|")), Command::Ping);
    }

    #[test]
    fn rcvd_offset_must_be_decimal_u32() {
        for bad in ["", "abc", "-1", "4294967296", " 5"] {
            let err = parse_text(&format!("{TOKEN}|RCVD|{bad}")).unwrap_err();
            assert!(matches!(err, CodecError::InvalidOffset(_)), "{bad:?}");
        }
        assert_eq!(
            control(&format!("{TOKEN}|RCVD|4294967295")),
            Command::Rcvd { offset: u32::MAX }
        );
    }

    #[test]
    fn too_few_parts_is_invalid() {
        assert!(matches!(
            parse_text(&format!("{TOKEN}|EOF")),
            Err(CodecError::InvalidMessage)
        ));
        assert!(matches!(parse_text("hello"), Err(CodecError::InvalidMessage)));
    }

    #[test]
    fn unknown_command() {
        let err = parse_text(&format!("{TOKEN}|PUSH|x")).unwrap_err();
        assert_eq!(err.to_string(), "unknown command PUSH");
    }

    #[test]
    fn placeholder_ping_is_noise() {
        assert_eq!(parse_text("undefined|PING|").unwrap(), Inbound::Noise);
        assert_eq!(parse_text("|PING|").unwrap(), Inbound::Noise);
        // Placeholders are only tolerated for keepalives.
        assert!(parse_text("|EOF|").is_err());
    }
}
