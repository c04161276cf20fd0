//! Line codec for the player's text protocol.
//!
//! Requests are single newline-terminated words. Responses are newline
//! terminated lines of one of these shapes:
//! ```text
//! OK MPD 0.23.5        greeting sent on connect
//! volume: 40           key/value field
//! OK                   end of one command's response
//! ACK [50@0] {...}     command failed
//! ```

use bytes::{BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

/// Longest line accepted from the player (64 KiB)
const MAX_LINE_LENGTH: usize = 64 * 1024;

const GREETING_PREFIX: &str = "OK ";
const ACK_PREFIX: &str = "ACK ";
const FIELD_SEPARATOR: &str = ": ";

/// Read-only requests understood by the player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommand {
    Status,
    CurrentSong,
    Close,
}

impl PlayerCommand {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PlayerCommand::Status => "status",
            PlayerCommand::CurrentSong => "currentsong",
            PlayerCommand::Close => "close",
        }
    }
}

/// One decoded response line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerLine {
    Greeting(String),
    Field { key: String, value: String },
    Ok,
    Ack(String),
    /// Anything else, kept for logging
    Other(String),
}

impl PlayerLine {
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line == "OK" {
            return PlayerLine::Ok;
        }
        if let Some(version) = line.strip_prefix(GREETING_PREFIX) {
            return PlayerLine::Greeting(version.to_string());
        }
        if let Some(error) = line.strip_prefix(ACK_PREFIX) {
            return PlayerLine::Ack(error.to_string());
        }
        match line.split_once(FIELD_SEPARATOR) {
            Some((key, value)) if !key.is_empty() => PlayerLine::Field {
                key: key.to_string(),
                value: value.to_string(),
            },
            _ => PlayerLine::Other(line.to_string()),
        }
    }
}

/// Codec for the player's newline-delimited protocol
#[derive(Debug, Default)]
pub struct PlayerCodec {
    /// Bytes already searched for a newline
    scanned: usize,
}

impl PlayerCodec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for PlayerCodec {
    type Item = PlayerLine;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(offset) = src[self.scanned..].iter().position(|b| *b == b'\n') else {
            if src.len() > MAX_LINE_LENGTH {
                return Err(CodecError::LineTooLong(src.len()));
            }
            self.scanned = src.len();
            return Ok(None);
        };

        let newline = self.scanned + offset;
        self.scanned = 0;

        let line = src.split_to(newline + 1);
        let text = String::from_utf8_lossy(&line[..newline]);
        Ok(Some(PlayerLine::parse(&text)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        if src.is_empty() {
            return Ok(None);
        }

        // Final line without a trailing newline
        self.scanned = 0;
        let rest = src.split();
        let text = String::from_utf8_lossy(&rest);
        Ok(Some(PlayerLine::parse(&text)))
    }
}

impl Encoder<PlayerCommand> for PlayerCodec {
    type Error = CodecError;

    fn encode(&mut self, item: PlayerCommand, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let command = item.as_str();
        dst.reserve(command.len() + 1);
        dst.put_slice(command.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}

/// Errors that can occur during codec operations
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Line too long: {0} bytes (max: {MAX_LINE_LENGTH})")]
    LineTooLong(usize),
}
