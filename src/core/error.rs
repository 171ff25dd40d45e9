//! Error type shared by the console primitives.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("Console I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("Input is not an interactive terminal")]
    NotATerminal,

    #[error("Timed out waiting for terminal reply")]
    Timeout,

    #[error("Input closed before the reply was complete")]
    UnexpectedEof,

    #[error("Malformed cursor report: unexpected byte {byte:#04x} at offset {position}")]
    MalformedReply { position: usize, byte: u8 },

    #[error("Cursor report exceeded {0} bytes")]
    ReplyTooLong(usize),

    #[error("Cursor report coordinate does not fit in 16 bits")]
    CoordinateOverflow,

    #[error("Failed to parse input: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, ConsoleError>;

impl ConsoleError {
    /// True for errors caused by the terminal's reply rather than by I/O.
    pub fn is_reply_error(&self) -> bool {
        matches!(
            self,
            ConsoleError::MalformedReply { .. }
                | ConsoleError::ReplyTooLong(_)
                | ConsoleError::CoordinateOverflow
        )
    }
}
