//! Single-character raw input.

use tracing::trace;

use super::backend::{ConsoleBackend, EchoPolicy};
use super::error::Result;
use super::session::RawSession;

/// Reads one character at a time without waiting for a newline.
pub struct RawModeReader<C: ConsoleBackend> {
    console: C,
    strict_tty: bool,
}

impl<C: ConsoleBackend> RawModeReader<C> {
    pub fn new(console: C) -> Self {
        Self {
            console,
            strict_tty: false,
        }
    }

    /// Fail with `NotATerminal` instead of reading in the current mode.
    pub fn with_strict_tty(mut self, strict_tty: bool) -> Self {
        self.strict_tty = strict_tty;
        self
    }

    /// Read exactly one byte with the given echo policy.
    ///
    /// The input mode is switched to raw for the duration of the read and
    /// restored before returning, whatever the outcome. `Ok(None)` means
    /// end of input.
    pub fn read_char(&mut self, echo: EchoPolicy) -> Result<Option<u8>> {
        let mut session = RawSession::begin(&mut self.console, echo, self.strict_tty)?;
        let byte = session.read_byte(None)?;

        if let Some(byte) = byte {
            if session.needs_software_echo() {
                session.write_bytes(&[byte])?;
                session.flush()?;
            }
            trace!(byte, ?echo, raw = session.is_raw(), "read char");
        }

        Ok(byte)
    }

    pub fn get_mut(&mut self) -> &mut C {
        &mut self.console
    }

    pub fn into_inner(self) -> C {
        self.console
    }
}
