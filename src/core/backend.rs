//! Console capability interface.
//!
//! Everything the raw reader and the cursor locator need from a console is
//! expressed by [`ConsoleBackend`]. The process console gets one
//! implementation per platform, selected at build time as
//! [`SystemConsole`](super::SystemConsole).

use std::fmt::Debug;
use std::time::Duration;

use super::error::Result;
use super::locate::CursorPosition;

/// Whether input bytes are reflected to the output while reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EchoPolicy {
    #[default]
    NoEcho,
    Echo,
}

impl EchoPolicy {
    pub fn is_echo(self) -> bool {
        self == EchoPolicy::Echo
    }
}

/// Low-level access to a console's input mode and byte streams.
pub trait ConsoleBackend {
    /// Snapshot of the input line discipline.
    type Mode: Clone + Debug;

    /// Capture the current input mode.
    ///
    /// Fails with [`ConsoleError::NotATerminal`](super::ConsoleError::NotATerminal)
    /// when the input stream has no line discipline to capture.
    fn capture_mode(&mut self) -> Result<Self::Mode>;

    /// Apply `mode` immediately, without draining pending input.
    fn apply_mode(&mut self, mode: &Self::Mode) -> Result<()>;

    /// Derive the raw variant of `saved`: canonical input off, echo per `echo`.
    fn raw_mode(&self, saved: &Self::Mode, echo: EchoPolicy) -> Self::Mode;

    /// Whether the line discipline itself can echo in raw mode.
    ///
    /// When this is false the reader echoes in software.
    fn driver_echo(&self) -> bool {
        true
    }

    /// Read a single byte. `Ok(None)` is end of input.
    ///
    /// With `Some(timeout)` the call fails with
    /// [`ConsoleError::Timeout`](super::ConsoleError::Timeout) if no byte
    /// arrives in time.
    fn read_byte(&mut self, timeout: Option<Duration>) -> Result<Option<u8>>;

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()>;

    fn flush(&mut self) -> Result<()>;

    /// Query the cursor directly, bypassing the escape-sequence round trip.
    ///
    /// `None` means the backend has no such query and the caller should
    /// fall back to a Device Status Report.
    fn native_cursor(&mut self) -> Option<Result<CursorPosition>> {
        None
    }
}

impl<C: ConsoleBackend + ?Sized> ConsoleBackend for &mut C {
    type Mode = C::Mode;

    fn capture_mode(&mut self) -> Result<Self::Mode> {
        (**self).capture_mode()
    }

    fn apply_mode(&mut self, mode: &Self::Mode) -> Result<()> {
        (**self).apply_mode(mode)
    }

    fn raw_mode(&self, saved: &Self::Mode, echo: EchoPolicy) -> Self::Mode {
        (**self).raw_mode(saved, echo)
    }

    fn driver_echo(&self) -> bool {
        (**self).driver_echo()
    }

    fn read_byte(&mut self, timeout: Option<Duration>) -> Result<Option<u8>> {
        (**self).read_byte(timeout)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write_bytes(bytes)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn native_cursor(&mut self) -> Option<Result<CursorPosition>> {
        (**self).native_cursor()
    }
}
