//! In-memory console with a simulated line discipline.
//!
//! [`ScriptedConsole`] plays back a fixed input script, records everything
//! written to it, and keeps a log of every mode change. It can also answer
//! queries the way a terminal would: when the output ends with a registered
//! query, the matching reply is appended to the input.

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use bitflags::bitflags;

use super::backend::{ConsoleBackend, EchoPolicy};
use super::error::{ConsoleError, Result};
use super::locate::CursorPosition;

bitflags! {
    /// Local mode flags of the simulated line discipline.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct ModeFlags: u8 {
        const CANONICAL = 0b01;
        const ECHO      = 0b10;
    }
}

/// Scripted console backend
#[derive(Debug)]
pub struct ScriptedConsole {
    input: VecDeque<u8>,
    output: Vec<u8>,
    mode: ModeFlags,
    mode_log: Vec<ModeFlags>,
    responders: Vec<(Vec<u8>, Vec<u8>)>,
    native: Option<CursorPosition>,
    is_tty: bool,
    driver_echo: bool,
    fail_apply: bool,
    fail_reads: bool,
    closed: bool,
    flushes: usize,
}

impl Default for ScriptedConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedConsole {
    /// A terminal in cooked mode (canonical input with echo) and no input.
    pub fn new() -> Self {
        Self {
            input: VecDeque::new(),
            output: Vec::new(),
            mode: ModeFlags::CANONICAL | ModeFlags::ECHO,
            mode_log: Vec::new(),
            responders: Vec::new(),
            native: None,
            is_tty: true,
            driver_echo: true,
            fail_apply: false,
            fail_reads: false,
            closed: false,
            flushes: 0,
        }
    }

    /// Queue `bytes` as pending input.
    pub fn with_input(mut self, bytes: &[u8]) -> Self {
        self.input.extend(bytes);
        self
    }

    /// Reply with `reply` whenever the output ends with `query`.
    pub fn answering(mut self, query: &[u8], reply: &[u8]) -> Self {
        self.responders.push((query.to_vec(), reply.to_vec()));
        self
    }

    /// Report `position` through the native cursor query.
    pub fn with_native_cursor(mut self, position: CursorPosition) -> Self {
        self.native = Some(position);
        self
    }

    /// Behave like redirected input: no mode to capture or apply.
    pub fn not_a_tty(mut self) -> Self {
        self.is_tty = false;
        self
    }

    /// Behave like a console that cannot echo without line input.
    pub fn without_driver_echo(mut self) -> Self {
        self.driver_echo = false;
        self
    }

    /// Refuse to apply any mode with canonical input disabled.
    pub fn failing_apply(mut self) -> Self {
        self.fail_apply = true;
        self
    }

    /// Fail every read with an I/O error.
    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    /// Report end of input once the script is exhausted, even when a
    /// timeout is requested.
    pub fn closed(mut self) -> Self {
        self.closed = true;
        self
    }

    pub fn push_input(&mut self, bytes: &[u8]) {
        self.input.extend(bytes);
    }

    pub fn mode(&self) -> ModeFlags {
        self.mode
    }

    /// Every mode applied so far, in order.
    pub fn mode_log(&self) -> &[ModeFlags] {
        &self.mode_log
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    pub fn remaining_input(&self) -> usize {
        self.input.len()
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }

    fn respond(&mut self) {
        for (query, reply) in &self.responders {
            if self.output.ends_with(query) {
                self.input.extend(reply.iter().copied());
            }
        }
    }
}

impl ConsoleBackend for ScriptedConsole {
    type Mode = ModeFlags;

    fn capture_mode(&mut self) -> Result<ModeFlags> {
        if !self.is_tty {
            return Err(ConsoleError::NotATerminal);
        }
        Ok(self.mode)
    }

    fn apply_mode(&mut self, mode: &ModeFlags) -> Result<()> {
        if !self.is_tty {
            return Err(ConsoleError::NotATerminal);
        }
        if self.fail_apply && !mode.contains(ModeFlags::CANONICAL) {
            return Err(ConsoleError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "mode change refused",
            )));
        }
        self.mode = *mode;
        self.mode_log.push(*mode);
        Ok(())
    }

    fn raw_mode(&self, saved: &ModeFlags, echo: EchoPolicy) -> ModeFlags {
        let mut raw = *saved;
        raw.remove(ModeFlags::CANONICAL);
        raw.set(ModeFlags::ECHO, echo.is_echo() && self.driver_echo);
        raw
    }

    fn driver_echo(&self) -> bool {
        self.driver_echo
    }

    fn read_byte(&mut self, timeout: Option<Duration>) -> Result<Option<u8>> {
        if self.fail_reads {
            return Err(ConsoleError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "input closed",
            )));
        }
        match self.input.pop_front() {
            Some(byte) => {
                if self.mode.contains(ModeFlags::ECHO) {
                    self.output.push(byte);
                }
                Ok(Some(byte))
            }
            None if timeout.is_some() && !self.closed => Err(ConsoleError::Timeout),
            None => Ok(None),
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.output.extend_from_slice(bytes);
        self.respond();
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }

    fn native_cursor(&mut self) -> Option<Result<CursorPosition>> {
        self.native.map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooked_read_echoes() {
        let mut console = ScriptedConsole::new().with_input(b"a");
        assert_eq!(console.read_byte(None).unwrap(), Some(b'a'));
        assert_eq!(console.output(), b"a");
    }

    #[test]
    fn test_empty_script() {
        let mut console = ScriptedConsole::new();
        assert_eq!(console.read_byte(None).unwrap(), None);
        assert!(matches!(
            console.read_byte(Some(Duration::from_millis(10))),
            Err(ConsoleError::Timeout)
        ));

        let mut closed = ScriptedConsole::new().closed();
        assert_eq!(closed.read_byte(Some(Duration::from_millis(10))).unwrap(), None);
    }

    #[test]
    fn test_answering_query() {
        let mut console = ScriptedConsole::new().answering(b"?", b"!");
        console.write_bytes(b"x?").unwrap();
        assert_eq!(console.remaining_input(), 1);
        console.write_bytes(b"y").unwrap();
        assert_eq!(console.remaining_input(), 1);
    }

    #[test]
    fn test_raw_mode_without_driver_echo() {
        let console = ScriptedConsole::new().without_driver_echo();
        let raw = console.raw_mode(&console.mode(), EchoPolicy::Echo);
        assert_eq!(raw, ModeFlags::empty());
    }
}
