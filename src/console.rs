//! conio-style console facade.
//!
//! [`Console`] bundles the raw reader and the cursor locator with the usual
//! conio helpers: `getch`, `getche`, `ungetch`, `putch`, `cputs`, `cgets`,
//! `cscan`, `gotoxy`, `wherex`, `wherey`, `clrscr` and friends.
//!
//! Coordinates are 1-based, like the cursor report: `gotoxy(1, 1)` is the
//! top-left cell.
//!
//! ```no_run
//! use conlite::Console;
//!
//! let mut con = Console::open()?;
//! let (x, y) = (con.wherex(), con.wherey());
//! con.gotoxy(20, 1)?;
//! con.cputs("Hi there")?;
//! con.gotoxy(x, y)?;
//! let key = con.getch();
//! # Ok::<(), conlite::ConsoleError>(())
//! ```

use std::fmt::Display;
use std::io;
use std::str::FromStr;

use crossterm::cursor::{MoveTo, MoveToColumn};
use crossterm::queue;
use crossterm::style::{Attribute, SetAttribute};
use crossterm::terminal::{Clear, ClearType};
use tracing::warn;

use crate::config::Config;
use crate::core::{
    ConsoleBackend, ConsoleError, CursorLocator, CursorPosition, EchoPolicy, LocatorOptions,
    RawModeReader, Result, SystemConsole,
};

/// Returned by [`Console::getch`] and [`Console::getche`] at end of input.
pub const EOF: i32 = -1;

/// Console with conio-style helpers
pub struct Console<C: ConsoleBackend> {
    backend: C,
    options: LocatorOptions,
    /// Bytes pushed back by `ungetch`, last in first out
    pushback: Vec<u8>,
}

impl Console<SystemConsole> {
    /// Console of the running process with default settings.
    pub fn open() -> Result<Self> {
        Ok(Self::new(SystemConsole::open()?))
    }

    /// Console of the running process configured from `config`.
    pub fn open_with_config(config: &Config) -> Result<Self> {
        Ok(Self::new(SystemConsole::open()?).with_options(config.locator()))
    }
}

impl<C: ConsoleBackend> Console<C> {
    pub fn new(backend: C) -> Self {
        Self {
            backend,
            options: LocatorOptions::default(),
            pushback: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: LocatorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &LocatorOptions {
        &self.options
    }

    pub fn backend(&self) -> &C {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut C {
        &mut self.backend
    }

    pub fn into_inner(self) -> C {
        self.backend
    }

    /// Read one byte in raw mode. Pushed-back bytes come first.
    pub fn read_char(&mut self, echo: EchoPolicy) -> Result<Option<u8>> {
        if let Some(byte) = self.pushback.pop() {
            if echo.is_echo() {
                self.write_flushed(&[byte])?;
            }
            return Ok(Some(byte));
        }
        RawModeReader::new(&mut self.backend)
            .with_strict_tty(self.options.strict_tty)
            .read_char(echo)
    }

    /// Read a key without echo. Returns [`EOF`] at end of input or on error.
    pub fn getch(&mut self) -> i32 {
        self.read_code(EchoPolicy::NoEcho)
    }

    /// Read a key and echo it. Returns [`EOF`] at end of input or on error.
    pub fn getche(&mut self) -> i32 {
        self.read_code(EchoPolicy::Echo)
    }

    fn read_code(&mut self, echo: EchoPolicy) -> i32 {
        match self.read_char(echo) {
            Ok(Some(byte)) => i32::from(byte),
            Ok(None) => EOF,
            Err(e) => {
                warn!(error = %e, "character read failed");
                EOF
            }
        }
    }

    /// Push `byte` back so the next read returns it.
    pub fn ungetch(&mut self, byte: u8) -> u8 {
        self.pushback.push(byte);
        byte
    }

    /// Write one byte and return it.
    pub fn putch(&mut self, byte: u8) -> Result<u8> {
        self.write_flushed(&[byte])?;
        Ok(byte)
    }

    pub fn cputs(&mut self, text: &str) -> Result<()> {
        self.write_flushed(text.as_bytes())
    }

    /// Read a line in the console's normal (cooked) mode.
    ///
    /// Stops at a newline, end of input, or after `max_len` bytes. The
    /// newline and a preceding carriage return are not included.
    pub fn cgets(&mut self, max_len: usize) -> Result<String> {
        let mut line = Vec::new();
        while line.len() < max_len {
            match self.next_cooked()? {
                None | Some(b'\n') => break,
                Some(byte) => line.push(byte),
            }
        }
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Ok(String::from_utf8_lossy(&line).into_owned())
    }

    /// Read one whitespace-delimited token in cooked mode and parse it.
    ///
    /// The delimiter after the token is consumed.
    pub fn cscan<T>(&mut self) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        let mut token = Vec::new();
        loop {
            match self.next_cooked()? {
                None if token.is_empty() => return Err(ConsoleError::UnexpectedEof),
                None => break,
                Some(byte) if byte.is_ascii_whitespace() => {
                    if !token.is_empty() {
                        break;
                    }
                }
                Some(byte) => token.push(byte),
            }
        }

        let text = String::from_utf8_lossy(&token);
        text.parse::<T>()
            .map_err(|e| ConsoleError::Parse(format!("{text:?}: {e}")))
    }

    fn next_cooked(&mut self) -> Result<Option<u8>> {
        match self.pushback.pop() {
            Some(byte) => Ok(Some(byte)),
            None => self.backend.read_byte(None),
        }
    }

    /// Move the cursor to column `x`, row `y` (1-based; 0 counts as 1).
    pub fn gotoxy(&mut self, x: u16, y: u16) -> Result<()> {
        let mut seq = Vec::new();
        queue!(seq, MoveTo(x.saturating_sub(1), y.saturating_sub(1)))?;
        self.write_flushed(&seq)
    }

    /// Current cursor position, or `CursorPosition::UNKNOWN` on failure.
    pub fn wherexy(&mut self) -> CursorPosition {
        self.locator().locate()
    }

    pub fn try_wherexy(&mut self) -> Result<CursorPosition> {
        self.locator().try_locate()
    }

    /// Current cursor column, or 0 when unknown.
    pub fn wherex(&mut self) -> u16 {
        self.wherexy().column
    }

    /// Current cursor row, or 0 when unknown.
    pub fn wherey(&mut self) -> u16 {
        self.wherexy().row
    }

    fn locator(&mut self) -> CursorLocator<&mut C> {
        CursorLocator::new(&mut self.backend).with_options(self.options)
    }

    /// Clear the screen and home the cursor.
    pub fn clrscr(&mut self) -> Result<()> {
        let mut seq = Vec::new();
        queue!(seq, Clear(ClearType::All), MoveTo(0, 0))?;
        self.write_flushed(&seq)
    }

    /// Reset attributes, drop the scrollback, clear the screen and home the cursor.
    pub fn rstscr(&mut self) -> Result<()> {
        let mut seq = Vec::new();
        queue!(
            seq,
            SetAttribute(Attribute::Reset),
            Clear(ClearType::Purge),
            Clear(ClearType::All),
            MoveTo(0, 0)
        )?;
        self.write_flushed(&seq)
    }

    /// Erase the current line and return to its first column.
    pub fn delline(&mut self) -> Result<()> {
        let mut seq = Vec::new();
        queue!(seq, Clear(ClearType::CurrentLine), MoveToColumn(0))?;
        self.write_flushed(&seq)
    }

    /// Erase from the cursor to the end of the line.
    pub fn clreol(&mut self) -> Result<()> {
        let mut seq = Vec::new();
        queue!(seq, Clear(ClearType::UntilNewLine))?;
        self.write_flushed(&seq)
    }

    fn write_flushed(&mut self, bytes: &[u8]) -> Result<()> {
        self.backend.write_bytes(bytes)?;
        self.backend.flush()
    }
}

impl<C: ConsoleBackend> io::Write for Console<C> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.backend.write_bytes(buf).map_err(into_io)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.backend.flush().map_err(into_io)
    }
}

fn into_io(e: ConsoleError) -> io::Error {
    match e {
        ConsoleError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::Other, other),
    }
}
