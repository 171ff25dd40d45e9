//! Cursor position query.
//!
//! [`CursorLocator`] asks the backend for a native cursor query first. When
//! there is none it writes a Device Status Report request (`ESC [ 6 n`) and
//! parses the `ESC [ row ; col R` answer inside a single raw session, so the
//! answer is never echoed and never waits for a newline.
//!
//! Coordinates are 1-based on every path. `CursorPosition::UNKNOWN` (0, 0)
//! is returned by [`CursorLocator::locate`] when the query fails.

use std::time::Duration;

use tracing::{debug, trace};

use super::backend::{ConsoleBackend, EchoPolicy};
use super::error::{ConsoleError, Result};
use super::reply::{DsrParser, DEFAULT_MAX_REPLY_LEN};
use super::session::RawSession;

/// Device Status Report, cursor position variant.
pub const DSR_CURSOR_QUERY: &[u8] = b"\x1b[6n";

/// Default per-byte wait for the report.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_millis(1000);

/// Cursor cell, 1-based.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CursorPosition {
    pub column: u16,
    pub row: u16,
}

impl CursorPosition {
    pub const UNKNOWN: Self = Self { column: 0, row: 0 };

    pub const fn new(column: u16, row: u16) -> Self {
        Self { column, row }
    }

    pub fn is_known(&self) -> bool {
        self.column != 0 && self.row != 0
    }

    /// (column, row) counted from 0, or `None` for an unknown position.
    pub fn to_zero_based(&self) -> Option<(u16, u16)> {
        Some((self.column.checked_sub(1)?, self.row.checked_sub(1)?))
    }
}

/// Tuning for the escape-sequence path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatorOptions {
    /// Per-byte wait for the report; `None` waits forever
    pub reply_timeout: Option<Duration>,
    /// Most report bytes consumed before giving up
    pub max_reply_len: usize,
    /// Fail instead of querying without raw mode
    pub strict_tty: bool,
}

impl Default for LocatorOptions {
    fn default() -> Self {
        Self {
            reply_timeout: Some(DEFAULT_REPLY_TIMEOUT),
            max_reply_len: DEFAULT_MAX_REPLY_LEN,
            strict_tty: false,
        }
    }
}

/// Determines the current cursor cell.
pub struct CursorLocator<C: ConsoleBackend> {
    console: C,
    options: LocatorOptions,
}

impl<C: ConsoleBackend> CursorLocator<C> {
    pub fn new(console: C) -> Self {
        Self {
            console,
            options: LocatorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: LocatorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &LocatorOptions {
        &self.options
    }

    /// Current cursor position, or `CursorPosition::UNKNOWN` on any failure.
    pub fn locate(&mut self) -> CursorPosition {
        match self.try_locate() {
            Ok(position) => position,
            Err(e) => {
                debug!(error = %e, "cursor query failed");
                CursorPosition::UNKNOWN
            }
        }
    }

    /// Current cursor position, reporting why the query failed.
    pub fn try_locate(&mut self) -> Result<CursorPosition> {
        if let Some(native) = self.console.native_cursor() {
            let position = native?;
            trace!(?position, "native cursor query");
            return Ok(position);
        }

        let options = self.options;
        let mut session =
            RawSession::begin(&mut self.console, EchoPolicy::NoEcho, options.strict_tty)?;
        session.write_bytes(DSR_CURSOR_QUERY)?;
        session.flush()?;

        let mut parser = DsrParser::new(options.max_reply_len);
        loop {
            let byte = session
                .read_byte(options.reply_timeout)?
                .ok_or(ConsoleError::UnexpectedEof)?;
            if let Some(position) = parser.feed(byte)? {
                trace!(?position, bytes = parser.consumed(), "cursor report parsed");
                return Ok(position);
            }
        }
    }

    pub fn get_mut(&mut self) -> &mut C {
        &mut self.console
    }

    pub fn into_inner(self) -> C {
        self.console
    }
}
