//! Cursor position report parser
//!
//! Parses the terminal's answer to a Device Status Report request,
//! `ESC [ row ; col R`, one byte at a time.

use super::error::{ConsoleError, Result};
use super::locate::CursorPosition;

pub const ESC: u8 = 0x1B;
pub const CSI: u8 = b'[';
pub const DELIMITER: u8 = b';';
pub const TERMINATOR: u8 = b'R';

/// Default bound on the number of reply bytes consumed.
pub const DEFAULT_MAX_REPLY_LEN: usize = 32;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum ReplyState {
    #[default]
    Escape,
    Bracket,
    Row,
    Column,
    Done,
}

/// Parser state machine
#[derive(Debug, Clone)]
pub struct DsrParser {
    state: ReplyState,
    row: u16,
    column: u16,
    consumed: usize,
    max_len: usize,
}

impl Default for DsrParser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REPLY_LEN)
    }
}

impl DsrParser {
    pub fn new(max_len: usize) -> Self {
        Self {
            state: ReplyState::Escape,
            row: 0,
            column: 0,
            consumed: 0,
            max_len,
        }
    }

    /// Number of bytes fed so far.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    pub fn is_done(&self) -> bool {
        self.state == ReplyState::Done
    }

    /// Feed a single byte to the parser.
    ///
    /// Returns `Ok(Some(position))` once the terminating `R` arrives and
    /// `Ok(None)` while more bytes are needed. A rejected byte ends the
    /// parse; every later call fails as well.
    pub fn feed(&mut self, byte: u8) -> Result<Option<CursorPosition>> {
        if self.consumed >= self.max_len {
            self.state = ReplyState::Done;
            return Err(ConsoleError::ReplyTooLong(self.max_len));
        }
        let position = self.consumed;
        self.consumed += 1;

        let malformed = ConsoleError::MalformedReply { position, byte };
        match self.state {
            ReplyState::Escape if byte == ESC => self.state = ReplyState::Bracket,
            ReplyState::Bracket if byte == CSI => self.state = ReplyState::Row,
            ReplyState::Row => match byte {
                b'0'..=b'9' => match accumulate(self.row, byte) {
                    Ok(row) => self.row = row,
                    Err(e) => return Err(self.reject(e)),
                },
                DELIMITER => self.state = ReplyState::Column,
                _ => return Err(self.reject(malformed)),
            },
            ReplyState::Column => match byte {
                b'0'..=b'9' => match accumulate(self.column, byte) {
                    Ok(column) => self.column = column,
                    Err(e) => return Err(self.reject(e)),
                },
                TERMINATOR => {
                    self.state = ReplyState::Done;
                    return Ok(Some(CursorPosition::new(self.column, self.row)));
                }
                _ => return Err(self.reject(malformed)),
            },
            _ => return Err(self.reject(malformed)),
        }
        Ok(None)
    }

    fn reject(&mut self, err: ConsoleError) -> ConsoleError {
        self.state = ReplyState::Done;
        err
    }
}

fn accumulate(acc: u16, digit: u8) -> Result<u16> {
    acc.checked_mul(10)
        .and_then(|value| value.checked_add(u16::from(digit - b'0')))
        .ok_or(ConsoleError::CoordinateOverflow)
}

/// Parse a complete reply held in memory.
pub fn parse_reply(bytes: &[u8]) -> Result<CursorPosition> {
    let mut parser = DsrParser::new(bytes.len().max(DEFAULT_MAX_REPLY_LEN));
    for &byte in bytes {
        if let Some(position) = parser.feed(byte)? {
            return Ok(position);
        }
    }
    Err(ConsoleError::UnexpectedEof)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_row_and_column() {
        let pos = parse_reply(b"\x1b[12;34R").unwrap();
        assert_eq!(pos.row, 12);
        assert_eq!(pos.column, 34);
    }

    #[test]
    fn test_parse_zero() {
        assert_eq!(parse_reply(b"\x1b[0;0R").unwrap(), CursorPosition::new(0, 0));
    }

    #[test]
    fn test_empty_groups_are_zero() {
        assert_eq!(parse_reply(b"\x1b[;R").unwrap(), CursorPosition::new(0, 0));
        assert_eq!(parse_reply(b"\x1b[7;R").unwrap(), CursorPosition::new(0, 7));
    }

    #[test]
    fn test_reject_bad_prefix() {
        let mut parser = DsrParser::default();
        assert!(matches!(
            parser.feed(b'x'),
            Err(ConsoleError::MalformedReply { position: 0, byte: b'x' })
        ));
        assert_eq!(parser.consumed(), 1);

        let mut parser = DsrParser::default();
        assert!(parser.feed(ESC).unwrap().is_none());
        assert!(matches!(
            parser.feed(b'O'),
            Err(ConsoleError::MalformedReply { position: 1, byte: b'O' })
        ));
        assert!(parser.is_done());
    }

    #[test]
    fn test_reject_non_digit() {
        assert!(matches!(
            parse_reply(b"\x1b[1x;2R"),
            Err(ConsoleError::MalformedReply { position: 3, byte: b'x' })
        ));
        assert!(matches!(
            parse_reply(b"\x1b[?1;2R"),
            Err(ConsoleError::MalformedReply { position: 2, .. })
        ));
    }

    #[test]
    fn test_overflow() {
        assert!(matches!(
            parse_reply(b"\x1b[70000;1R"),
            Err(ConsoleError::CoordinateOverflow)
        ));
        assert_eq!(parse_reply(b"\x1b[65535;1R").unwrap().row, u16::MAX);
    }

    #[test]
    fn test_length_bound() {
        let mut parser = DsrParser::new(6);
        for &byte in b"\x1b[0000" {
            assert!(parser.feed(byte).unwrap().is_none());
        }
        assert!(matches!(parser.feed(b'0'), Err(ConsoleError::ReplyTooLong(6))));
    }

    #[test]
    fn test_incomplete_reply() {
        assert!(matches!(
            parse_reply(b"\x1b[3;4"),
            Err(ConsoleError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_feed_after_done() {
        let mut parser = DsrParser::default();
        for &byte in b"\x1b[1;1R" {
            let _ = parser.feed(byte);
        }
        assert!(parser.is_done());
        assert!(parser.feed(b'x').is_err());
    }
}
