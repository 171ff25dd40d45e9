//! Windows console backend
//!
//! Uses the console input mode instead of termios and answers cursor
//! queries from the screen buffer info, so no escape sequence round trip is
//! needed. The console cannot echo without line input, so echo is done by
//! the reader in software.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use tracing::trace;
use windows::Win32::Foundation::HANDLE;
use windows::Win32::Storage::FileSystem::{ReadFile, WriteFile};
use windows::Win32::System::Console::{
    GetConsoleMode, GetConsoleScreenBufferInfo, GetStdHandle, PeekConsoleInputW,
    ReadConsoleInputW, SetConsoleMode, CONSOLE_MODE, CONSOLE_SCREEN_BUFFER_INFO,
    ENABLE_ECHO_INPUT, ENABLE_LINE_INPUT, INPUT_RECORD, KEY_EVENT, STD_INPUT_HANDLE,
    STD_OUTPUT_HANDLE,
};
use windows::Win32::System::Threading::WaitForSingleObject;

use super::backend::{ConsoleBackend, EchoPolicy};
use super::error::{ConsoleError, Result};
use super::locate::CursorPosition;

const WAIT_READY: u32 = 0x0000_0000;
const WAIT_TIMED_OUT: u32 = 0x0000_0102;

fn win_error(e: windows::core::Error) -> ConsoleError {
    ConsoleError::Io(io::Error::new(io::ErrorKind::Other, e))
}

/// The process's console input and screen buffer.
#[derive(Debug)]
pub struct WinConsole {
    input: HANDLE,
    output: HANDLE,
}

// Standard handles are process-wide and valid for the life of the process
unsafe impl Send for WinConsole {}

impl WinConsole {
    pub fn open() -> Result<Self> {
        unsafe {
            let input = GetStdHandle(STD_INPUT_HANDLE).map_err(win_error)?;
            let output = GetStdHandle(STD_OUTPUT_HANDLE).map_err(win_error)?;
            if input.is_invalid() || output.is_invalid() {
                return Err(ConsoleError::NotATerminal);
            }
            Ok(Self { input, output })
        }
    }

    pub fn is_terminal(&self) -> bool {
        let mut mode = CONSOLE_MODE::default();
        unsafe { GetConsoleMode(self.input, &mut mode).is_ok() }
    }

    /// Wait until a character is readable or `timeout` runs out.
    ///
    /// The input handle is signaled by every input record, so key-up, mouse,
    /// focus and resize records are discarded and the wait resumes for the
    /// remaining time.
    fn wait_for_char(&mut self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let millis = u32::try_from(remaining.as_millis()).unwrap_or(u32::MAX - 1);
            let status = unsafe { WaitForSingleObject(self.input, millis) };
            match status.0 {
                WAIT_READY => {}
                WAIT_TIMED_OUT => return Err(ConsoleError::Timeout),
                _ => return Err(ConsoleError::Io(io::Error::last_os_error())),
            }
            if self.discard_non_char_records()? {
                return Ok(());
            }
        }
    }

    /// Drop records from the head of the input queue until a character key
    /// press is next. Returns false if the queue ran empty.
    fn discard_non_char_records(&mut self) -> Result<bool> {
        let mut record = [INPUT_RECORD::default()];
        loop {
            let mut count: u32 = 0;
            unsafe {
                PeekConsoleInputW(self.input, &mut record, &mut count).map_err(win_error)?;
            }
            if count == 0 {
                return Ok(false);
            }
            if is_char_record(&record[0]) {
                return Ok(true);
            }
            trace!(event_type = record[0].EventType, "discarding console input record");
            unsafe {
                ReadConsoleInputW(self.input, &mut record, &mut count).map_err(win_error)?;
            }
        }
    }
}

/// A key press that `ReadFile` turns into input bytes.
fn is_char_record(record: &INPUT_RECORD) -> bool {
    if u32::from(record.EventType) != KEY_EVENT {
        return false;
    }
    let key = unsafe { record.Event.KeyEvent };
    key.bKeyDown.as_bool() && unsafe { key.uChar.UnicodeChar } != 0
}

impl ConsoleBackend for WinConsole {
    type Mode = CONSOLE_MODE;

    fn capture_mode(&mut self) -> Result<CONSOLE_MODE> {
        let mut mode = CONSOLE_MODE::default();
        unsafe {
            GetConsoleMode(self.input, &mut mode).map_err(|_| ConsoleError::NotATerminal)?;
        }
        Ok(mode)
    }

    fn apply_mode(&mut self, mode: &CONSOLE_MODE) -> Result<()> {
        unsafe { SetConsoleMode(self.input, *mode).map_err(win_error) }
    }

    fn raw_mode(&self, saved: &CONSOLE_MODE, _echo: EchoPolicy) -> CONSOLE_MODE {
        // ENABLE_ECHO_INPUT is only honored together with ENABLE_LINE_INPUT
        CONSOLE_MODE(saved.0 & !(ENABLE_LINE_INPUT.0 | ENABLE_ECHO_INPUT.0))
    }

    fn driver_echo(&self) -> bool {
        false
    }

    fn read_byte(&mut self, timeout: Option<Duration>) -> Result<Option<u8>> {
        if let Some(timeout) = timeout {
            self.wait_for_char(timeout)?;
        }

        let mut buf = [0u8; 1];
        let mut read: u32 = 0;
        unsafe {
            ReadFile(self.input, Some(&mut buf), Some(&mut read), None).map_err(win_error)?;
        }

        Ok((read == 1).then_some(buf[0]))
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        // Anything already queued through std's stdout goes first
        io::stdout().lock().flush()?;

        let mut remaining = bytes;
        while !remaining.is_empty() {
            let mut written: u32 = 0;
            unsafe {
                WriteFile(self.output, Some(remaining), Some(&mut written), None).map_err(win_error)?;
            }
            if written == 0 {
                return Err(ConsoleError::Io(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "console accepted no bytes",
                )));
            }
            remaining = &remaining[written as usize..];
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        io::stdout().lock().flush()?;
        Ok(())
    }

    fn native_cursor(&mut self) -> Option<Result<CursorPosition>> {
        let mut info = CONSOLE_SCREEN_BUFFER_INFO::default();
        if let Err(e) = unsafe { GetConsoleScreenBufferInfo(self.output, &mut info) } {
            trace!(error = %e, "no screen buffer, falling back to DSR");
            return None;
        }
        Some(Ok(window_position(&info)))
    }
}

/// Map the 0-based buffer cursor to a 1-based cell in the visible window,
/// which is what a DSR reply reports.
fn window_position(info: &CONSOLE_SCREEN_BUFFER_INFO) -> CursorPosition {
    let column = i32::from(info.dwCursorPosition.X) - i32::from(info.srWindow.Left) + 1;
    let row = i32::from(info.dwCursorPosition.Y) - i32::from(info.srWindow.Top) + 1;
    CursorPosition::new(
        u16::try_from(column.max(0)).unwrap_or(u16::MAX),
        u16::try_from(row.max(0)).unwrap_or(u16::MAX),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use windows::Win32::Foundation::BOOL;
    use windows::Win32::System::Console::{
        COORD, FOCUS_EVENT, KEY_EVENT_RECORD, KEY_EVENT_RECORD_0, SMALL_RECT,
    };

    fn key_record(down: bool, ch: u16) -> INPUT_RECORD {
        let mut record = INPUT_RECORD::default();
        record.EventType = KEY_EVENT as u16;
        record.Event.KeyEvent = KEY_EVENT_RECORD {
            bKeyDown: BOOL::from(down),
            wRepeatCount: 1,
            wVirtualKeyCode: 0,
            wVirtualScanCode: 0,
            uChar: KEY_EVENT_RECORD_0 { UnicodeChar: ch },
            dwControlKeyState: 0,
        };
        record
    }

    #[test]
    fn test_only_key_presses_with_a_char_are_readable() {
        assert!(is_char_record(&key_record(true, u16::from(b'a'))));
        // Enter released after launching the program
        assert!(!is_char_record(&key_record(false, 13)));
        // Shift pressed alone
        assert!(!is_char_record(&key_record(true, 0)));

        let mut focus = INPUT_RECORD::default();
        focus.EventType = FOCUS_EVENT as u16;
        assert!(!is_char_record(&focus));
    }

    #[test]
    fn test_window_position_is_one_based() {
        let mut info = CONSOLE_SCREEN_BUFFER_INFO::default();
        info.dwCursorPosition = COORD { X: 0, Y: 0 };
        assert_eq!(window_position(&info), CursorPosition::new(1, 1));

        info.dwCursorPosition = COORD { X: 9, Y: 104 };
        info.srWindow = SMALL_RECT { Left: 0, Top: 100, Right: 79, Bottom: 124 };
        assert_eq!(window_position(&info), CursorPosition::new(10, 5));
    }

    #[test]
    fn test_raw_mode_clears_line_and_echo() {
        let console = WinConsole {
            input: HANDLE::default(),
            output: HANDLE::default(),
        };
        let saved = CONSOLE_MODE(ENABLE_LINE_INPUT.0 | ENABLE_ECHO_INPUT.0 | 0x0001);
        let raw = console.raw_mode(&saved, EchoPolicy::Echo);
        assert_eq!(raw.0, 0x0001);
    }
}
