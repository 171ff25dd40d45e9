//! POSIX terminal backend
//!
//! Switches the line discipline with `tcgetattr`/`tcsetattr` on standard
//! input and reads it one byte at a time with `read(2)`, so no bytes are
//! left behind in a user-space buffer when the mode is restored.

use std::fmt;
use std::io::{self, Write};
use std::mem::MaybeUninit;
use std::os::unix::io::RawFd;
use std::time::Duration;

use super::backend::{ConsoleBackend, EchoPolicy};
use super::error::{ConsoleError, Result};

/// Saved termios settings.
#[derive(Clone, Copy)]
pub struct TermiosMode(libc::termios);

impl fmt::Debug for TermiosMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TermiosMode")
            .field("c_lflag", &format_args!("{:#x}", self.0.c_lflag))
            .field("canonical", &(self.0.c_lflag & libc::ICANON != 0))
            .field("echo", &(self.0.c_lflag & libc::ECHO != 0))
            .finish()
    }
}

impl TermiosMode {
    pub fn is_canonical(&self) -> bool {
        self.0.c_lflag & libc::ICANON != 0
    }

    pub fn is_echo(&self) -> bool {
        self.0.c_lflag & libc::ECHO != 0
    }
}

/// A terminal input/output descriptor pair, by default the process's
/// standard input and output.
#[derive(Debug)]
pub struct PosixConsole {
    input: RawFd,
    output: RawFd,
}

impl PosixConsole {
    pub fn open() -> Result<Self> {
        Ok(Self::from_fds(libc::STDIN_FILENO, libc::STDOUT_FILENO))
    }

    /// Use already open descriptors, for example the slave side of a pty.
    ///
    /// The descriptors are borrowed: they must stay open while the console
    /// is in use and are not closed on drop.
    pub fn from_fds(input: RawFd, output: RawFd) -> Self {
        Self { input, output }
    }

    pub fn is_terminal(&self) -> bool {
        unsafe { libc::isatty(self.input) == 1 }
    }

    fn wait_readable(&self, timeout: Duration) -> Result<()> {
        let millis = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);
        let mut pfd = libc::pollfd {
            fd: self.input,
            events: libc::POLLIN,
            revents: 0,
        };

        loop {
            let rc = unsafe { libc::poll(&mut pfd, 1, millis) };
            match rc {
                0 => return Err(ConsoleError::Timeout),
                n if n > 0 => return Ok(()),
                _ => {
                    let err = io::Error::last_os_error();
                    if err.kind() != io::ErrorKind::Interrupted {
                        return Err(err.into());
                    }
                }
            }
        }
    }
}

fn termios_error() -> ConsoleError {
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ENOTTY) {
        ConsoleError::NotATerminal
    } else {
        ConsoleError::Io(err)
    }
}

impl ConsoleBackend for PosixConsole {
    type Mode = TermiosMode;

    fn capture_mode(&mut self) -> Result<TermiosMode> {
        let mut termios = MaybeUninit::<libc::termios>::uninit();
        if unsafe { libc::tcgetattr(self.input, termios.as_mut_ptr()) } != 0 {
            return Err(termios_error());
        }
        Ok(TermiosMode(unsafe { termios.assume_init() }))
    }

    fn apply_mode(&mut self, mode: &TermiosMode) -> Result<()> {
        if unsafe { libc::tcsetattr(self.input, libc::TCSANOW, &mode.0) } != 0 {
            return Err(termios_error());
        }
        Ok(())
    }

    fn raw_mode(&self, saved: &TermiosMode, echo: EchoPolicy) -> TermiosMode {
        let mut raw = saved.0;
        raw.c_lflag &= !libc::ICANON;
        if echo.is_echo() {
            raw.c_lflag |= libc::ECHO;
        } else {
            raw.c_lflag &= !libc::ECHO;
        }
        // Block until one byte is available
        raw.c_cc[libc::VMIN] = 1;
        raw.c_cc[libc::VTIME] = 0;
        TermiosMode(raw)
    }

    fn read_byte(&mut self, timeout: Option<Duration>) -> Result<Option<u8>> {
        if let Some(timeout) = timeout {
            self.wait_readable(timeout)?;
        }

        let mut byte = 0u8;
        loop {
            let n = unsafe { libc::read(self.input, (&mut byte as *mut u8).cast(), 1) };
            match n {
                1 => return Ok(Some(byte)),
                0 => return Ok(None),
                _ => {
                    let err = io::Error::last_os_error();
                    if err.kind() != io::ErrorKind::Interrupted {
                        return Err(err.into());
                    }
                }
            }
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        // Anything already queued through std's stdout goes first
        io::stdout().lock().flush()?;

        let mut remaining = bytes;
        while !remaining.is_empty() {
            let n = unsafe { libc::write(self.output, remaining.as_ptr().cast(), remaining.len()) };
            match n {
                0 => {
                    return Err(ConsoleError::Io(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "terminal accepted no bytes",
                    )))
                }
                n if n > 0 => remaining = &remaining[n as usize..],
                _ => {
                    let err = io::Error::last_os_error();
                    if err.kind() != io::ErrorKind::Interrupted {
                        return Err(err.into());
                    }
                }
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        io::stdout().lock().flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Read;
    use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd};
    use std::ptr;
    use std::thread;

    use crate::core::{CursorLocator, CursorPosition, RawModeReader, DSR_CURSOR_QUERY};

    fn cooked() -> TermiosMode {
        let mut termios: libc::termios = unsafe { std::mem::zeroed() };
        termios.c_lflag = libc::ICANON | libc::ECHO | libc::ISIG;
        TermiosMode(termios)
    }

    /// Master and slave ends of a fresh pseudoterminal.
    struct Pty {
        master: File,
        slave: OwnedFd,
    }

    impl Pty {
        fn open() -> Self {
            let mut master = -1;
            let mut slave = -1;
            let rc = unsafe {
                libc::openpty(
                    &mut master,
                    &mut slave,
                    ptr::null_mut(),
                    ptr::null_mut(),
                    ptr::null_mut(),
                )
            };
            assert_eq!(rc, 0, "openpty failed: {}", io::Error::last_os_error());
            unsafe {
                Self {
                    master: File::from_raw_fd(master),
                    slave: OwnedFd::from_raw_fd(slave),
                }
            }
        }

        fn console(&self) -> PosixConsole {
            let fd = self.slave.as_raw_fd();
            PosixConsole::from_fds(fd, fd)
        }

        fn lflag(&self) -> libc::tcflag_t {
            let mut termios = MaybeUninit::<libc::termios>::uninit();
            let rc = unsafe { libc::tcgetattr(self.slave.as_raw_fd(), termios.as_mut_ptr()) };
            assert_eq!(rc, 0);
            unsafe { termios.assume_init() }.c_lflag
        }

        /// Block until the slave leaves canonical mode.
        fn wait_for_raw(&self) {
            for _ in 0..500 {
                if self.lflag() & libc::ICANON == 0 {
                    return;
                }
                thread::sleep(Duration::from_millis(10));
            }
            panic!("slave never left canonical mode");
        }

        /// Everything the slave wrote, stopping after `quiet` without new bytes.
        fn drain(&self, quiet: Duration) -> Vec<u8> {
            let mut out = Vec::new();
            let mut pfd = libc::pollfd {
                fd: self.master.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            };
            let millis = quiet.as_millis() as libc::c_int;
            let mut buf = [0u8; 64];
            while unsafe { libc::poll(&mut pfd, 1, millis) } > 0 {
                match (&self.master).read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => out.extend_from_slice(&buf[..n]),
                }
            }
            out
        }

        /// Read from the master until `pattern` shows up.
        fn expect(&self, pattern: &[u8]) -> Vec<u8> {
            let mut seen = Vec::new();
            for _ in 0..50 {
                seen.extend(self.drain(Duration::from_millis(20)));
                if seen.windows(pattern.len()).any(|w| w == pattern) {
                    return seen;
                }
            }
            panic!("never saw {:?}, got {:?}", pattern, seen);
        }
    }

    #[test]
    fn test_raw_mode_flags() {
        let console = PosixConsole::open().unwrap();
        let saved = cooked();

        let quiet = console.raw_mode(&saved, EchoPolicy::NoEcho);
        assert!(!quiet.is_canonical());
        assert!(!quiet.is_echo());
        assert_eq!(quiet.0.c_lflag & libc::ISIG, libc::ISIG);
        assert_eq!(quiet.0.c_cc[libc::VMIN], 1);

        let loud = console.raw_mode(&saved, EchoPolicy::Echo);
        assert!(!loud.is_canonical());
        assert!(loud.is_echo());
        assert_eq!(loud.0.c_lflag & libc::ISIG, libc::ISIG);
    }

    #[test]
    fn test_pty_capture_and_restore() {
        let pty = Pty::open();
        let mut console = pty.console();
        assert!(console.is_terminal());

        let before = console.capture_mode().unwrap();
        assert!(before.is_canonical());
        let raw = console.raw_mode(&before, EchoPolicy::NoEcho);
        console.apply_mode(&raw).unwrap();
        assert_eq!(pty.lflag() & (libc::ICANON | libc::ECHO), 0);

        console.apply_mode(&before).unwrap();
        assert_eq!(console.capture_mode().unwrap().0.c_lflag, before.0.c_lflag);
    }

    #[test]
    fn test_pty_read_char_echoes_once() {
        let pty = Pty::open();
        let before = pty.lflag();
        let mut reader = RawModeReader::new(pty.console());

        let byte = thread::scope(|s| {
            s.spawn(|| {
                pty.wait_for_raw();
                (&pty.master).write_all(b"k").unwrap();
            });
            reader.read_char(EchoPolicy::Echo).unwrap()
        });

        assert_eq!(byte, Some(b'k'));
        assert_eq!(pty.drain(Duration::from_millis(100)), b"k");
        assert_eq!(pty.lflag(), before);
    }

    #[test]
    fn test_pty_read_char_without_echo() {
        let pty = Pty::open();
        let before = pty.lflag();
        let mut reader = RawModeReader::new(pty.console());

        let byte = thread::scope(|s| {
            s.spawn(|| {
                pty.wait_for_raw();
                (&pty.master).write_all(b"q").unwrap();
            });
            reader.read_char(EchoPolicy::NoEcho).unwrap()
        });

        assert_eq!(byte, Some(b'q'));
        assert!(pty.drain(Duration::from_millis(100)).is_empty());
        assert_eq!(pty.lflag(), before);
    }

    #[test]
    fn test_pty_locate_round_trip() {
        let pty = Pty::open();
        let before = pty.lflag();
        let mut locator = CursorLocator::new(pty.console());

        let (position, seen) = thread::scope(|s| {
            let terminal = s.spawn(|| {
                let seen = pty.expect(DSR_CURSOR_QUERY);
                (&pty.master).write_all(b"\x1b[5;10R").unwrap();
                seen
            });
            let position = locator.try_locate().unwrap();
            (position, terminal.join().unwrap())
        });

        assert_eq!(position, CursorPosition::new(10, 5));
        assert_eq!(seen, DSR_CURSOR_QUERY);
        assert_eq!(pty.lflag(), before);
    }

    #[test]
    fn test_pty_read_timeout() {
        let pty = Pty::open();
        let mut console = pty.console();
        assert!(matches!(
            console.read_byte(Some(Duration::from_millis(50))),
            Err(ConsoleError::Timeout)
        ));
    }
}
