//! Scoped raw-mode acquisition.
//!
//! A [`RawSession`] captures the console's input mode, switches it to raw
//! mode, and puts the captured mode back when dropped. The restore runs on
//! every exit path: normal return, `?` propagation, and panic unwinding.
//!
//! The input mode is process-wide state, so sessions are serialized through
//! a global lock held for the lifetime of the session.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, trace, warn};

use super::backend::{ConsoleBackend, EchoPolicy};
use super::error::Result;

static SESSION_LOCK: Mutex<()> = Mutex::new(());

/// Raw-mode guard over a console backend.
pub struct RawSession<'a, C: ConsoleBackend> {
    console: &'a mut C,
    /// Mode to restore on drop; `None` when raw mode was never applied
    saved: Option<C::Mode>,
    echo: EchoPolicy,
    _lock: MutexGuard<'static, ()>,
}

impl<'a, C: ConsoleBackend> RawSession<'a, C> {
    /// Enter raw mode with the given echo policy.
    ///
    /// When the mode cannot be captured or applied and `strict_tty` is false,
    /// the session is still returned but reads happen in whatever mode the
    /// console is already in. With `strict_tty` the error is returned
    /// instead, after any partial change has been undone.
    pub fn begin(console: &'a mut C, echo: EchoPolicy, strict_tty: bool) -> Result<Self> {
        // A poisoned lock means a session panicked; its guard already restored the mode.
        let lock = SESSION_LOCK.lock().unwrap_or_else(PoisonError::into_inner);

        let saved = match console.capture_mode() {
            Ok(saved) => {
                let raw = console.raw_mode(&saved, echo);
                match console.apply_mode(&raw) {
                    Ok(()) => {
                        trace!(?echo, "raw mode entered");
                        Some(saved)
                    }
                    Err(e) => {
                        if let Err(restore) = console.apply_mode(&saved) {
                            warn!(error = %restore, "failed to restore mode after apply error");
                        }
                        if strict_tty {
                            return Err(e);
                        }
                        debug!(error = %e, "raw mode unavailable, reading in current mode");
                        None
                    }
                }
            }
            Err(e) => {
                if strict_tty {
                    return Err(e);
                }
                debug!(error = %e, "cannot capture input mode, reading in current mode");
                None
            }
        };

        Ok(Self {
            console,
            saved,
            echo,
            _lock: lock,
        })
    }

    /// Whether raw mode is actually in effect.
    pub fn is_raw(&self) -> bool {
        self.saved.is_some()
    }

    pub fn echo(&self) -> EchoPolicy {
        self.echo
    }

    /// Whether a read byte must be echoed by the caller.
    pub fn needs_software_echo(&self) -> bool {
        self.echo.is_echo() && !self.console.driver_echo()
    }

    pub fn read_byte(&mut self, timeout: Option<Duration>) -> Result<Option<u8>> {
        self.console.read_byte(timeout)
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.console.write_bytes(bytes)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.console.flush()
    }
}

impl<C: ConsoleBackend> Drop for RawSession<'_, C> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            match self.console.apply_mode(&saved) {
                Ok(()) => trace!("input mode restored"),
                Err(e) => warn!(error = %e, "failed to restore input mode"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scripted::{ModeFlags, ScriptedConsole};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_session_applies_and_restores() {
        let mut console = ScriptedConsole::new();
        let before = console.mode();
        {
            let session = RawSession::begin(&mut console, EchoPolicy::NoEcho, false).unwrap();
            assert!(session.is_raw());
        }
        assert_eq!(console.mode(), before);
        assert_eq!(console.mode_log(), &[ModeFlags::empty(), before]);
    }

    #[test]
    fn test_echo_policy_sets_echo_flag() {
        let mut console = ScriptedConsole::new();
        {
            let _session = RawSession::begin(&mut console, EchoPolicy::Echo, false).unwrap();
        }
        assert_eq!(console.mode_log()[0], ModeFlags::ECHO);
    }

    #[test]
    fn test_lenient_session_without_tty() {
        let mut console = ScriptedConsole::new().not_a_tty();
        let session = RawSession::begin(&mut console, EchoPolicy::NoEcho, false).unwrap();
        assert!(!session.is_raw());
        drop(session);
        assert!(console.mode_log().is_empty());
    }

    #[test]
    fn test_strict_session_without_tty() {
        let mut console = ScriptedConsole::new().not_a_tty();
        let result = RawSession::begin(&mut console, EchoPolicy::NoEcho, true);
        assert!(matches!(result, Err(crate::core::ConsoleError::NotATerminal)));
    }

    #[test]
    fn test_apply_failure_leaves_mode_untouched() {
        let mut console = ScriptedConsole::new().failing_apply();
        let before = console.mode();
        assert!(RawSession::begin(&mut console, EchoPolicy::NoEcho, true).is_err());
        assert_eq!(console.mode(), before);
        assert!(RawSession::begin(&mut console, EchoPolicy::NoEcho, false).is_ok());
        assert_eq!(console.mode(), before);
    }

    #[test]
    fn test_restore_on_panic() {
        let mut console = ScriptedConsole::new();
        let before = console.mode();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _session = RawSession::begin(&mut console, EchoPolicy::NoEcho, false).unwrap();
            panic!("boom");
        }));
        assert!(result.is_err());
        assert_eq!(console.mode(), before);
    }

    #[test]
    fn test_sessions_are_serialized() {
        let mut first = ScriptedConsole::new();
        let entered = Arc::new(AtomicBool::new(false));

        let session = RawSession::begin(&mut first, EchoPolicy::NoEcho, false).unwrap();

        let flag = Arc::clone(&entered);
        let handle = thread::spawn(move || {
            let mut second = ScriptedConsole::new();
            let _session = RawSession::begin(&mut second, EchoPolicy::NoEcho, false).unwrap();
            flag.store(true, Ordering::SeqCst);
        });

        thread::sleep(Duration::from_millis(50));
        assert!(!entered.load(Ordering::SeqCst));

        drop(session);
        handle.join().unwrap();
        assert!(entered.load(Ordering::SeqCst));
    }
}
