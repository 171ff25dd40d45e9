//! Core console primitives.
//!
//! - **backend**: the capability interface every console implements
//! - **session**: scoped raw-mode acquisition with guaranteed restore
//! - **reader**: single-character raw input with selectable echo
//! - **reply** / **locate**: Device Status Report query and reply parsing
//! - **unix** / **win32**: the process console, one per platform
//! - **scripted**: in-memory console for tests and headless use
//!
//! # Architecture
//!
//! ```text
//! CursorLocator
//! ├── ConsoleBackend::native_cursor (Windows screen buffer)
//! └── RawSession (NoEcho)
//!     ├── write ESC [ 6 n
//!     └── DsrParser <- ESC [ row ; col R
//!
//! RawModeReader
//! └── RawSession (Echo / NoEcho) -> one byte
//! ```

pub mod backend;
pub mod error;
pub mod locate;
pub mod reader;
pub mod reply;
pub mod scripted;
pub mod session;

#[cfg(unix)]
pub mod unix;
#[cfg(windows)]
pub mod win32;

pub use backend::{ConsoleBackend, EchoPolicy};
pub use error::{ConsoleError, Result};
pub use locate::{CursorLocator, CursorPosition, LocatorOptions, DSR_CURSOR_QUERY};
pub use reader::RawModeReader;
pub use reply::{parse_reply, DsrParser};
pub use scripted::{ModeFlags, ScriptedConsole};
pub use session::RawSession;

/// Console of the running process.
#[cfg(unix)]
pub type SystemConsole = unix::PosixConsole;

/// Console of the running process.
#[cfg(windows)]
pub type SystemConsole = win32::WinConsole;
