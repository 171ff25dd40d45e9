//! conlite - a lightweight conio-style console library
//!
//! conlite gives interactive programs direct terminal control without a
//! full TUI framework:
//!
//! - **Raw key input**: read one character without waiting for Enter,
//!   with or without echo ([`RawModeReader`], [`Console::getch`])
//! - **Cursor query**: find the cursor via a Device Status Report or the
//!   Windows console API ([`CursorLocator`], [`Console::wherexy`])
//! - **Cursor movement and clearing**: `gotoxy`, `clrscr`, `delline`, ...
//! - **Buffered string I/O**: `cputs`, `cgets`, `cscan`
//!
//! The terminal's input mode is always restored before a call returns,
//! including on errors and panics.

pub mod config;
pub mod console;
pub mod core;

pub use crate::config::Config;
pub use crate::console::{Console, EOF};
pub use crate::core::{
    ConsoleBackend, ConsoleError, CursorLocator, CursorPosition, EchoPolicy, LocatorOptions,
    RawModeReader, Result, ScriptedConsole, SystemConsole,
};
