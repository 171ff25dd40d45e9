//! conlite - interactive driver for the conlite console library
//!
//! Runs the library's primitives against the real terminal, one command at
//! a time, so their behavior can be checked by eye.
//!
//! # Quick Start
//!
//! ```text
//! conlite              # Cursor demo: remember position, jump, come back
//! conlite getch        # Read a key without echo
//! conlite where        # Print the cursor position
//! conlite goto 20 1    # Move the cursor
//! ```

use std::env;
use std::io::Write;

use anyhow::Context;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use conlite::{Config, Console, SystemConsole, EOF};

/// Command selected on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Demo,
    Getch,
    Getche,
    Where,
    Goto(u16, u16),
    Clear,
    Reset,
    Gets,
    Scan,
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    eprintln!("conlite {}", VERSION);
}

fn print_help() {
    eprintln!("conlite {} - conio-style console primitives", VERSION);
    eprintln!();
    eprintln!("Usage: conlite [COMMAND]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  demo                  Cursor round trip (default)");
    eprintln!("  getch                 Read a key without echo");
    eprintln!("  getche                Read a key with echo");
    eprintln!("  where                 Print the cursor position");
    eprintln!("  goto <X> <Y>          Move the cursor (1-based)");
    eprintln!("  clear                 Clear the screen");
    eprintln!("  reset                 Reset attributes, scrollback and screen");
    eprintln!("  gets                  Read a line");
    eprintln!("  scan                  Read a line and an integer");
    eprintln!();
    eprintln!("Other options:");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Configuration: ~/.conlite/config.toml");
    eprintln!("Log file:      ~/.conlite/conlite.log");
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    let Some(first) = args.first() else {
        return Ok(Command::Demo);
    };

    let command = match first.as_str() {
        "-h" | "--help" => {
            print_help();
            std::process::exit(0);
        }
        "-v" | "--version" => {
            print_version();
            std::process::exit(0);
        }
        "demo" => Command::Demo,
        "getch" => Command::Getch,
        "getche" => Command::Getche,
        "where" => Command::Where,
        "goto" => {
            let x = parse_coord(args.get(1), "X")?;
            let y = parse_coord(args.get(2), "Y")?;
            if args.len() > 3 {
                return Err(format!("Unexpected argument: {}", args[3]));
            }
            return Ok(Command::Goto(x, y));
        }
        "clear" => Command::Clear,
        "reset" => Command::Reset,
        "gets" => Command::Gets,
        "scan" => Command::Scan,
        arg => return Err(format!("Unknown argument: {}. Use -h for help.", arg)),
    };

    if args.len() > 1 {
        return Err(format!("Unexpected argument: {}", args[1]));
    }
    Ok(command)
}

fn parse_coord(arg: Option<&String>, name: &str) -> Result<u16, String> {
    let arg = arg.ok_or_else(|| format!("Missing {} coordinate", name))?;
    arg.parse()
        .map_err(|_| format!("Invalid {} coordinate: {}", name, arg))
}

/// Initialize logging to file
fn init_logging(config: &Config) {
    let log_path = Config::log_path();

    // Create log directory if needed
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.log_level))
            .unwrap_or_else(|_| EnvFilter::new(Level::INFO.as_str()));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn describe_key(con: &mut Console<SystemConsole>, code: i32) -> anyhow::Result<()> {
    if code == EOF {
        writeln!(con, "\r\nEntered key: <EOF>")?;
        return Ok(());
    }
    write!(con, "\r\nEntered key: ")?;
    con.putch(code as u8)?;
    writeln!(con, "\r\nInteger value: {}", code)?;
    writeln!(con, "Hex value: {:x}", code)?;
    Ok(())
}

fn run_demo(con: &mut Console<SystemConsole>) -> anyhow::Result<()> {
    con.cputs("Test: gotoxy, wherex, wherey\n\n")?;

    let (x, y) = (con.wherex(), con.wherey());
    info!("Start position: {}x{}", x, y);

    con.gotoxy(20, 1)?;
    con.cputs("Hi there (from coord: X20 Y1)")?;

    con.gotoxy(x, y)?;
    con.cputs("Now I'm back\n")?;

    con.cputs("Current position: ")?;
    let pos = con.wherexy();
    writeln!(con, "X:{} Y:{}", pos.column, pos.row)?;
    if !pos.is_known() {
        con.cputs("(terminal did not report a position)\n")?;
    }
    Ok(())
}

fn run(command: Command, con: &mut Console<SystemConsole>) -> anyhow::Result<()> {
    match command {
        Command::Demo => run_demo(con)?,
        Command::Getch => {
            con.cputs("getch: Enter any key...")?;
            let code = con.getch();
            describe_key(con, code)?;
        }
        Command::Getche => {
            con.cputs("getche: Enter any key... ")?;
            let code = con.getche();
            describe_key(con, code)?;
        }
        Command::Where => {
            let pos = con.try_wherexy().context("cursor query failed")?;
            writeln!(con, "X:{} Y:{}", pos.column, pos.row)?;
        }
        Command::Goto(x, y) => {
            con.gotoxy(x, y)?;
            write!(con, "Hi there (from coord: X{} Y{})", x, y)?;
            con.flush()?;
        }
        Command::Clear => con.clrscr()?,
        Command::Reset => con.rstscr()?,
        Command::Gets => {
            con.cputs("Enter a string: ")?;
            let line = con.cgets(49)?;
            writeln!(con, "You entered: {}", line)?;
            writeln!(con, "Length of the string: {}", line.len())?;
        }
        Command::Scan => {
            con.cputs("Enter a string: ")?;
            let line = con.cgets(49)?;
            con.cputs("Enter an integer: ")?;
            let num: i64 = con.cscan()?;
            writeln!(con, "String: {}", line)?;
            writeln!(con, "Integer: {}", num)?;
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    // A load error is logged once the subscriber is installed
    let loaded = Config::try_load();
    let config = loaded.as_ref().cloned().unwrap_or_default();
    init_logging(&config);
    if let Err(e) = &loaded {
        warn!(error = %e, "using default config");
    }
    info!("conlite {} starting: {:?}", VERSION, command);

    let mut con = Console::open_with_config(&config).context("failed to open console")?;
    run(command, &mut con)?;

    Ok(())
}
