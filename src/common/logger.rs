//! Structured logging with box-drawing output.
//!
//! Every line goes through [`Log::emit`], which applies the optional timestamp
//! prefix, the line style, and routes the result either to stdout or to the
//! file writer thread started by [`Log::start_file_logging`].
//!
//! ## Conventions
//!
//! - `log_block_start!` opens a new conceptual block (`┃` spacer, then `┣ msg`).
//! - `log_decorated!` continues a block (`┣ msg`).
//! - `log_indented!` adds detail under the previous line (`┃   msg`).
//! - `log_pipe!` inserts an empty `┃` spacer, typically before a levelled message.
//! - `log_info!`, `log_warning!`, `log_error!`, `log_debug!`, `log_critical!` carry a
//!   coloured `[LEVEL]` tag.
//! - `log_version!` prints the header once at startup, `log_end!` the final `╹`.
//!
//! The monitor runs with timestamps enabled so every line in a long-running log
//! file can be correlated with the power transition that produced it.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Sender, channel};

static LOGGING_ENABLED: AtomicBool = AtomicBool::new(true);
static TIMESTAMPS_ENABLED: AtomicBool = AtomicBool::new(false);

// Installed once when --log or `log_file` is active
static LOG_CHANNEL: OnceLock<Sender<LogMessage>> = OnceLock::new();

enum LogMessage {
    Formatted(String),
    Shutdown,
}

/// Visual shape of a single log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Decorated,
    Indented,
    Pipe,
    BlockStart,
    Version,
    End,
    Level(Level),
    ErrorExit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
    Debug,
    Critical,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Info => "\x1b[32mINFO\x1b[0m",
            Level::Warning => "\x1b[33mWARNING\x1b[0m",
            Level::Error => "\x1b[31mERROR\x1b[0m",
            Level::Debug => "\x1b[32mDEBUG\x1b[0m",
            Level::Critical => "\x1b[31mCRITICAL\x1b[0m",
        }
    }
}

/// Main logging interface.
pub struct Log;

impl Log {
    /// Enable or disable all output (used to keep tests quiet).
    pub fn set_enabled(enabled: bool) {
        LOGGING_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled() -> bool {
        LOGGING_ENABLED.load(Ordering::SeqCst)
    }

    /// Prefix every line with the local wall-clock time.
    pub fn set_timestamps(enabled: bool) {
        TIMESTAMPS_ENABLED.store(enabled, Ordering::SeqCst);
    }

    /// Start appending log lines to `file_path` in addition to stdout.
    ///
    /// The file is opened in append mode so restarts never truncate earlier
    /// history. ANSI colour codes are stripped before writing.
    pub fn start_file_logging(file_path: PathBuf) -> anyhow::Result<LoggerGuard> {
        if let Some(parent) = file_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)?;

        let (tx, rx) = channel();
        LOG_CHANNEL
            .set(tx.clone())
            .map_err(|_| anyhow::anyhow!("Logger channel already initialized"))?;

        let handle = std::thread::spawn(move || {
            loop {
                match rx.recv() {
                    Ok(LogMessage::Formatted(text)) => {
                        file.write_all(text.as_bytes())?;
                    }
                    Ok(LogMessage::Shutdown) | Err(_) => {
                        file.flush()?;
                        break;
                    }
                }
            }
            Ok::<(), anyhow::Error>(())
        });

        Ok(LoggerGuard {
            tx,
            handle: Some(handle),
        })
    }

    /// Timestamp prefix for the current line, empty unless enabled.
    pub fn timestamp_prefix() -> String {
        if TIMESTAMPS_ENABLED.load(Ordering::SeqCst) {
            format!("[{}] ", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"))
        } else {
            String::new()
        }
    }

    /// Render and write one line in the given style.
    pub fn emit(style: Style, message: &str) {
        if !Self::is_enabled() {
            return;
        }
        write_output(&render(&Self::timestamp_prefix(), style, message));
    }
}

/// Build the final text for a line. Split out so formatting can be tested
/// without touching stdout.
pub(crate) fn render(prefix: &str, style: Style, message: &str) -> String {
    match style {
        Style::Decorated => format!("{prefix}┣ {message}\n"),
        Style::Indented => format!("{prefix}┃   {message}\n"),
        Style::Pipe => format!("{prefix}┃\n"),
        Style::BlockStart => format!("{prefix}┃\n{prefix}┣ {message}\n"),
        Style::Version => format!(
            "{prefix}┏ keylight v{} ━━╸\n",
            env!("CARGO_PKG_VERSION")
        ),
        Style::End => format!("{prefix}╹\n"),
        Style::Level(level) => format!("{prefix}┣[{}] {message}\n", level.tag()),
        Style::ErrorExit => format!(
            "{prefix}┃\n{prefix}┗[{}] {message}\n",
            Level::Error.tag()
        ),
    }
}

/// Flushes and joins the file writer thread on drop.
pub struct LoggerGuard {
    tx: Sender<LogMessage>,
    handle: Option<std::thread::JoinHandle<anyhow::Result<()>>>,
}

impl Drop for LoggerGuard {
    fn drop(&mut self) {
        let _ = self.tx.send(LogMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == 'm' {
                    break;
                }
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Route a rendered line to stdout and, when file logging is active, to the file.
pub fn write_output(text: &str) {
    print!("{text}");
    let _ = std::io::stdout().flush();
    if let Some(tx) = LOG_CHANNEL.get() {
        let _ = tx.send(LogMessage::Formatted(strip_ansi_codes(text)));
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_styled {
    ($style:expr, $fmt:literal $($arg:tt)*) => {
        $crate::common::logger::Log::emit($style, &format!($fmt $($arg)*))
    };
    ($style:expr, $expr:expr) => {
        $crate::common::logger::Log::emit($style, &format!("{}", $expr))
    };
}

/// Log a message that continues the current block.
#[macro_export]
macro_rules! log_decorated {
    ($($arg:tt)+) => {
        $crate::__log_styled!($crate::common::logger::Style::Decorated, $($arg)+)
    };
}

/// Log a detail line under the previous message.
#[macro_export]
macro_rules! log_indented {
    ($($arg:tt)+) => {
        $crate::__log_styled!($crate::common::logger::Style::Indented, $($arg)+)
    };
}

/// Insert an empty spacer line.
#[macro_export]
macro_rules! log_pipe {
    () => {
        $crate::common::logger::Log::emit($crate::common::logger::Style::Pipe, "")
    };
}

/// Open a new block of related messages.
#[macro_export]
macro_rules! log_block_start {
    ($($arg:tt)+) => {
        $crate::__log_styled!($crate::common::logger::Style::BlockStart, $($arg)+)
    };
}

/// Print the startup header.
#[macro_export]
macro_rules! log_version {
    () => {
        $crate::common::logger::Log::emit($crate::common::logger::Style::Version, "")
    };
}

/// Print the final termination marker.
#[macro_export]
macro_rules! log_end {
    () => {
        $crate::common::logger::Log::emit($crate::common::logger::Style::End, "")
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)+) => {
        $crate::__log_styled!(
            $crate::common::logger::Style::Level($crate::common::logger::Level::Info),
            $($arg)+
        )
    };
}

#[macro_export]
macro_rules! log_warning {
    ($($arg:tt)+) => {
        $crate::__log_styled!(
            $crate::common::logger::Style::Level($crate::common::logger::Level::Warning),
            $($arg)+
        )
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)+) => {
        $crate::__log_styled!(
            $crate::common::logger::Style::Level($crate::common::logger::Level::Error),
            $($arg)+
        )
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)+) => {
        $crate::__log_styled!(
            $crate::common::logger::Style::Level($crate::common::logger::Level::Debug),
            $($arg)+
        )
    };
}

#[macro_export]
macro_rules! log_critical {
    ($($arg:tt)+) => {
        $crate::__log_styled!(
            $crate::common::logger::Style::Level($crate::common::logger::Level::Critical),
            $($arg)+
        )
    };
}

/// Log an error that terminates the current flow (`┗[ERROR]`).
#[macro_export]
macro_rules! log_error_exit {
    ($($arg:tt)+) => {
        $crate::__log_styled!($crate::common::logger::Style::ErrorExit, $($arg)+)
    };
}
