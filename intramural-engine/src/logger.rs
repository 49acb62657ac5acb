//! Process logging. Output goes to stdout as `[time] [file:line] [LEVEL] message`.
use chrono::Local;
use log::{set_logger, set_max_level, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

static LOGGER: Logger = Logger;

/// Installs the [`Logger`] as the global logger.
///
/// # Errors
///
/// Returns an error if a logger was already installed.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    set_logger(&LOGGER)?;
    set_max_level(level);
    Ok(())
}

#[derive(Copy, Clone, Debug)]
pub struct Logger;

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        println!("{}", format(record));
    }

    fn flush(&self) {}
}

fn format(record: &Record) -> String {
    let now = Local::now().format("%Y-%m-%d %H:%M:%S");

    let level = match record.level() {
        Level::Error => "ERROR",
        Level::Warn => "WARN",
        Level::Info => "INFO",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    };

    format!(
        "[{}] [{}:{}] [{}] {}",
        now,
        record.file().unwrap_or("???"),
        record.line().unwrap_or(0),
        level,
        record.args()
    )
}
