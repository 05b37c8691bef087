// Logging utilities
// Author: Gabriel Demetrios Lafis

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use log::{Level, LevelFilter, Metadata, Record};

use super::AppResult;

/// Destination for the log records produced by pipeline components.
///
/// Components hold an `Arc<dyn LogSink>` handed to them at construction and
/// never reach for the global logger themselves.
pub trait LogSink: Send + Sync {
    /// Record one message
    fn record(&self, level: Level, target: &str, message: &str);

    fn error(&self, target: &str, message: &str) {
        self.record(Level::Error, target, message);
    }

    fn warn(&self, target: &str, message: &str) {
        self.record(Level::Warn, target, message);
    }

    fn info(&self, target: &str, message: &str) {
        self.record(Level::Info, target, message);
    }

    fn debug(&self, target: &str, message: &str) {
        self.record(Level::Debug, target, message);
    }
}

/// Sink forwarding to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFacadeSink;

impl LogFacadeSink {
    /// Shared handle to a facade sink
    pub fn shared() -> Arc<dyn LogSink> {
        Arc::new(LogFacadeSink)
    }
}

impl LogSink for LogFacadeSink {
    fn record(&self, level: Level, target: &str, message: &str) {
        log::log!(target: target, level, "{}", message);
    }
}

/// A captured log record
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub level: Level,
    pub target: String,
    pub message: String,
}

/// Sink keeping every record in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records so far
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Messages recorded at warning level
    pub fn warnings(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.level == Level::Warn)
            .map(|entry| entry.message)
            .collect()
    }
}

impl LogSink for MemorySink {
    fn record(&self, level: Level, target: &str, message: &str) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(LogEntry {
                level,
                target: target.to_string(),
                message: message.to_string(),
            });
    }
}

/// Parse a level name, defaulting to `Info` for unknown names
pub fn parse_level_filter(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" | "warning" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// Initialize logging with the given level, optionally appending to a file
pub fn init_logging(level: LevelFilter, file: Option<&Path>) -> AppResult<()> {
    let file = match file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Some(Mutex::new(
                OpenOptions::new().create(true).append(true).open(path)?,
            ))
        }
        None => None,
    };

    log::set_boxed_logger(Box::new(SimpleLogger { level, file }))?;
    log::set_max_level(level);
    Ok(())
}

/// Simple logger implementation
struct SimpleLogger {
    level: LevelFilter,
    file: Option<Mutex<File>>,
}

impl log::Log for SimpleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let level_str = match record.level() {
            Level::Error => "\x1B[31mERROR\x1B[0m",
            Level::Warn => "\x1B[33mWARN\x1B[0m",
            Level::Info => "\x1B[32mINFO\x1B[0m",
            Level::Debug => "\x1B[34mDEBUG\x1B[0m",
            Level::Trace => "\x1B[90mTRACE\x1B[0m",
        };
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");

        println!("[{}] {} {}: {}", now, level_str, record.target(), record.args());

        if let Some(file) = &self.file {
            let mut file = file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            // A failed log write has nowhere better to go
            let _ = writeln!(
                file,
                "{} - {} - {} - {}",
                now,
                record.target(),
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        if let Some(file) = &self.file {
            let mut file = file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let _ = file.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_collects_warnings() {
        let sink = MemorySink::new();
        sink.info("test", "started");
        sink.warn("test", "column missing");
        assert_eq!(sink.entries().len(), 2);
        assert_eq!(sink.warnings(), vec!["column missing".to_string()]);
    }

    #[test]
    fn test_parse_level_filter() {
        assert_eq!(parse_level_filter("DEBUG"), LevelFilter::Debug);
        assert_eq!(parse_level_filter("warning"), LevelFilter::Warn);
        assert_eq!(parse_level_filter("verbose"), LevelFilter::Info);
    }
}
