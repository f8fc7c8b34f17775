// Copyright 2023 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! A minimal logging backend for the `log` facade. Messages are filtered by
//! level and written synchronously to a single output, either standard error
//! or a file. Binaries construct a [`LogBuilder`], configure it, and call
//! `init()` once at startup.

pub use log::*;

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

enum Output {
    Stderr,
    File(PathBuf),
}

pub struct LogBuilder {
    level: LevelFilter,
    output: Output,
}

impl Default for LogBuilder {
    fn default() -> Self {
        Self {
            level: LevelFilter::Info,
            output: Output::Stderr,
        }
    }
}

impl LogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }

    pub fn output_file(mut self, path: PathBuf) -> Self {
        self.output = Output::File(path);
        self
    }

    /// Installs the logger as the global `log` backend. Returns an error if a
    /// logger was already installed or the log file cannot be opened.
    pub fn init(self) -> Result<(), std::io::Error> {
        let writer: Box<dyn Write + Send> = match self.output {
            Output::Stderr => Box::new(std::io::stderr()),
            Output::File(path) => Box::new(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?,
            ),
        };

        let logger = Logger {
            level: self.level,
            writer: Mutex::new(writer),
        };

        set_boxed_logger(Box::new(logger))
            .map(|()| set_max_level(self.level))
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::AlreadyExists, e.to_string()))
    }
}

struct Logger {
    level: LevelFilter,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();

        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(
                writer,
                "{}.{:03} {} [{}] {}",
                now.as_secs(),
                now.subsec_millis(),
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("silo.log");

        LogBuilder::new()
            .level(LevelFilter::Debug)
            .output_file(path.clone())
            .init()
            .expect("init logger");

        info!("hello");
        debug!("world");
        logger().flush();

        let contents = std::fs::read_to_string(path).expect("read log");
        assert!(contents.contains("hello"));
        assert!(contents.contains("world"));
    }
}
