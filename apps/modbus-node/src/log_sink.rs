// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Console logging backend for targets without env_logger.
// Author: Lukas Bower

//! `log` backend that writes bounded `[LEVEL target] message` lines to a console.

use alloc::boxed::Box;
use core::fmt::Write;

use heapless::{String as HeaplessString, Vec as HeaplessVec};
use log::{LevelFilter, Log, Metadata, Record};
use spin::Mutex;
use thiserror::Error;

use crate::config::LogSinks;

/// Longest rendered line, including the trailing CRLF.
pub const MAX_LINE_LEN: usize = 192;

static_assertions::const_assert!(MAX_LINE_LEN > 2);

/// Byte sink the logger writes complete lines to.
pub trait ConsoleWrite: Send {
    /// Write one terminated line.
    fn write_line(&mut self, line: &[u8]);
}

/// Errors raised when installing the logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LogInitError {
    /// Another logger already owns the `log` facade.
    #[error("a logger is already installed")]
    AlreadyInstalled,
    /// Console output was disabled and no other sink is available.
    #[error("no supported log sink enabled")]
    NoSinks,
}

/// Logger that serialises lines onto a single console.
pub struct NodeLogger {
    console: Mutex<Box<dyn ConsoleWrite>>,
    level: LevelFilter,
}

impl NodeLogger {
    /// Logger emitting records at or below `level`.
    #[must_use]
    pub fn new(console: Box<dyn ConsoleWrite>, level: LevelFilter) -> Self {
        Self {
            console: Mutex::new(console),
            level,
        }
    }
}

impl Log for NodeLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = render_line(record);
        self.console.lock().write_line(line.as_slice());
    }

    fn flush(&self) {}
}

/// Format a record as a CRLF-terminated line. Text past the line capacity is dropped.
#[must_use]
pub fn render_line(record: &Record<'_>) -> HeaplessVec<u8, MAX_LINE_LEN> {
    let mut formatted: HeaplessString<{ MAX_LINE_LEN - 2 }> = HeaplessString::new();
    let _ = write!(
        formatted,
        "[{level} {target}] {message}",
        level = record.level(),
        target = record.target(),
        message = record.args(),
    );
    let mut line = HeaplessVec::new();
    let _ = line.extend_from_slice(formatted.as_bytes());
    let _ = line.extend_from_slice(b"\r\n");
    line
}

/// Reject sink selections without console output.
pub fn require_console(sinks: LogSinks) -> Result<(), LogInitError> {
    if sinks.stdout {
        Ok(())
    } else {
        Err(LogInitError::NoSinks)
    }
}

/// Warn once for each requested sink this node cannot provide. Returns how
/// many were ignored.
pub fn warn_unsupported(sinks: LogSinks) -> usize {
    let mut ignored = 0;
    if sinks.disk_file {
        log::warn!(target: "modbus_node::log", "[log] disk log sink unsupported; ignoring");
        ignored += 1;
    }
    if sinks.udp {
        log::warn!(target: "modbus_node::log", "[log] udp log sink unsupported; ignoring");
        ignored += 1;
    }
    ignored
}

/// Install a [`NodeLogger`] as the global logger for the requested sinks.
///
/// Only console output exists on this node; disk and UDP requests are logged
/// and ignored.
pub fn install(
    console: Box<dyn ConsoleWrite>,
    sinks: LogSinks,
    level: LevelFilter,
) -> Result<(), LogInitError> {
    require_console(sinks)?;
    let logger: &'static NodeLogger = Box::leak(Box::new(NodeLogger::new(console, level)));
    log::set_logger(logger).map_err(|_| LogInitError::AlreadyInstalled)?;
    log::set_max_level(level);
    warn_unsupported(sinks);
    Ok(())
}

/// Console backed by the process stdout.
#[cfg(feature = "std")]
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutConsole;

#[cfg(feature = "std")]
impl ConsoleWrite for StdoutConsole {
    fn write_line(&mut self, line: &[u8]) {
        use std::io::Write as _;
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(line);
        let _ = out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;
    use std::sync::{Arc, Mutex as StdMutex};

    #[derive(Clone, Default)]
    struct Capture(Arc<StdMutex<Vec<Vec<u8>>>>);

    impl ConsoleWrite for Capture {
        fn write_line(&mut self, line: &[u8]) {
            self.0.lock().unwrap().push(line.to_vec());
        }
    }

    #[test]
    fn lines_carry_level_and_target() {
        let capture = Capture::default();
        let logger = NodeLogger::new(Box::new(capture.clone()), LevelFilter::Info);
        logger.log(
            &Record::builder()
                .level(Level::Info)
                .target("modbus_node::supervisor")
                .args(format_args!("IP Address: {}", "10.0.2.15"))
                .build(),
        );
        logger.log(
            &Record::builder()
                .level(Level::Debug)
                .target("modbus_node::timer")
                .args(format_args!("suppressed"))
                .build(),
        );
        let lines = capture.0.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(
            lines[0].as_slice(),
            b"[INFO modbus_node::supervisor] IP Address: 10.0.2.15\r\n"
        );
    }

    #[test]
    fn long_messages_stay_bounded_and_terminated() {
        let long = "x".repeat(400);
        let line = render_line(
            &Record::builder()
                .level(Level::Warn)
                .target("t")
                .args(format_args!("{long}"))
                .build(),
        );
        assert!(line.len() <= MAX_LINE_LEN);
        assert!(line.ends_with(b"\r\n"));
    }

    #[test]
    fn install_requires_console() {
        let sinks = LogSinks {
            stdout: false,
            disk_file: true,
            udp: false,
        };
        assert_eq!(
            install(Box::new(Capture::default()), sinks, LevelFilter::Info),
            Err(LogInitError::NoSinks)
        );
    }

    #[test]
    fn installed_logger_warns_about_unsupported_sinks() {
        let capture = Capture::default();
        let sinks = LogSinks {
            stdout: true,
            disk_file: true,
            udp: true,
        };
        install(Box::new(capture.clone()), sinks, LevelFilter::Warn).unwrap();
        assert_eq!(
            install(Box::new(Capture::default()), sinks, LevelFilter::Warn),
            Err(LogInitError::AlreadyInstalled)
        );

        let lines = capture.0.lock().unwrap();
        let warnings: Vec<&[u8]> = lines
            .iter()
            .map(Vec::as_slice)
            .filter(|line| line.starts_with(b"[WARN modbus_node::log]"))
            .collect();
        assert_eq!(
            warnings,
            [
                b"[WARN modbus_node::log] [log] disk log sink unsupported; ignoring\r\n".as_slice(),
                b"[WARN modbus_node::log] [log] udp log sink unsupported; ignoring\r\n".as_slice(),
            ]
        );
    }
}
