//! Per-turn diagnostic log that is shipped to the server at turn boundaries.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tokio::time::Instant;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub time: DateTime<Utc>,
    /// Seconds elapsed since the turn started.
    pub relative_time: f64,
    pub level: LogLevel,
    pub text: String,
}

/// Append-only buffer of [`LogEntry`] values for the current turn.
#[derive(Debug)]
pub struct TurnLog {
    entries: Vec<LogEntry>,
    started: Instant,
}

impl TurnLog {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            started: Instant::now(),
        }
    }

    /// Marks the start of a new turn. Later entries are relative to now.
    pub fn restart_clock(&mut self) {
        self.started = Instant::now();
    }

    pub fn push(&mut self, level: LogLevel, text: impl Into<String>) {
        self.entries.push(LogEntry {
            time: Utc::now(),
            relative_time: self.started.elapsed().as_secs_f64(),
            level,
            text: text.into(),
        });
    }

    /// Removes and returns all buffered entries.
    pub fn take(&mut self) -> Vec<LogEntry> {
        std::mem::take(&mut self.entries)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for TurnLog {
    fn default() -> Self {
        Self::new()
    }
}
