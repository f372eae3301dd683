//! Toolkit logger interface and log message model

use crate::error::{ErrorDescription, ServiceError};
use chrono::{DateTime, Utc};

/// Log severity, ordered from least to most verbose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    None,
    Fatal,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Fatal => "FATAL",
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
        }
    }

    /// Parse a level name or its numeric value (`0` = none .. `6` = trace)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "0" | "NONE" | "NOTHING" => Some(Self::None),
            "1" | "FATAL" => Some(Self::Fatal),
            "2" | "ERROR" => Some(Self::Error),
            "3" | "WARN" | "WARNING" => Some(Self::Warn),
            "4" | "INFO" => Some(Self::Info),
            "5" | "DEBUG" => Some(Self::Debug),
            "6" | "TRACE" => Some(Self::Trace),
            _ => None,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A buffered log line
#[derive(Debug, Clone, PartialEq)]
pub struct LogMessage {
    pub time: DateTime<Utc>,
    pub source: Option<String>,
    pub level: LogLevel,
    pub trace_id: Option<String>,
    pub error: Option<ErrorDescription>,
    pub message: String,
}

impl LogMessage {
    pub fn new(level: LogLevel, trace_id: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            time: Utc::now(),
            source: None,
            level,
            trace_id: trace_id.map(str::to_string),
            error: None,
            message: message.into(),
        }
    }
}

/// Logger capability that components write to
pub trait Logger: Send + Sync {
    /// Maximum level that is written
    fn level(&self) -> LogLevel;

    fn write(&self, message: LogMessage);

    fn log(
        &self,
        level: LogLevel,
        trace_id: Option<&str>,
        error: Option<&ServiceError>,
        message: &str,
    ) {
        if level == LogLevel::None || level > self.level() {
            return;
        }
        let mut entry = LogMessage::new(level, trace_id, message);
        entry.error = error.map(ServiceError::to_description);
        self.write(entry);
    }

    fn error(&self, trace_id: Option<&str>, error: Option<&ServiceError>, message: &str) {
        self.log(LogLevel::Error, trace_id, error, message);
    }

    fn warn(&self, trace_id: Option<&str>, message: &str) {
        self.log(LogLevel::Warn, trace_id, None, message);
    }

    fn info(&self, trace_id: Option<&str>, message: &str) {
        self.log(LogLevel::Info, trace_id, None, message);
    }

    fn debug(&self, trace_id: Option<&str>, message: &str) {
        self.log(LogLevel::Debug, trace_id, None, message);
    }

    fn trace(&self, trace_id: Option<&str>, message: &str) {
        self.log(LogLevel::Trace, trace_id, None, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct MemoryLogger {
        level: LogLevel,
        lines: Mutex<Vec<LogMessage>>,
    }

    impl Logger for MemoryLogger {
        fn level(&self) -> LogLevel {
            self.level
        }

        fn write(&self, message: LogMessage) {
            self.lines.lock().push(message);
        }
    }

    #[test]
    fn test_parse_levels() {
        assert_eq!(LogLevel::parse("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("5"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("loud"), None);
        assert!(LogLevel::Error < LogLevel::Info);
    }

    #[test]
    fn test_level_filtering() {
        let logger = MemoryLogger {
            level: LogLevel::Info,
            lines: Mutex::new(Vec::new()),
        };

        logger.debug(None, "dropped");
        logger.info(Some("t1"), "kept");
        let error = ServiceError::internal("BOOM", "It broke");
        logger.error(Some("t2"), Some(&error), "failed");

        let lines = logger.lines.lock();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].trace_id.as_deref(), Some("t1"));
        assert_eq!(lines[1].error.as_ref().unwrap().code, "BOOM");
    }
}
