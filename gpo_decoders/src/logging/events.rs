//! Log events

use super::codes::{self, Code};
use crate::config::compile_time::logging::MAX_LOG_MESSAGE_LENGTH;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warning = 1,
    Info = 2,
    Debug = 3,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }
}

/// Core log event structure
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub timestamp: SystemTime,
    pub level: LogLevel,
    pub code: Code,
    pub message: String,
    pub context: BTreeMap<String, String>,
}

impl LogEvent {
    fn new(level: LogLevel, code: Code, message: &str) -> Self {
        let mut message = message.to_string();
        if message.len() > MAX_LOG_MESSAGE_LENGTH {
            let mut cut = MAX_LOG_MESSAGE_LENGTH;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
        }
        Self {
            timestamp: SystemTime::now(),
            level,
            code,
            message,
            context: BTreeMap::new(),
        }
    }

    pub fn error(error_code: Code, message: &str) -> Self {
        Self::new(LogLevel::Error, error_code, message)
    }

    /// Warnings may not have codes
    pub fn warning(message: &str) -> Self {
        Self::new(LogLevel::Warning, Code::new("W000"), message)
    }

    pub fn warning_with_code(warning_code: Code, message: &str) -> Self {
        Self::new(LogLevel::Warning, warning_code, message)
    }

    pub fn info(message: &str) -> Self {
        Self::new(LogLevel::Info, Code::new("I000"), message)
    }

    /// Info event carrying a success code
    pub fn success(success_code: Code, message: &str) -> Self {
        Self::new(LogLevel::Info, success_code, message)
    }

    pub fn debug(message: &str) -> Self {
        Self::new(LogLevel::Debug, Code::new("D000"), message)
    }

    /// Add context data
    pub fn with_context(mut self, key: &str, value: &str) -> Self {
        self.context.insert(key.to_string(), value.to_string());
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == LogLevel::Error
    }

    pub fn is_warning(&self) -> bool {
        self.level == LogLevel::Warning
    }

    /// `[LEVEL] CODE - message (k=v, ..)`
    pub fn format(&self) -> String {
        let mut line = format!("[{}] {} - {}", self.level.as_str(), self.code, self.message);
        if !self.context.is_empty() {
            let pairs: Vec<String> = self
                .context
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            line.push_str(&format!(" ({})", pairs.join(", ")));
        }
        line
    }

    /// One JSON object per event; errors carry their registry metadata
    pub fn format_json(&self) -> Result<String, serde_json::Error> {
        let code = self.code.as_str();
        let metadata = self.is_error().then(|| ErrorMetadata {
            recoverable: codes::is_recoverable(code),
            requires_halt: codes::requires_halt(code),
            description: codes::get_description(code),
            recommended_action: codes::get_action(code),
        });
        serde_json::to_string(&JsonEvent {
            timestamp: self
                .timestamp
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
            level: self.level.as_str(),
            code,
            message: &self.message,
            category: codes::get_category(code),
            severity: codes::get_severity(code).as_str(),
            error_metadata: metadata,
            context: &self.context,
        })
    }
}

#[derive(Serialize)]
struct ErrorMetadata {
    recoverable: bool,
    requires_halt: bool,
    description: &'static str,
    recommended_action: &'static str,
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    timestamp: u64,
    level: &'static str,
    code: &'a str,
    message: &'a str,
    category: &'static str,
    severity: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_metadata: Option<ErrorMetadata>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    context: &'a BTreeMap<String, String>,
}
