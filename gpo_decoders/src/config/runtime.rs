//! Runtime preferences
//!
//! Hard limits live in the generated `compile_time` module. Everything here is a
//! user preference read from the environment, with defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Decoder preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderPreferences {
    /// Directory holding a `gpo_files_structure.toml` that replaces the builtin schema
    pub schema_dir: Option<PathBuf>,

    /// Keep the verbatim content of files found under `Scripts/<phase>/`
    pub retain_script_content: bool,

    /// Log every file that decodes to nothing because the schema excludes it
    pub log_excluded_files: bool,
}

impl Default for DecoderPreferences {
    fn default() -> Self {
        Self {
            schema_dir: env::var(env_vars::SCHEMA_DIR).ok().map(PathBuf::from),
            retain_script_content: env::var(env_vars::RETAIN_SCRIPT_CONTENT)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
            log_excluded_files: env::var(env_vars::LOG_EXCLUDED_FILES)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        }
    }
}

impl DecoderPreferences {
    pub fn with_schema_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.schema_dir = Some(dir.into());
        self
    }

    pub fn with_script_content(mut self, retain: bool) -> Self {
        self.retain_script_content = retain;
        self
    }
}

/// Logging preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingPreferences {
    /// Whether to use structured JSON logging
    pub use_structured_logging: bool,

    /// Whether events are forwarded to the `log` facade instead of printed directly
    pub forward_to_log_facade: bool,

    /// Minimum level that is emitted
    pub min_log_level: LogLevel,

    /// Whether to include file context in log messages
    pub include_file_context: bool,
}

impl Default for LoggingPreferences {
    fn default() -> Self {
        Self {
            use_structured_logging: env::var(env_vars::LOGGING_USE_STRUCTURED)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            forward_to_log_facade: env::var(env_vars::LOGGING_FORWARD_TO_FACADE)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
            min_log_level: env::var(env_vars::LOGGING_MIN_LEVEL)
                .ok()
                .and_then(|v| parse_log_level(&v))
                .unwrap_or(LogLevel::Info),
            include_file_context: env::var(env_vars::LOGGING_INCLUDE_FILE_CONTEXT)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
        }
    }
}

impl LoggingPreferences {
    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_log_level = level;
        self
    }

    pub fn with_structured(mut self, structured: bool) -> Self {
        self.use_structured_logging = structured;
        self
    }

    pub fn with_facade(mut self, forward: bool) -> Self {
        self.forward_to_log_facade = forward;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Error = 0,
    Warning = 1,
    Info = 2,
    Debug = 3,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warning => "warning",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }

    /// Convert to the event-level enum used by the logging service
    pub fn to_events_log_level(self) -> crate::logging::LogLevel {
        match self {
            LogLevel::Error => crate::logging::LogLevel::Error,
            LogLevel::Warning => crate::logging::LogLevel::Warning,
            LogLevel::Info => crate::logging::LogLevel::Info,
            LogLevel::Debug => crate::logging::LogLevel::Debug,
        }
    }
}

pub fn parse_log_level(value: &str) -> Option<LogLevel> {
    match value.trim().to_ascii_lowercase().as_str() {
        "error" => Some(LogLevel::Error),
        "warn" | "warning" => Some(LogLevel::Warning),
        "info" => Some(LogLevel::Info),
        "debug" | "trace" => Some(LogLevel::Debug),
        _ => None,
    }
}

/// Environment variable names for configuration
pub mod env_vars {
    pub const SCHEMA_DIR: &str = "GPO_SCHEMA_DIR";
    pub const RETAIN_SCRIPT_CONTENT: &str = "GPO_RETAIN_SCRIPT_CONTENT";
    pub const LOG_EXCLUDED_FILES: &str = "GPO_LOG_EXCLUDED_FILES";

    pub const LOGGING_USE_STRUCTURED: &str = "GPO_STRUCTURED_LOGS";
    pub const LOGGING_FORWARD_TO_FACADE: &str = "GPO_LOG_FACADE";
    pub const LOGGING_MIN_LEVEL: &str = "GPO_LOG_LEVEL";
    pub const LOGGING_INCLUDE_FILE_CONTEXT: &str = "GPO_LOG_FILE_CONTEXT";
}
