//! Logging configuration
//!
//! Hard caps come from the generated compile-time constants; the rest is the
//! runtime preference set once at startup.

use crate::config::compile_time::logging::*;
use crate::config::runtime::LoggingPreferences;
use std::sync::OnceLock;

type EventsLogLevel = crate::logging::events::LogLevel;

static RUNTIME_PREFERENCES: OnceLock<LoggingPreferences> = OnceLock::new();

/// Initialize runtime preferences
pub fn init_runtime_preferences(preferences: LoggingPreferences) -> Result<(), String> {
    RUNTIME_PREFERENCES
        .set(preferences)
        .map_err(|_| "Runtime preferences already initialized".to_string())
}

fn get_runtime_preferences() -> LoggingPreferences {
    RUNTIME_PREFERENCES.get().cloned().unwrap_or_default()
}

pub fn get_min_log_level() -> EventsLogLevel {
    get_runtime_preferences().min_log_level.to_events_log_level()
}

pub fn use_structured_logging() -> bool {
    get_runtime_preferences().use_structured_logging
}

pub fn forward_to_log_facade() -> bool {
    get_runtime_preferences().forward_to_log_facade
}

pub fn include_file_context() -> bool {
    get_runtime_preferences().include_file_context
}

pub fn get_max_log_events_per_file() -> usize {
    MAX_LOG_EVENTS_PER_FILE
}

pub fn get_max_error_collection() -> usize {
    MAX_ERROR_COLLECTION
}

/// Validate compile-time logging limits
pub fn validate_config() -> Result<(), String> {
    if MAX_LOG_EVENTS_PER_FILE == 0 {
        return Err("Max log events per file must be positive".to_string());
    }
    if MAX_LOG_EVENTS_PER_FILE > MAX_ERROR_COLLECTION {
        return Err("Max log events per file exceeds total error collection".to_string());
    }
    if MAX_LOG_MESSAGE_LENGTH < 64 {
        return Err(format!(
            "Max log message length too small: {}",
            MAX_LOG_MESSAGE_LENGTH
        ));
    }
    Ok(())
}
