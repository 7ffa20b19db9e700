//! Global logging for the GPO workspace
//!
//! Thread-safe global logging with per-file event collection and a small
//! macro interface. Every crate in the workspace logs through this module.

pub mod codes;
pub mod collector;
pub mod config;
pub mod events;
pub mod macros;
pub mod service;

use std::cell::RefCell;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

pub use codes::Code;
pub use collector::{ErrorCollector, FileProcessingContext, ProcessingSummary};
pub use events::{LogEvent, LogLevel};
pub use service::{
    ConsoleLogger, FacadeLogger, Logger, LoggingService, MemoryLogger, StructuredLogger,
};

static GLOBAL_LOGGER: OnceLock<Arc<LoggingService>> = OnceLock::new();
static GLOBAL_ERROR_COLLECTOR: OnceLock<Arc<ErrorCollector>> = OnceLock::new();

thread_local! {
    static FILE_CONTEXT: RefCell<Option<FileProcessingContext>> = const { RefCell::new(None) };
}

/// Install the service described by the runtime preferences
pub fn init_global_logging() -> Result<(), String> {
    config::validate_config().map_err(|e| format!("Invalid logging limits: {}", e))?;

    for code in [
        codes::file_processing::FILE_NOT_FOUND,
        codes::decoding::MALFORMED_DATA,
        codes::configuration::RULES_LOAD_FAILURE,
        codes::analysis::CRYPTO_FAILURE,
    ] {
        if codes::get_description(code.as_str()) == "Unknown error" {
            return Err(format!("No metadata registered for {}", code));
        }
    }

    let service = Arc::new(service::create_configured_service());
    init_global_logging_with_service(service.clone())?;
    service.log_event(LogEvent::success(
        codes::success::SYSTEM_INITIALIZATION_COMPLETED,
        "Logging ready",
    ));
    Ok(())
}

pub fn init_global_logging_with_service(service: Arc<LoggingService>) -> Result<(), String> {
    GLOBAL_LOGGER
        .set(service)
        .map_err(|_| "Global logger already initialized".to_string())?;
    GLOBAL_ERROR_COLLECTOR
        .set(Arc::new(ErrorCollector::new()))
        .map_err(|_| "Global error collector already initialized".to_string())
}

pub fn try_get_global_logger() -> Option<&'static LoggingService> {
    GLOBAL_LOGGER.get().map(Arc::as_ref)
}

pub fn try_get_global_error_collector() -> Option<&'static ErrorCollector> {
    GLOBAL_ERROR_COLLECTOR.get().map(Arc::as_ref)
}

/// Tag events raised on this thread with the policy file being decoded
pub fn set_file_context(file_path: PathBuf, file_id: usize) {
    let context = FileProcessingContext::new(file_path, file_id);
    if let Some(collector) = try_get_global_error_collector() {
        collector.record_file_context(context.clone());
    }
    FILE_CONTEXT.with(|ctx| *ctx.borrow_mut() = Some(context));
}

pub fn clear_file_context() {
    FILE_CONTEXT.with(|ctx| *ctx.borrow_mut() = None);
}

/// Run `f` with the file context set; the context is cleared afterwards
pub fn with_file_context<F, R>(file_path: PathBuf, file_id: usize, f: F) -> R
where
    F: FnOnce() -> R,
{
    set_file_context(file_path, file_id);
    let result = f();
    clear_file_context();
    result
}

pub fn get_current_file_context() -> Option<FileProcessingContext> {
    FILE_CONTEXT.with(|ctx| ctx.borrow().clone())
}

/// Attach context pairs and the current file, then hand the event to the
/// collector (errors and warnings only) and to the global service
fn emit(mut event: LogEvent, context: Vec<(&str, &str)>) {
    for (key, value) in context {
        event = event.with_context(key, value);
    }

    let file_ctx = get_current_file_context();
    if let Some(file) = file_ctx.as_ref().filter(|_| config::include_file_context()) {
        event = event
            .with_context("file", &file.file_path.display().to_string())
            .with_context("file_id", &file.file_id.to_string());
    }

    if event.is_error() || event.is_warning() {
        if let (Some(file), Some(collector)) = (&file_ctx, try_get_global_error_collector()) {
            collector.record_event(&file.file_path, event.clone());
        }
    }
    if let Some(logger) = try_get_global_logger() {
        logger.log_event(event);
    }
}

pub fn log_error_with_context(code: Code, message: &str, context: Vec<(&str, &str)>) {
    emit(LogEvent::error(code, message), context);
}

pub fn log_warning_with_context(code: Option<Code>, message: &str, context: Vec<(&str, &str)>) {
    let event = match code {
        Some(code) => LogEvent::warning_with_code(code, message),
        None => LogEvent::warning(message),
    };
    emit(event, context);
}

pub fn log_success_with_context(code: Code, message: &str, context: Vec<(&str, &str)>) {
    emit(LogEvent::success(code, message), context);
}

pub fn log_info_with_context(message: &str, context: Vec<(&str, &str)>) {
    emit(LogEvent::info(message), context);
}

pub fn log_debug_with_context(message: &str, context: Vec<(&str, &str)>) {
    emit(LogEvent::debug(message), context);
}

pub fn get_processing_summary() -> ProcessingSummary {
    try_get_global_error_collector()
        .map(ErrorCollector::get_summary)
        .unwrap_or_default()
}

/// Problems collected per policy file, or `None` before initialization
pub fn file_report() -> Option<String> {
    try_get_global_error_collector().map(collector::format_file_report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_context_management() {
        let file_path = PathBuf::from("Machine/Registry.pol");
        assert!(get_current_file_context().is_none());

        set_file_context(file_path.clone(), 1);
        assert_eq!(get_current_file_context().map(|c| c.file_path), Some(file_path));

        clear_file_context();
        assert!(get_current_file_context().is_none());
    }

    #[test]
    fn test_with_file_context() {
        let file_path = PathBuf::from("Machine/Preferences/Groups/Groups.xml");
        let result = with_file_context(file_path, 2, || {
            assert_eq!(get_current_file_context().map(|c| c.file_id), Some(2));
            42
        });

        assert_eq!(result, 42);
        assert!(get_current_file_context().is_none());
    }

    #[test]
    fn test_logging_before_init_does_not_panic() {
        log_error_with_context(codes::decoding::MALFORMED_DATA, "x", vec![("k", "v")]);
        log_warning_with_context(None, "y", vec![]);
    }
}
