//! Per-file event collection for batch decoding
//!
//! Decoding a store touches thousands of small files; events raised while a
//! file is in context are grouped here so a run can end with one summary.

use super::events::LogEvent;
use crate::config::compile_time::logging::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Context information for the file currently being decoded
#[derive(Debug, Clone)]
pub struct FileProcessingContext {
    pub file_path: PathBuf,
    pub file_id: usize,
    pub start_time: Instant,
}

impl FileProcessingContext {
    pub fn new(file_path: PathBuf, file_id: usize) -> Self {
        Self {
            file_path,
            file_id,
            start_time: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Summary of batch processing results
#[derive(Debug, Clone, Default)]
pub struct ProcessingSummary {
    pub total_files: usize,
    pub successful_files: usize,
    pub failed_files: usize,
    pub files_with_warnings: usize,
    pub total_errors: usize,
    pub total_warnings: usize,
    pub total_processing_time: Duration,
}

impl ProcessingSummary {
    pub fn success_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            self.successful_files as f64 / self.total_files as f64
        }
    }

    pub fn has_errors(&self) -> bool {
        self.total_errors > 0
    }

    pub fn has_warnings(&self) -> bool {
        self.total_warnings > 0
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Thread-safe error collector
pub struct ErrorCollector {
    file_events: Mutex<BTreeMap<PathBuf, Vec<LogEvent>>>,
    file_contexts: Mutex<BTreeMap<PathBuf, FileProcessingContext>>,
    processing_start: Instant,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self {
            file_events: Mutex::new(BTreeMap::new()),
            file_contexts: Mutex::new(BTreeMap::new()),
            processing_start: Instant::now(),
        }
    }

    /// Record an event for a file. Past the per-file cap a single overflow
    /// warning is appended and later events are dropped.
    pub fn record_event(&self, file_path: &Path, event: LogEvent) {
        let mut events = lock(&self.file_events);

        let total: usize = events.values().map(Vec::len).sum();
        if total >= MAX_ERROR_COLLECTION {
            return;
        }

        let file_events = events.entry(file_path.to_path_buf()).or_default();

        if file_events.len() < MAX_LOG_EVENTS_PER_FILE {
            file_events.push(event);
        } else if file_events.len() == MAX_LOG_EVENTS_PER_FILE {
            file_events.push(LogEvent::warning(&format!(
                "Too many events for file (limit: {})",
                MAX_LOG_EVENTS_PER_FILE
            )));
        }
    }

    pub fn record_file_context(&self, context: FileProcessingContext) {
        lock(&self.file_contexts).insert(context.file_path.clone(), context);
    }

    pub fn get_file_events(&self, file_path: &Path) -> Vec<LogEvent> {
        lock(&self.file_events)
            .get(file_path)
            .cloned()
            .unwrap_or_default()
    }

    pub fn get_file_errors(&self, file_path: &Path) -> Vec<LogEvent> {
        lock(&self.file_events)
            .get(file_path)
            .map(|events| events.iter().filter(|e| e.is_error()).cloned().collect())
            .unwrap_or_default()
    }

    pub fn get_files_with_errors(&self) -> Vec<PathBuf> {
        lock(&self.file_events)
            .iter()
            .filter(|(_, events)| events.iter().any(|e| e.is_error()))
            .map(|(path, _)| path.clone())
            .collect()
    }

    pub fn get_summary(&self) -> ProcessingSummary {
        let events = lock(&self.file_events);
        let contexts = lock(&self.file_contexts);

        let mut summary = ProcessingSummary {
            total_files: contexts.len().max(events.len()),
            total_processing_time: self.processing_start.elapsed(),
            ..ProcessingSummary::default()
        };

        for file_events in events.values() {
            let has_errors = file_events.iter().any(|e| e.is_error());
            let has_warnings = file_events.iter().any(|e| e.is_warning());

            if has_errors {
                summary.failed_files += 1;
            } else if has_warnings {
                summary.files_with_warnings += 1;
            }

            summary.total_errors += file_events.iter().filter(|e| e.is_error()).count();
            summary.total_warnings += file_events.iter().filter(|e| e.is_warning()).count();
        }

        summary.successful_files =
            summary.total_files - summary.failed_files - summary.files_with_warnings;
        summary
    }
}

impl Default for ErrorCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Render collected problems grouped by file
pub fn format_file_report(collector: &ErrorCollector) -> String {
    let events = lock(&collector.file_events);
    let mut output = String::new();

    for (path, file_events) in events.iter() {
        let problems: Vec<&LogEvent> = file_events
            .iter()
            .filter(|e| e.is_error() || e.is_warning())
            .collect();
        if problems.is_empty() {
            continue;
        }
        output.push_str(&format!("{}:\n", path.display()));
        for event in problems {
            output.push_str(&format!("  {}\n", event.format()));
        }
    }
    drop(events);

    let summary = collector.get_summary();
    output.push_str(&format!(
        "{} file(s), {} error(s), {} warning(s)",
        summary.total_files, summary.total_errors, summary.total_warnings
    ));
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::codes;

    #[test]
    fn test_events_grouped_by_file() {
        let collector = ErrorCollector::new();
        let pol = PathBuf::from("Machine/Registry.pol");
        let inf = PathBuf::from("Machine/Microsoft/Windows NT/SecEdit/GptTmpl.inf");

        collector.record_file_context(FileProcessingContext::new(pol.clone(), 0));
        collector.record_file_context(FileProcessingContext::new(inf.clone(), 1));
        collector.record_event(
            &pol,
            LogEvent::error(codes::decoding::MALFORMED_DATA, "bad magic"),
        );
        collector.record_event(&inf, LogEvent::warning("empty section"));

        assert_eq!(collector.get_file_errors(&pol).len(), 1);
        assert!(collector.get_file_errors(&inf).is_empty());
        assert_eq!(collector.get_files_with_errors(), vec![pol]);

        let summary = collector.get_summary();
        assert_eq!(summary.total_files, 2);
        assert_eq!(summary.failed_files, 1);
        assert_eq!(summary.files_with_warnings, 1);
        assert_eq!(summary.successful_files, 0);
    }

    #[test]
    fn test_per_file_cap_adds_single_overflow_warning() {
        let collector = ErrorCollector::new();
        let path = PathBuf::from("Groups.xml");
        for _ in 0..MAX_LOG_EVENTS_PER_FILE + 5 {
            collector.record_event(&path, LogEvent::warning("noise"));
        }
        let events = collector.get_file_events(&path);
        assert_eq!(events.len(), MAX_LOG_EVENTS_PER_FILE + 1);
        assert!(events
            .last()
            .map(|e| e.message.starts_with("Too many events"))
            .unwrap_or(false));
    }

    #[test]
    fn test_report_lists_problem_files() {
        let collector = ErrorCollector::new();
        collector.record_event(
            Path::new("audit.csv"),
            LogEvent::error(codes::file_processing::IO_ERROR, "denied"),
        );
        let report = format_file_report(&collector);
        assert!(report.contains("audit.csv:"));
        assert!(report.contains("[ERROR] E012 - denied"));
        assert!(report.ends_with("1 file(s), 1 error(s), 0 warning(s)"));
    }
}
