//! Error codes and classification
//!
//! Single source of truth for every code emitted by the workspace and the
//! metadata attached to it.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Universal code wrapper for both error and success codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Code(&'static str);

impl Code {
    pub const fn new(code: &'static str) -> Self {
        Self(code)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Critical = 0,
    High = 1,
    Medium = 2,
    Low = 3,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
        }
    }
}

/// Complete metadata for an error code
#[derive(Debug, Clone)]
pub struct ErrorMetadata {
    pub code: &'static str,
    pub category: &'static str,
    pub severity: Severity,
    pub recoverable: bool,
    pub requires_halt: bool,
    pub description: &'static str,
    pub recommended_action: &'static str,
}

impl ErrorMetadata {
    pub const fn new(
        code: &'static str,
        category: &'static str,
        severity: Severity,
        recoverable: bool,
        requires_halt: bool,
        description: &'static str,
        recommended_action: &'static str,
    ) -> Self {
        Self {
            code,
            category,
            severity,
            recoverable,
            requires_halt,
            description,
            recommended_action,
        }
    }
}

/// System error codes
pub mod system {
    use super::Code;

    pub const INTERNAL_ERROR: Code = Code::new("ERR001");
    pub const INITIALIZATION_FAILURE: Code = Code::new("ERR002");
}

/// File access error codes
pub mod file_processing {
    use super::Code;

    pub const FILE_NOT_FOUND: Code = Code::new("E011");
    pub const IO_ERROR: Code = Code::new("E012");
    pub const FILE_TOO_LARGE: Code = Code::new("E013");
    pub const INVALID_PATH: Code = Code::new("E014");
}

/// Decoder error codes
pub mod decoding {
    use super::Code;

    pub const MALFORMED_DATA: Code = Code::new("E020");
    pub const LIMIT_EXCEEDED: Code = Code::new("E021");
    pub const INVALID_ENCODING: Code = Code::new("E022");
    pub const UNSUPPORTED_FILE: Code = Code::new("E023");
}

/// Configuration error codes
pub mod configuration {
    use super::Code;

    pub const SCHEMA_LOAD_FAILURE: Code = Code::new("E030");
    pub const RULES_LOAD_FAILURE: Code = Code::new("E031");
    pub const DIRECTORY_LOAD_FAILURE: Code = Code::new("E032");
    pub const INVALID_RULE: Code = Code::new("E033");
}

/// Normalization codes
pub mod normalization {
    use super::Code;

    pub const UNKNOWN_REGISTRY_TYPE: Code = Code::new("W040");
    pub const MALFORMED_SETTING: Code = Code::new("W041");
}

/// Analysis error codes
pub mod analysis {
    use super::Code;

    pub const CRYPTO_FAILURE: Code = Code::new("E050");
    pub const RULE_EVALUATION_FAILURE: Code = Code::new("E051");
    pub const WORKER_FAILURE: Code = Code::new("E052");
}

/// Success codes
pub mod success {
    use super::Code;

    pub const SYSTEM_INITIALIZATION_COMPLETED: Code = Code::new("I001");
    pub const FILE_DECODED: Code = Code::new("I010");
    pub const GPO_DECODED: Code = Code::new("I011");
    pub const STORE_DISCOVERED: Code = Code::new("I012");
    pub const GPO_NORMALIZED: Code = Code::new("I020");
    pub const GPO_ANALYZED: Code = Code::new("I030");
    pub const CREDENTIAL_RECOVERED: Code = Code::new("I031");
    pub const BATCH_COMPLETED: Code = Code::new("I040");
}

static ERROR_REGISTRY: OnceLock<HashMap<&'static str, ErrorMetadata>> = OnceLock::new();

const METADATA: &[ErrorMetadata] = &[
    ErrorMetadata::new(
        "ERR001",
        "System",
        Severity::Critical,
        false,
        true,
        "Critical internal system error",
        "File a bug report with the failing input",
    ),
    ErrorMetadata::new(
        "ERR002",
        "System",
        Severity::Critical,
        false,
        true,
        "System initialization failure",
        "Check configuration and environment variables",
    ),
    ErrorMetadata::new(
        "E011",
        "FileProcessing",
        Severity::Low,
        true,
        false,
        "Policy file not found",
        "Check that the policy store copy is complete",
    ),
    ErrorMetadata::new(
        "E012",
        "FileProcessing",
        Severity::Medium,
        true,
        false,
        "I/O error while reading a policy file",
        "Check file permissions on the policy store copy",
    ),
    ErrorMetadata::new(
        "E013",
        "FileProcessing",
        Severity::Medium,
        true,
        false,
        "Policy file exceeds the maximum size",
        "Inspect the file manually or rebuild with a larger limit",
    ),
    ErrorMetadata::new(
        "E014",
        "FileProcessing",
        Severity::Medium,
        true,
        false,
        "Invalid policy store path",
        "Point the tool at the directory that contains <domain>/Policies",
    ),
    ErrorMetadata::new(
        "E020",
        "Decoding",
        Severity::Medium,
        true,
        false,
        "Malformed policy file content",
        "The file is skipped; inspect it if its settings matter",
    ),
    ErrorMetadata::new(
        "E021",
        "Decoding",
        Severity::Medium,
        true,
        false,
        "Decoder limit exceeded",
        "The file is skipped; rebuild with larger decoder limits if legitimate",
    ),
    ErrorMetadata::new(
        "E022",
        "Decoding",
        Severity::Low,
        true,
        false,
        "Invalid text encoding",
        "The file is skipped; re-export it as UTF-16LE or UTF-8",
    ),
    ErrorMetadata::new(
        "E023",
        "Decoding",
        Severity::Low,
        true,
        false,
        "Unsupported policy file",
        "No action required",
    ),
    ErrorMetadata::new(
        "E030",
        "Configuration",
        Severity::Critical,
        false,
        true,
        "Schema configuration could not be loaded",
        "Fix the schema document and restart",
    ),
    ErrorMetadata::new(
        "E031",
        "Configuration",
        Severity::Critical,
        false,
        true,
        "Rule configuration could not be loaded",
        "Fix the rule documents and restart",
    ),
    ErrorMetadata::new(
        "E032",
        "Configuration",
        Severity::Critical,
        false,
        true,
        "Directory data could not be loaded",
        "Fix the directory document and restart",
    ),
    ErrorMetadata::new(
        "E033",
        "Configuration",
        Severity::Critical,
        false,
        true,
        "Invalid rule definition",
        "Fix the condition kind, threshold or pattern of the rule",
    ),
    ErrorMetadata::new(
        "W040",
        "Normalization",
        Severity::Low,
        true,
        false,
        "Unknown registry type name",
        "The record is skipped",
    ),
    ErrorMetadata::new(
        "W041",
        "Normalization",
        Severity::Low,
        true,
        false,
        "Malformed setting record",
        "The record is skipped",
    ),
    ErrorMetadata::new(
        "E050",
        "Analysis",
        Severity::Low,
        true,
        false,
        "Credential could not be decrypted",
        "The encrypted value is still reported",
    ),
    ErrorMetadata::new(
        "E051",
        "Analysis",
        Severity::Medium,
        true,
        false,
        "Rule could not be evaluated against a record",
        "Check the record data type against the rule condition",
    ),
    ErrorMetadata::new(
        "E052",
        "Analysis",
        Severity::High,
        true,
        false,
        "A batch worker failed",
        "Re-run the affected GPOs individually",
    ),
];

fn get_error_registry() -> &'static HashMap<&'static str, ErrorMetadata> {
    ERROR_REGISTRY.get_or_init(|| {
        METADATA
            .iter()
            .map(|metadata| (metadata.code, metadata.clone()))
            .collect()
    })
}

/// Get error metadata for a specific error code
pub fn get_error_metadata(code: &str) -> Option<&'static ErrorMetadata> {
    get_error_registry().get(code)
}

/// Get error severity from error code
pub fn get_severity(code: &str) -> Severity {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.severity)
        .unwrap_or(Severity::Medium)
}

/// Check if error is recoverable
pub fn is_recoverable(code: &str) -> bool {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.recoverable)
        .unwrap_or(true)
}

/// Check if error requires immediate halt
pub fn requires_halt(code: &str) -> bool {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.requires_halt)
        .unwrap_or(false)
}

/// Get human-readable description for error code
pub fn get_description(code: &str) -> &'static str {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.description)
        .unwrap_or("Unknown error")
}

/// Get recommended action for error code
pub fn get_action(code: &str) -> &'static str {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.recommended_action)
        .unwrap_or("No specific action available")
}

/// Get error category from error code
pub fn get_category(code: &str) -> &'static str {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.category)
        .unwrap_or("Unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_error_code_has_metadata() {
        for code in [
            system::INTERNAL_ERROR,
            file_processing::FILE_NOT_FOUND,
            file_processing::IO_ERROR,
            decoding::MALFORMED_DATA,
            decoding::LIMIT_EXCEEDED,
            configuration::RULES_LOAD_FAILURE,
            configuration::INVALID_RULE,
            normalization::UNKNOWN_REGISTRY_TYPE,
            analysis::CRYPTO_FAILURE,
        ] {
            assert!(get_error_metadata(code.as_str()).is_some(), "{code}");
        }
    }

    #[test]
    fn test_configuration_errors_halt() {
        assert!(requires_halt(configuration::SCHEMA_LOAD_FAILURE.as_str()));
        assert!(!requires_halt(decoding::MALFORMED_DATA.as_str()));
        assert!(is_recoverable(analysis::CRYPTO_FAILURE.as_str()));
    }

    #[test]
    fn test_unknown_code_defaults() {
        assert_eq!(get_description("Z999"), "Unknown error");
        assert_eq!(get_category("Z999"), "Unknown");
        assert_eq!(get_severity("Z999"), Severity::Medium);
    }
}
