//! # Analyzer Errors

use gpo_decoders::config::schema::SchemaError;
use gpo_decoders::logging::{codes, Code};
use gpo_decoders::DecodeError;
use std::path::PathBuf;

use crate::pipeline::batch::BatchError;

/// Rule, schema and directory loading errors. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML in {document}: {source}")]
    Toml {
        document: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid directory document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid rule '{rule}': {reason}")]
    InvalidRule { rule: String, reason: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl ConfigError {
    pub fn invalid_rule(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRule {
            rule: rule.into(),
            reason: reason.into(),
        }
    }

    pub fn log_code(&self) -> Code {
        match self {
            ConfigError::Json(_) => codes::configuration::DIRECTORY_LOAD_FAILURE,
            ConfigError::InvalidRule { .. } => codes::configuration::INVALID_RULE,
            ConfigError::Schema(_) => codes::configuration::SCHEMA_LOAD_FAILURE,
            ConfigError::Io { .. } | ConfigError::Toml { .. } => {
                codes::configuration::RULES_LOAD_FAILURE
            }
        }
    }
}

/// Failures of a single credential recovery
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("Invalid key or IV length")]
    KeyLength,

    #[error("Ciphertext of {len} bytes is not a whole number of blocks")]
    Length { len: usize },

    #[error("Invalid padding")]
    Unpad,

    #[error("Plaintext is not valid UTF-16LE")]
    Utf16,

    #[error("Plaintext is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Top-level error of the analysis pipeline
#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Credential recovery failed: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),
}

impl AnalyzerError {
    pub fn is_recoverable(&self) -> bool {
        match self {
            AnalyzerError::Config(_) => false,
            AnalyzerError::Decode(e) => e.is_recoverable(),
            AnalyzerError::Crypto(_) => true,
            AnalyzerError::Batch(_) => false,
        }
    }

    pub fn log_code(&self) -> Code {
        match self {
            AnalyzerError::Config(e) => e.log_code(),
            AnalyzerError::Decode(e) => e.log_code(),
            AnalyzerError::Crypto(_) => codes::analysis::CRYPTO_FAILURE,
            AnalyzerError::Batch(_) => codes::analysis::WORKER_FAILURE,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            AnalyzerError::Config(e) => format!("Configuration could not be loaded: {}", e),
            AnalyzerError::Decode(e) => format!("Policy file could not be decoded: {}", e),
            AnalyzerError::Crypto(e) => format!("Credential could not be recovered: {}", e),
            AnalyzerError::Batch(e) => format!("Batch processing failed: {}", e),
        }
    }
}
