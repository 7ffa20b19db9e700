//! # Analyzer API
//!
//! Configuration and error types shared by every stage of the analyzer.

pub mod config;
pub mod errors;

pub use config::{AnalyzerConfig, ObjectFilter, ObjectKind};
pub use errors::{AnalyzerError, ConfigError, CryptoError};
