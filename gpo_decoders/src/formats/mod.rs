//! Format decoders
//!
//! Every decoder takes bytes already read from disk plus the schema and returns
//! `Ok(None)` when the schema opts out of the file, `Ok(Some(tree))` with the
//! decoded content, or `Err` when the content is malformed.

pub mod aas;
pub mod audit_csv;
pub mod inf;
pub mod ini;
pub mod pol;
pub mod xml;

use crate::config::compile_time::file_processing::{LARGE_FILE_THRESHOLD, MAX_FILE_SIZE};
use crate::error::DecodeError;
use crate::log_debug;
use std::fs;
use std::path::Path;

/// Read a policy file, enforcing the compile-time size ceiling
pub fn read_policy_bytes(path: &Path) -> Result<Vec<u8>, DecodeError> {
    let metadata = fs::metadata(path).map_err(|e| DecodeError::from_io(path, e))?;
    if metadata.len() > MAX_FILE_SIZE {
        return Err(DecodeError::TooLarge {
            size: metadata.len(),
            limit: MAX_FILE_SIZE,
        });
    }
    if metadata.len() > LARGE_FILE_THRESHOLD {
        log_debug!("Reading large policy file", "path" => path.display(), "size" => metadata.len());
    }
    fs::read(path).map_err(|e| DecodeError::from_io(path, e))
}

/// Decoder selected from a file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Xml,
    Pol,
    Inf,
    Ini,
    Csv,
    Aas,
}

impl FileFormat {
    /// `extension` includes the leading dot, as recorded on a `PolicyFile`
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            ".xml" => Some(FileFormat::Xml),
            ".pol" => Some(FileFormat::Pol),
            ".inf" => Some(FileFormat::Inf),
            ".ini" => Some(FileFormat::Ini),
            ".csv" => Some(FileFormat::Csv),
            ".aas" => Some(FileFormat::Aas),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Xml => "XML",
            FileFormat::Pol => "POL",
            FileFormat::Inf => "INF",
            FileFormat::Ini => "INI",
            FileFormat::Csv => "CSV",
            FileFormat::Aas => "AAS",
        }
    }
}
