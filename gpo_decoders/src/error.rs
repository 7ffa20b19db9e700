use std::path::PathBuf;

use crate::logging::{codes, Code};

/// Errors raised while decoding a single policy file
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("File not found: {path}")]
    NotFound { path: PathBuf },

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed {format} data: {reason}")]
    Malformed { format: &'static str, reason: String },

    #[error("Invalid {format} text encoding")]
    Encoding { format: &'static str },

    #[error("File too large: {size} bytes (limit {limit})")]
    TooLarge { size: u64, limit: u64 },

    #[error("{format} limit exceeded: {what}")]
    Limit { format: &'static str, what: String },
}

impl DecodeError {
    pub fn malformed(format: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            format,
            reason: reason.into(),
        }
    }

    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Io { path, source }
        }
    }

    /// Logging code for this error
    pub fn log_code(&self) -> Code {
        match self {
            DecodeError::NotFound { .. } => codes::file_processing::FILE_NOT_FOUND,
            DecodeError::Io { .. } => codes::file_processing::IO_ERROR,
            DecodeError::Malformed { .. } => codes::decoding::MALFORMED_DATA,
            DecodeError::Encoding { .. } => codes::decoding::INVALID_ENCODING,
            DecodeError::TooLarge { .. } => codes::file_processing::FILE_TOO_LARGE,
            DecodeError::Limit { .. } => codes::decoding::LIMIT_EXCEEDED,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        codes::is_recoverable(self.log_code().as_str())
    }

    /// Missing files are expected in a partially replicated store
    pub fn is_missing(&self) -> bool {
        matches!(self, DecodeError::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_io_error_is_distinct() {
        let err = DecodeError::from_io(
            "/nope",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.is_missing());
        assert_eq!(err.log_code().as_str(), "E011");

        let err = DecodeError::from_io(
            "/nope",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(!err.is_missing());
    }

    #[test]
    fn test_malformed_message() {
        let err = DecodeError::malformed("POL", "bad magic");
        assert_eq!(err.to_string(), "Malformed POL data: bad magic");
    }
}
