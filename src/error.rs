use std::fmt;

/// Errors raised at the edges of the tracker (files, config, export)
///
/// The tracking core itself never fails: malformed routes, missing
/// permissions and absent readings all resolve to empty or absent values.
#[derive(Debug)]
pub enum TrackerError {
    /// I/O errors
    Io(std::io::Error),
    /// Invalid or unreadable configuration
    Config(String),
    /// A position fix that could not be decoded
    InvalidFix(String),
    /// Result export failure
    Export(String),
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerError::Io(err) => write!(f, "I/O error: {}", err),
            TrackerError::Config(msg) => write!(f, "Configuration error: {}", msg),
            TrackerError::InvalidFix(msg) => write!(f, "Invalid position fix: {}", msg),
            TrackerError::Export(msg) => write!(f, "Export error: {}", msg),
        }
    }
}

impl std::error::Error for TrackerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TrackerError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TrackerError {
    fn from(err: std::io::Error) -> Self {
        TrackerError::Io(err)
    }
}

impl From<anyhow::Error> for TrackerError {
    fn from(err: anyhow::Error) -> Self {
        // Keep the I/O kind when the context chain wraps one
        match err.downcast::<std::io::Error>() {
            Ok(io_err) => TrackerError::Io(io_err),
            Err(other) => TrackerError::Config(format!("{:#}", other)),
        }
    }
}

#[cfg(feature = "csv")]
impl From<csv::Error> for TrackerError {
    fn from(err: csv::Error) -> Self {
        TrackerError::Export(err.to_string())
    }
}

#[cfg(feature = "json")]
impl From<serde_json::Error> for TrackerError {
    fn from(err: serde_json::Error) -> Self {
        TrackerError::Export(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
