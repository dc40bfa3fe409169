use std::fmt;

/// Errors raised by the counting core.
///
/// Validation variants are returned before any state is touched. Storage and
/// capacity variants come out of a commit that was aborted with the previous
/// durable record left in place.
#[derive(Debug)]
pub enum MeterError {
    InvalidHost,
    InvalidPath,
    InvalidTopic,
    /// Counter override of zero, or a value that does not parse as u32
    InvalidValue,
    FieldTooLong { field: &'static str, max: usize },
    CapacityExceeded { required_at_least: usize, max: usize },
    Serialize(serde_json::Error),
    Storage(std::io::Error),
}

pub type MeterResult<T> = Result<T, MeterError>;

impl fmt::Display for MeterError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MeterError::InvalidHost => write!(f, "Invalid host (allowed: a-z A-Z 0-9 - .)"),
            MeterError::InvalidPath => write!(f, "Invalid path (must start with '/')"),
            MeterError::InvalidTopic => write!(f, "Invalid topic"),
            MeterError::InvalidValue => write!(f, "Invalid value"),
            MeterError::FieldTooLong { field, max } => {
                write!(f, "{} too long (max {} chars)", field, max)
            }
            MeterError::CapacityExceeded {
                required_at_least,
                max,
            } => write!(
                f,
                "Serialized record needs more than {} bytes (required at least {})",
                max, required_at_least
            ),
            MeterError::Serialize(e) => write!(f, "Serialization error: {}", e),
            MeterError::Storage(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for MeterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MeterError::Serialize(e) => Some(e),
            MeterError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MeterError {
    fn from(e: std::io::Error) -> Self {
        MeterError::Storage(e)
    }
}

impl From<serde_json::Error> for MeterError {
    fn from(e: serde_json::Error) -> Self {
        MeterError::Serialize(e)
    }
}
