//! Error types for frame reading and decoding

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FrameError>;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("No data received within {0:?}")]
    Timeout(Duration),

    #[error("Producer disconnected after {received} of the frame's bytes")]
    Disconnected { received: usize },

    #[error("Invalid frame length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Non-finite value in field '{field}'")]
    NonFinite { field: &'static str },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// Failures that end the producer connection (timeout, disconnect, I/O).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Disconnected { .. } | Self::Io(_)
        )
    }

    /// Failures that only invalidate a single frame.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::InvalidLength { .. } | Self::NonFinite { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(FrameError::Timeout(Duration::from_secs(10)).is_transport());
        assert!(FrameError::Disconnected { received: 0 }.is_transport());
        assert!(!FrameError::Disconnected { received: 4 }.is_decode());

        let err = FrameError::NonFinite { field: "heart_rate" };
        assert!(err.is_decode());
        assert!(!err.is_transport());
        assert_eq!(err.to_string(), "Non-finite value in field 'heart_rate'");
    }
}
