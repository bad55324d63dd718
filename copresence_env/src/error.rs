//! Error types for the co-presence environment abstraction.

use thiserror::Error;

/// Reasons a live location fix could not be obtained.
///
/// Any of these aborts the current scan or issue attempt; nothing is written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    /// The operator (or platform policy) refused location access
    #[error("Geolocation required. Please enable location access.")]
    PermissionDenied,
    
    /// The platform could not determine a position
    #[error("Location unavailable.")]
    PositionUnavailable,
    
    /// No fix arrived within the configured timeout
    #[error("Location request timed out after {0}ms")]
    Timeout(u64),
    
    /// Anything else the platform reported
    #[error("Could not retrieve location: {0}")]
    Other(String),
}

impl LocationError {
    /// Creates an `Other` error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
    
    /// Short machine-readable cause, for logs and JSON output.
    pub fn cause(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission_denied",
            Self::PositionUnavailable => "position_unavailable",
            Self::Timeout(_) => "timeout",
            Self::Other(_) => "other",
        }
    }
}
