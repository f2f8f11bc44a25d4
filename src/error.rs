//! Error types for the VMware exporter.
//!
//! This module defines custom error types using `thiserror` for structured
//! error handling throughout the application.

use std::time::Duration;
use thiserror::Error;

/// Main error type for VMware exporter operations.
#[derive(Debug, Error)]
pub enum VcenterError {
    /// The `target` query parameter was absent or empty
    #[error("Target parameter is missing")]
    MissingTarget,

    /// The `dc` query parameter was absent or empty
    #[error("DC parameter is missing")]
    MissingDatacenter,

    /// The `target` query parameter could not be split into host and port
    #[error("Invalid target '{0}'")]
    InvalidTarget(String),

    /// No credential pair is configured for the target
    #[error("No credentials configured for target '{0}'")]
    NoCredentials(String),

    /// Transport-level failure talking to vCenter
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    /// vCenter answered with an unexpected status code
    #[error("http response error: {status}")]
    Status { status: u16 },

    /// Error decoding a vCenter API response body
    #[error("Failed to decode vCenter response: {0}")]
    Decode(String),

    /// Authentication produced no usable session token
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The datacenter filter matched no records
    #[error("Datacenter '{0}' not found")]
    DatacenterNotFound(String),

    /// The datacenter filter matched more than one record
    #[error("Datacenter '{name}' is ambiguous: {count} records returned")]
    AmbiguousDatacenter { name: String, count: usize },

    /// The probe did not finish within its deadline
    #[error("Probe timed out after {0:?}")]
    Timeout(Duration),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Metrics error
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// HTTP server error
    #[error("HTTP server error: {0}")]
    Server(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VcenterError {
    /// Whether the error was caused by the scrape request itself rather than
    /// by the remote endpoint.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingTarget
                | Self::MissingDatacenter
                | Self::InvalidTarget(_)
                | Self::NoCredentials(_)
        )
    }
}

impl From<prometheus::Error> for VcenterError {
    fn from(e: prometheus::Error) -> Self {
        Self::Metrics(e.to_string())
    }
}

/// Result type alias for exporter operations.
pub type Result<T> = std::result::Result<T, VcenterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_parameter_messages() {
        assert_eq!(
            VcenterError::MissingTarget.to_string(),
            "Target parameter is missing"
        );
        assert_eq!(
            VcenterError::MissingDatacenter.to_string(),
            "DC parameter is missing"
        );
    }

    #[test]
    fn test_status_message() {
        let err = VcenterError::Status { status: 403 };
        assert_eq!(err.to_string(), "http response error: 403");
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_client_error_classification() {
        assert!(VcenterError::MissingTarget.is_client_error());
        assert!(VcenterError::InvalidTarget("a:b".into()).is_client_error());
        assert!(!VcenterError::DatacenterNotFound("DC1".into()).is_client_error());
    }
}
