//! Cluster platform API error types.

use std::fmt;

/// Errors talking to the cluster platform API.
#[derive(Debug)]
pub enum ClusterApiError {
    /// The supplied trust anchor could not be loaded.
    InvalidTrustAnchor {
        /// Error details.
        details: String,
    },
    /// The HTTP transport could not be built or the connection failed.
    ConnectionFailed {
        /// Error details.
        details: String,
    },
    /// The platform rejected or failed the request.
    RequestFailed {
        /// Error details.
        details: String,
    },
    /// The platform answered with an unexpected status code.
    UnexpectedStatus {
        /// HTTP status code.
        status: u16,
        /// The endpoint that was called.
        endpoint: String,
    },
}

impl fmt::Display for ClusterApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTrustAnchor { details } => {
                write!(f, "invalid trust anchor certificate: {}", details)
            }
            Self::ConnectionFailed { details } => {
                write!(f, "failed to reach the platform API: {}", details)
            }
            Self::RequestFailed { details } => {
                write!(f, "platform API request failed: {}", details)
            }
            Self::UnexpectedStatus { status, endpoint } => {
                write!(f, "platform API returned status {} for {}", status, endpoint)
            }
        }
    }
}

impl std::error::Error for ClusterApiError {}
