//! Error types for the platform-access crate.
//!
//! - `LoginError`: failures while driving the login flow
//! - `PersistenceError`: host policy persistence failures (never fatal)

use std::fmt;

/// Errors from the login flow and its configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginError {
    /// A required configuration field neither was set explicitly nor could
    /// be auto-discovered. Surfaces when the field is dereferenced during
    /// flow construction, not during resolution.
    ConfigIncomplete { field: &'static str },
    /// The post-login redirect target cannot be turned into a callback URL.
    InvalidRedirectTarget { url: String },
    /// The state returned by the provider does not match the pending
    /// authorization.
    StateMismatch,
    /// The authorization-code exchange with the provider failed.
    TokenExchange { reason: String },
    /// Resolving the principal's tiers against the platform failed.
    RoleResolution { reason: String },
    /// Merging the resolved tier into the host's matrix failed.
    Synchronization { reason: String },
}

impl fmt::Display for LoginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigIncomplete { field } => {
                write!(f, "configuration field '{field}' was never resolved")
            }
            Self::InvalidRedirectTarget { url } => {
                write!(f, "redirect target '{url}' insufficient for a callback URL")
            }
            Self::StateMismatch => {
                write!(f, "returned state does not match the pending authorization")
            }
            Self::TokenExchange { reason } => {
                write!(f, "token exchange failed: {reason}")
            }
            Self::RoleResolution { reason } => {
                write!(f, "role resolution failed: {reason}")
            }
            Self::Synchronization { reason } => {
                write!(f, "matrix synchronization failed: {reason}")
            }
        }
    }
}

impl std::error::Error for LoginError {}

/// Failure to persist the host's policy object.
///
/// Logged and ignored by callers; the in-memory policy is already updated
/// for the running process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceError {
    /// Error details.
    pub details: String,
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to persist authorization policy: {}", self.details)
    }
}

impl std::error::Error for PersistenceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_incomplete_names_the_field() {
        let err = LoginError::ConfigIncomplete {
            field: "client_secret",
        };
        assert!(err.to_string().contains("client_secret"));
    }

    #[test]
    fn invalid_redirect_target_includes_url() {
        let err = LoginError::InvalidRedirectTarget {
            url: "ftp://host/path".to_string(),
        };
        assert!(err.to_string().contains("ftp://host/path"));
    }

    #[test]
    fn token_exchange_includes_reason() {
        let err = LoginError::TokenExchange {
            reason: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn persistence_error_display() {
        let err = PersistenceError {
            details: "disk full".to_string(),
        };
        assert!(err.to_string().contains("disk full"));
    }
}
