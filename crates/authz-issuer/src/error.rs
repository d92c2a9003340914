//! Token issuance error types.
//!
//! Every failure the engine can report is a variant of [`IssuanceError`]. The
//! engine never retries and never falls back; callers map these errors to
//! protocol-level responses through [`IssuanceError::oauth_error_code`].

use std::fmt;

use crate::token::jwt::JwtError;

/// Errors that can occur while issuing tokens.
#[derive(Debug, thiserror::Error)]
pub enum IssuanceError {
    /// The handle was not found at take time: it was already redeemed or never
    /// existed.
    #[error("Replay attempt: handle already consumed or unknown")]
    ReplayAttempt,

    /// The handle existed but had passed its expiration.
    #[error("Handle expired")]
    HandleExpired,

    /// The grant carried by the handle is unusable for another reason.
    #[error("Invalid grant: {message}")]
    InvalidGrant {
        /// Description of why the grant is invalid.
        message: String,
    },

    /// The signing primitive failed to produce a valid token.
    #[error("Signing failure: {0}")]
    Signing(#[from] JwtError),

    /// The issuer, application, or credential configuration is unusable.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration defect.
        message: String,
    },

    /// An error occurred while storing or retrieving handles.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl IssuanceError {
    /// Creates a new `InvalidGrant` error.
    #[must_use]
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::InvalidGrant {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a client error (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::ReplayAttempt | Self::HandleExpired | Self::InvalidGrant { .. }
        )
    }

    /// Returns `true` if this is a server error (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// Returns `true` if the caller must restart the grant instead of retrying.
    ///
    /// Handle-driven issuance deletes the handle before signing, so every
    /// failure after that point burns the handle.
    #[must_use]
    pub fn requires_new_grant(&self) -> bool {
        !matches!(self, Self::Storage { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ReplayAttempt => ErrorCategory::Replay,
            Self::HandleExpired => ErrorCategory::Grant,
            Self::InvalidGrant { .. } => ErrorCategory::Grant,
            Self::Signing(_) => ErrorCategory::Signing,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Storage { .. } => ErrorCategory::Infrastructure,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the OAuth 2.0 error code for this error.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::ReplayAttempt => "invalid_grant",
            Self::HandleExpired => "invalid_grant",
            Self::InvalidGrant { .. } => "invalid_grant",
            Self::Signing(_) => "server_error",
            Self::Configuration { .. } => "server_error",
            Self::Storage { .. } => "server_error",
            Self::Internal { .. } => "server_error",
        }
    }
}

/// Categories of issuance errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// A consumed or unknown handle was presented.
    Replay,
    /// The grant is expired or otherwise unusable.
    Grant,
    /// The signing primitive failed.
    Signing,
    /// Issuer or application configuration is broken.
    Configuration,
    /// Infrastructure/storage errors.
    Infrastructure,
    /// Internal server errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Replay => write!(f, "replay"),
            Self::Grant => write!(f, "grant"),
            Self::Signing => write!(f, "signing"),
            Self::Configuration => write!(f, "configuration"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            IssuanceError::ReplayAttempt.to_string(),
            "Replay attempt: handle already consumed or unknown"
        );

        let err = IssuanceError::configuration("application 'api1' has no audience");
        assert_eq!(
            err.to_string(),
            "Configuration error: application 'api1' has no audience"
        );

        let err = IssuanceError::from(JwtError::InvalidSignature);
        assert_eq!(err.to_string(), "Signing failure: Invalid signature");
    }

    #[test]
    fn test_error_predicates() {
        assert!(IssuanceError::ReplayAttempt.is_client_error());
        assert!(IssuanceError::HandleExpired.is_client_error());
        assert!(!IssuanceError::ReplayAttempt.is_server_error());

        let err = IssuanceError::from(JwtError::encoding_error("bad key"));
        assert!(err.is_server_error());
        assert!(err.requires_new_grant());

        assert!(IssuanceError::storage("connection reset").is_server_error());
        assert!(!IssuanceError::storage("connection reset").requires_new_grant());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            IssuanceError::ReplayAttempt.category(),
            ErrorCategory::Replay
        );
        assert_eq!(
            IssuanceError::configuration("test").category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            IssuanceError::from(JwtError::InvalidSignature).category(),
            ErrorCategory::Signing
        );
        assert_eq!(
            IssuanceError::storage("test").category(),
            ErrorCategory::Infrastructure
        );
    }

    #[test]
    fn test_oauth_error_code() {
        assert_eq!(
            IssuanceError::ReplayAttempt.oauth_error_code(),
            "invalid_grant"
        );
        assert_eq!(
            IssuanceError::HandleExpired.oauth_error_code(),
            "invalid_grant"
        );
        assert_eq!(
            IssuanceError::from(JwtError::InvalidSignature).oauth_error_code(),
            "server_error"
        );
        assert_eq!(
            IssuanceError::configuration("test").oauth_error_code(),
            "server_error"
        );
    }

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::Replay.to_string(), "replay");
        assert_eq!(ErrorCategory::Signing.to_string(), "signing");
        assert_eq!(ErrorCategory::Infrastructure.to_string(), "infrastructure");
    }
}
