//! Token endpoint response types.
//!
//! The engine produces a [`TokenResponse`] on success. Failures are reported
//! as [`IssuanceError`](crate::error::IssuanceError) and converted into a
//! [`TokenError`] body by the endpoint that owns the transport.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::IssuanceError;

/// The only token type the engine issues.
pub const TOKEN_TYPE_BEARER: &str = "Bearer";

/// Successful token response.
///
/// # Example Response
///
/// ```json
/// {
///   "access_token": "eyJhbG...",
///   "token_type": "Bearer",
///   "expires_in": 3600,
///   "refresh_token": "tGzv3JOkF0XG5Qx2TlKWIA"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// The access token (JWT).
    pub access_token: String,

    /// Token type, always "Bearer".
    pub token_type: String,

    /// Access token lifetime in seconds.
    pub expires_in: u64,

    /// Identifier of the refresh handle minted for this response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl TokenResponse {
    /// Creates a new bearer token response.
    #[must_use]
    pub fn new(access_token: String, expires_in: u64) -> Self {
        Self {
            access_token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in,
            refresh_token: None,
        }
    }

    /// Sets the refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, token: String) -> Self {
        self.refresh_token = Some(token);
        self
    }
}

/// Token error response body.
///
/// ```json
/// {
///   "error": "invalid_grant",
///   "error_description": "Handle expired"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenError {
    /// OAuth 2.0 error code.
    pub error: TokenErrorCode,

    /// Human-readable error description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl TokenError {
    /// Creates a token error with description.
    #[must_use]
    pub fn with_description(error: TokenErrorCode, description: impl Into<String>) -> Self {
        Self {
            error,
            error_description: Some(description.into()),
        }
    }
}

impl From<&IssuanceError> for TokenError {
    /// Client errors keep their message; server errors are reported without
    /// detail so key or storage diagnostics never reach the client.
    fn from(err: &IssuanceError) -> Self {
        if err.is_client_error() {
            Self::with_description(TokenErrorCode::InvalidGrant, err.to_string())
        } else {
            Self {
                error: TokenErrorCode::ServerError,
                error_description: None,
            }
        }
    }
}

/// OAuth 2.0 error codes the engine can produce.
///
/// Defined in RFC 6749 Sections 4.1.2.1 and 5.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenErrorCode {
    /// The authorization grant or refresh token is invalid, expired, or was
    /// already redeemed.
    InvalidGrant,

    /// The server failed to issue a token for the valid grant.
    ServerError,
}

impl TokenErrorCode {
    /// Returns the string representation of the error code.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidGrant => "invalid_grant",
            Self::ServerError => "server_error",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidGrant => 400,
            Self::ServerError => 500,
        }
    }
}

impl fmt::Display for TokenErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::jwt::JwtError;

    #[test]
    fn test_token_response_serialization() {
        let response = TokenResponse::new("eyJhbGciOiJIUzI1NiJ9".to_string(), 3600);
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["access_token"], "eyJhbGciOiJIUzI1NiJ9");
        assert_eq!(json["token_type"], "Bearer");
        assert_eq!(json["expires_in"], 3600);
        assert!(json.get("refresh_token").is_none());
    }

    #[test]
    fn test_token_response_with_refresh_token() {
        let response =
            TokenResponse::new("at".to_string(), 300).with_refresh_token("rt".to_string());
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains(r#""refresh_token":"rt""#));

        let parsed: TokenResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, response);
    }

    #[test]
    fn test_token_error_from_replay() {
        let error = TokenError::from(&IssuanceError::ReplayAttempt);
        assert_eq!(error.error, TokenErrorCode::InvalidGrant);
        assert_eq!(error.error.http_status(), 400);

        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["error"], "invalid_grant");
        assert!(json["error_description"].is_string());
    }

    #[test]
    fn test_token_error_hides_server_detail() {
        let err = IssuanceError::from(JwtError::invalid_key("private key is not PKCS#8"));
        let error = TokenError::from(&err);
        assert_eq!(error.error, TokenErrorCode::ServerError);
        assert!(error.error_description.is_none());
        assert_eq!(error.error.to_string(), "server_error");
    }
}
