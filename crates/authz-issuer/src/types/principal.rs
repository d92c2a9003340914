//! Claims and resource-owner principals.

use serde::{Deserialize, Serialize};

/// Claim types the engine writes itself.
pub mod claim_types {
    /// Identifier of the client the token was issued to.
    pub const CLIENT_ID: &str = "client_id";
    /// One granted scope; repeated once per scope.
    pub const SCOPE: &str = "scope";
}

/// A named attribute describing the token subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// Claim type, e.g. `sub`.
    #[serde(rename = "type")]
    pub claim_type: String,

    /// Claim value.
    pub value: String,
}

impl Claim {
    /// Creates a claim.
    #[must_use]
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
        }
    }
}

/// Authenticated resource owner, or a synthetic principal for client-only flows.
///
/// Claim order is insertion order and is preserved through issuance.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Principal {
    authentication_type: String,
    claims: Vec<Claim>,
}

impl Principal {
    /// Label for principals rebuilt from a stored handle.
    pub const HANDLE_AUTHENTICATION_TYPE: &'static str = "OAuth2";

    /// Creates a principal from an authentication label and ordered claims.
    #[must_use]
    pub fn new(authentication_type: impl Into<String>, claims: Vec<Claim>) -> Self {
        Self {
            authentication_type: authentication_type.into(),
            claims,
        }
    }

    /// Synthetic principal with no user claims (client-credentials style flows).
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Authentication label.
    #[must_use]
    pub fn authentication_type(&self) -> &str {
        &self.authentication_type
    }

    /// Claims in insertion order.
    #[must_use]
    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    /// Consumes the principal, returning its claims.
    #[must_use]
    pub fn into_claims(self) -> Vec<Claim> {
        self.claims
    }
}
