//! Token signing.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::IssuanceResult;
use crate::token::descriptor::TokenSpecification;
use crate::token::jwt::JwtError;

/// Claim names the signer writes from the specification itself.
///
/// Subject claims may not reuse these names.
pub const REGISTERED_CLAIMS: [&str; 4] = ["iss", "aud", "nbf", "exp"];

/// Turns a [`TokenSpecification`] into a compact signed token.
///
/// Async so that implementations may delegate to a remote signer or HSM.
#[async_trait]
pub trait TokenSigner: Send + Sync {
    /// Signs the token described by `spec` with `spec.signing_credential`.
    ///
    /// # Errors
    ///
    /// Returns `IssuanceError::Signing` if no valid token can be produced.
    /// Implementations must never return an unsigned or mis-signed token.
    async fn sign(&self, spec: &TokenSpecification) -> IssuanceResult<String>;
}

/// JWT signer backed by [`SigningCredential`](crate::token::jwt::SigningCredential).
///
/// Subject claims follow the registered claims in their original order. A
/// claim type that occurs more than once becomes a JSON array.
#[derive(Debug, Clone)]
pub struct JwtSigner {
    verify_signed_tokens: bool,
}

impl Default for JwtSigner {
    fn default() -> Self {
        Self::new()
    }
}

impl JwtSigner {
    /// Creates a signer that verifies every token it produces.
    #[must_use]
    pub fn new() -> Self {
        Self {
            verify_signed_tokens: true,
        }
    }

    /// Enables or disables verification of freshly signed tokens.
    #[must_use]
    pub fn with_verification(mut self, verify: bool) -> Self {
        self.verify_signed_tokens = verify;
        self
    }

    /// Builds the JWT claim map for `spec`.
    ///
    /// # Errors
    ///
    /// Returns `JwtError::InvalidClaims` if a subject claim collides with a
    /// registered claim.
    pub fn claims_for(spec: &TokenSpecification) -> Result<Map<String, Value>, JwtError> {
        let mut claims = Map::new();
        claims.insert("iss".to_string(), Value::String(spec.issuer.clone()));
        claims.insert("aud".to_string(), Value::String(spec.audience.clone()));
        claims.insert("nbf".to_string(), Value::from(spec.not_before.unix_timestamp()));
        claims.insert("exp".to_string(), Value::from(spec.expires.unix_timestamp()));

        for claim in &spec.subject.claims {
            if REGISTERED_CLAIMS.contains(&claim.claim_type.as_str()) {
                return Err(JwtError::invalid_claims(format!(
                    "subject claim '{}' collides with a registered claim",
                    claim.claim_type
                )));
            }

            let value = Value::String(claim.value.clone());
            match claims.get_mut(&claim.claim_type) {
                None => {
                    claims.insert(claim.claim_type.clone(), value);
                }
                Some(Value::Array(values)) => values.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
            }
        }

        Ok(claims)
    }
}

#[async_trait]
impl TokenSigner for JwtSigner {
    async fn sign(&self, spec: &TokenSpecification) -> IssuanceResult<String> {
        let claims = Self::claims_for(spec)?;
        let credential = &spec.signing_credential;
        let token = credential.encode(&claims)?;

        if self.verify_signed_tokens {
            let decoded = credential.verify(&token, &spec.issuer, &spec.audience)?;
            if decoded != claims {
                return Err(JwtError::invalid_claims("signed token does not match its claims").into());
            }
        }

        tracing::debug!(
            algorithm = %credential.algorithm(),
            kid = credential.kid().unwrap_or_default(),
            audience = %spec.audience,
            "Token signed"
        );

        Ok(token)
    }
}
