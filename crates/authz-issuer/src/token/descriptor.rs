//! Token descriptors.
//!
//! A [`TokenSpecification`] carries everything the signer needs: issuer,
//! audience, validity window, credential, and subject. It exists only for the
//! duration of one signing call.

use std::sync::Arc;

use time::OffsetDateTime;

use crate::IssuanceResult;
use crate::config::GlobalConfiguration;
use crate::error::IssuanceError;
use crate::token::jwt::SigningCredential;
use crate::types::{Claim, ValidatedRequest};

/// Authentication label attached to every token subject built by this crate.
pub const IDENTITY_PROVIDER_LABEL: &str = "authz.issuer";

/// Claim set describing who the token is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    /// Identity-provider label.
    pub authentication_type: String,

    /// Ordered subject claims.
    pub claims: Vec<Claim>,
}

/// Everything needed to sign one token.
#[derive(Debug, Clone)]
pub struct TokenSpecification {
    /// Token issuer (`iss`).
    pub issuer: String,

    /// Token audience (`aud`).
    pub audience: String,

    /// Start of the validity window (`nbf`).
    pub not_before: OffsetDateTime,

    /// End of the validity window (`exp`).
    pub expires: OffsetDateTime,

    /// Credential that signs the token.
    pub signing_credential: Arc<SigningCredential>,

    /// Token subject.
    pub subject: Subject,
}

/// Builds a [`TokenSpecification`] from a request and its subject claims.
pub trait DescriptorBuilder: Send + Sync {
    /// Builds the specification.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the issuer or application cannot
    /// produce a valid token.
    fn build(
        &self,
        request: &ValidatedRequest,
        subject_claims: Vec<Claim>,
        global: &GlobalConfiguration,
    ) -> IssuanceResult<TokenSpecification>;
}

/// Default builder: window `[now, now + token_lifetime]` in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardDescriptorBuilder;

impl DescriptorBuilder for StandardDescriptorBuilder {
    fn build(
        &self,
        request: &ValidatedRequest,
        subject_claims: Vec<Claim>,
        global: &GlobalConfiguration,
    ) -> IssuanceResult<TokenSpecification> {
        if global.issuer().trim().is_empty() {
            return Err(IssuanceError::configuration("issuer is not configured"));
        }
        request.application.validate()?;

        let now = OffsetDateTime::now_utc();
        let expires = now
            .checked_add(request.application.lifetime())
            .ok_or_else(|| {
                IssuanceError::configuration(format!(
                    "application '{}' token lifetime is out of range",
                    request.application.id
                ))
            })?;

        Ok(TokenSpecification {
            issuer: global.issuer().to_string(),
            audience: request.application.audience.clone(),
            not_before: now,
            expires,
            signing_credential: Arc::clone(&request.application.signing_credential),
            subject: Subject {
                authentication_type: IDENTITY_PROVIDER_LABEL.to_string(),
                claims: subject_claims,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IssuerSettings;
    use crate::types::{Application, Client, Scope};
    use time::Duration;

    fn global(issuer: &str) -> GlobalConfiguration {
        GlobalConfiguration::new(IssuerSettings {
            issuer: issuer.to_string(),
            ..IssuerSettings::default()
        })
    }

    fn request(audience: &str, lifetime: u32) -> ValidatedRequest {
        let credential = SigningCredential::symmetric(&[5u8; 32]).unwrap();
        ValidatedRequest::new(
            Client::new("c1"),
            Application::new("app1", audience, lifetime, Arc::new(credential)),
            Scope::list(["read"]),
        )
    }

    #[test]
    fn test_build_window_and_audience() {
        let before = OffsetDateTime::now_utc();
        let spec = StandardDescriptorBuilder
            .build(
                &request("api1", 60),
                vec![Claim::new("client_id", "c1")],
                &global("https://issuer.example.com"),
            )
            .unwrap();
        let after = OffsetDateTime::now_utc();

        assert_eq!(spec.issuer, "https://issuer.example.com");
        assert_eq!(spec.audience, "api1");
        assert!(spec.not_before >= before && spec.not_before <= after);
        assert_eq!(spec.expires - spec.not_before, Duration::minutes(60));
        assert_eq!(spec.subject.authentication_type, IDENTITY_PROVIDER_LABEL);
        assert_eq!(spec.subject.claims, vec![Claim::new("client_id", "c1")]);
    }

    #[test]
    fn test_build_shares_application_credential() {
        let request = request("api1", 5);
        let spec = StandardDescriptorBuilder
            .build(&request, vec![], &global("issuer"))
            .unwrap();
        assert!(Arc::ptr_eq(
            &spec.signing_credential,
            &request.application.signing_credential
        ));
    }

    #[test]
    fn test_build_rejects_missing_issuer() {
        let err = StandardDescriptorBuilder
            .build(&request("api1", 60), vec![], &global(" "))
            .unwrap_err();
        assert!(matches!(err, IssuanceError::Configuration { .. }));
    }

    #[test]
    fn test_build_rejects_missing_audience() {
        let err = StandardDescriptorBuilder
            .build(&request("", 60), vec![], &global("issuer"))
            .unwrap_err();
        assert!(matches!(err, IssuanceError::Configuration { .. }));
    }

    #[test]
    fn test_build_rejects_unrepresentable_lifetime() {
        let err = StandardDescriptorBuilder
            .build(&request("api1", u32::MAX), vec![], &global("issuer"))
            .unwrap_err();
        assert!(matches!(err, IssuanceError::Configuration { .. }));
    }

    #[test]
    fn test_build_rejects_zero_lifetime() {
        let err = StandardDescriptorBuilder
            .build(&request("api1", 0), vec![], &global("issuer"))
            .unwrap_err();
        assert!(matches!(err, IssuanceError::Configuration { .. }));
    }
}
