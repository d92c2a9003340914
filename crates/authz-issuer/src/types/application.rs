//! Application (audience) configuration.

use std::sync::Arc;

use time::Duration;

use crate::IssuanceResult;
use crate::error::IssuanceError;
use crate::token::jwt::SigningCredential;

/// The resource a token is issued for.
///
/// Every issued token takes its audience, lifetime, and signing credential
/// from exactly one `Application`. Cloning is cheap; the credential is shared.
#[derive(Debug, Clone)]
pub struct Application {
    /// Stable identifier used by persistent stores to rehydrate the application.
    pub id: String,

    /// Audience asserted in the token (`aud`).
    pub audience: String,

    /// Access token lifetime in minutes.
    pub token_lifetime: u32,

    /// Credential used to sign tokens for this audience.
    pub signing_credential: Arc<SigningCredential>,
}

impl Application {
    /// Creates an application.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        audience: impl Into<String>,
        token_lifetime: u32,
        signing_credential: Arc<SigningCredential>,
    ) -> Self {
        Self {
            id: id.into(),
            audience: audience.into(),
            token_lifetime,
            signing_credential,
        }
    }

    /// Token lifetime as a duration.
    #[must_use]
    pub fn lifetime(&self) -> Duration {
        Duration::minutes(i64::from(self.token_lifetime))
    }

    /// Token lifetime in seconds, as reported in `expires_in`.
    #[must_use]
    pub fn expires_in(&self) -> u64 {
        u64::from(self.token_lifetime) * 60
    }

    /// Checks that the application can back a token.
    ///
    /// # Errors
    ///
    /// Returns `IssuanceError::Configuration` if the audience is empty or the
    /// lifetime is zero.
    pub fn validate(&self) -> IssuanceResult<()> {
        if self.audience.trim().is_empty() {
            return Err(IssuanceError::configuration(format!(
                "application '{}' has no audience",
                self.id
            )));
        }

        if self.token_lifetime == 0 {
            return Err(IssuanceError::configuration(format!(
                "application '{}' has a zero token lifetime",
                self.id
            )));
        }

        Ok(())
    }
}
