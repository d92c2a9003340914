//! Validated token request.

use crate::types::{Application, Client, Scope};

/// A token request the grant validator has already accepted.
///
/// Carries no resource-owner identity; that is supplied separately as a
/// [`Principal`](crate::types::Principal).
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    /// The authenticated client.
    pub client: Client,

    /// The application (audience) the token is for.
    pub application: Application,

    /// Granted scopes, in grant order.
    pub scopes: Vec<Scope>,
}

impl ValidatedRequest {
    /// Creates a validated request.
    #[must_use]
    pub fn new(client: Client, application: Application, scopes: Vec<Scope>) -> Self {
        Self {
            client,
            application,
            scopes,
        }
    }
}
