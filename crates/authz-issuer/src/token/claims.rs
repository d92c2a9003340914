//! Subject claim assembly.

use crate::types::{Claim, Principal, ValidatedRequest, claim_types};

/// Produces the ordered subject claim set for a token.
pub trait ClaimsAssembler: Send + Sync {
    /// Assembles claims for `request` on behalf of `resource_owner`.
    fn assemble(&self, request: &ValidatedRequest, resource_owner: &Principal) -> Vec<Claim>;
}

/// Default assembler.
///
/// Emits `client_id`, then one `scope` claim per granted scope in request
/// order, then every resource-owner claim unchanged. Nothing is deduplicated
/// or filtered.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardClaimsAssembler;

impl ClaimsAssembler for StandardClaimsAssembler {
    fn assemble(&self, request: &ValidatedRequest, resource_owner: &Principal) -> Vec<Claim> {
        let mut claims =
            Vec::with_capacity(1 + request.scopes.len() + resource_owner.claims().len());

        claims.push(Claim::new(
            claim_types::CLIENT_ID,
            request.client.client_id.clone(),
        ));
        claims.extend(
            request
                .scopes
                .iter()
                .map(|scope| Claim::new(claim_types::SCOPE, scope.name.clone())),
        );
        claims.extend(resource_owner.claims().iter().cloned());

        claims
    }
}
