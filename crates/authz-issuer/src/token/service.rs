//! Token issuance engine.
//!
//! [`TokenService`] turns a validated request, or a single-use handle, into a
//! signed [`TokenResponse`]:
//!
//! - Request-driven: assemble claims, build the descriptor, sign
//! - Handle-driven: take (delete) the handle, issue from the request it
//!   carries, then mint a refresh handle if the grant asks for one
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use authz_issuer::config::GlobalConfiguration;
//! use authz_issuer::token::TokenService;
//!
//! let service = TokenService::new(Arc::new(GlobalConfiguration::default()));
//! let response = service.issue_from_handle(&handle, &handle_store).await?;
//! ```
//!
//! # Security
//!
//! - The handle is deleted before any token material is produced. Every
//!   failure after the take leaves it deleted.
//! - Handle identifiers and tokens are never logged.

use std::sync::Arc;

use time::OffsetDateTime;

use crate::IssuanceResult;
use crate::config::GlobalConfiguration;
use crate::error::IssuanceError;
use crate::oauth::token::TokenResponse;
use crate::storage::handle::{HandleStore, TakeOutcome};
use crate::token::claims::{ClaimsAssembler, StandardClaimsAssembler};
use crate::token::descriptor::{DescriptorBuilder, StandardDescriptorBuilder};
use crate::token::signer::{JwtSigner, TokenSigner};
use crate::types::{Principal, TokenHandle, ValidatedRequest};

/// Stateless token issuance engine.
///
/// Holds only read-only configuration and strategies, so one instance can
/// serve any number of concurrent requests.
pub struct TokenService {
    /// Issuer configuration snapshot.
    global: Arc<GlobalConfiguration>,

    /// Builds the ordered subject claims.
    claims_assembler: Arc<dyn ClaimsAssembler>,

    /// Builds the token descriptor.
    descriptor_builder: Arc<dyn DescriptorBuilder>,

    /// Signs the descriptor.
    signer: Arc<dyn TokenSigner>,
}

impl TokenService {
    /// Creates an engine with the standard strategies.
    ///
    /// The JWT signer verifies its output when
    /// [`GlobalConfiguration::verify_signed_tokens`] is set.
    #[must_use]
    pub fn new(global: Arc<GlobalConfiguration>) -> Self {
        let signer = JwtSigner::new().with_verification(global.verify_signed_tokens());
        Self::with_strategies(
            global,
            Arc::new(StandardClaimsAssembler),
            Arc::new(StandardDescriptorBuilder),
            Arc::new(signer),
        )
    }

    /// Creates an engine with explicit strategies.
    ///
    /// # Arguments
    ///
    /// * `global` - Issuer configuration snapshot
    /// * `claims_assembler` - Produces subject claims
    /// * `descriptor_builder` - Produces the token specification
    /// * `signer` - Signs the specification
    #[must_use]
    pub fn with_strategies(
        global: Arc<GlobalConfiguration>,
        claims_assembler: Arc<dyn ClaimsAssembler>,
        descriptor_builder: Arc<dyn DescriptorBuilder>,
        signer: Arc<dyn TokenSigner>,
    ) -> Self {
        Self {
            global,
            claims_assembler,
            descriptor_builder,
            signer,
        }
    }

    /// Replaces the claims assembler.
    #[must_use]
    pub fn with_claims_assembler(mut self, claims_assembler: Arc<dyn ClaimsAssembler>) -> Self {
        self.claims_assembler = claims_assembler;
        self
    }

    /// Replaces the descriptor builder.
    #[must_use]
    pub fn with_descriptor_builder(
        mut self,
        descriptor_builder: Arc<dyn DescriptorBuilder>,
    ) -> Self {
        self.descriptor_builder = descriptor_builder;
        self
    }

    /// Replaces the signer.
    #[must_use]
    pub fn with_signer(mut self, signer: Arc<dyn TokenSigner>) -> Self {
        self.signer = signer;
        self
    }

    /// Configuration snapshot this engine issues with.
    #[must_use]
    pub fn global(&self) -> &GlobalConfiguration {
        &self.global
    }

    /// Redeems a single-use handle.
    ///
    /// # Arguments
    ///
    /// * `handle` - The handle presented by the client
    /// * `handle_store` - Store that owns the handle
    ///
    /// # Returns
    ///
    /// Returns a token response. If the handle requests a refresh token, a new
    /// refresh handle is stored and its identifier is returned as
    /// `refresh_token`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The handle was already redeemed or never existed (`ReplayAttempt`)
    /// - The handle has expired (`HandleExpired`)
    /// - Issuance fails (see [`issue_from_request`](Self::issue_from_request))
    /// - The refresh handle cannot be stored
    ///
    /// # Security
    ///
    /// - The handle is taken atomically before claims are assembled
    /// - A failure after the take leaves the handle deleted
    pub async fn issue_from_handle(
        &self,
        handle: &TokenHandle,
        handle_store: &dyn HandleStore,
    ) -> IssuanceResult<TokenResponse> {
        // 1. Take the handle before producing any token material
        let outcome = handle_store
            .take(&handle.handle_id)
            .await
            .inspect_err(|err| {
                tracing::error!(
                    client_id = %handle.client.client_id,
                    handle_type = %handle.handle_type,
                    error = %err,
                    "Failed to take handle"
                );
            })?;

        let handle = match outcome {
            TakeOutcome::Deleted(stored) => stored,
            TakeOutcome::Consumed => {
                tracing::warn!(
                    client_id = %handle.client.client_id,
                    handle_type = %handle.handle_type,
                    "Handle already consumed or unknown, possible replay"
                );
                return Err(IssuanceError::ReplayAttempt);
            }
            TakeOutcome::Expired => {
                tracing::info!(
                    client_id = %handle.client.client_id,
                    handle_type = %handle.handle_type,
                    "Expired handle presented"
                );
                return Err(IssuanceError::HandleExpired);
            }
        };

        // 2. Rebuild the resource owner from the stored claims
        let resource_owner = Principal::new(
            Principal::HANDLE_AUTHENTICATION_TYPE,
            handle.resource_owner.clone(),
        );

        // 3. Rebuild the validated request
        let request = ValidatedRequest::new(
            handle.client.clone(),
            handle.application.clone(),
            handle.scopes.clone(),
        );

        // 4. Resolve the refresh expiration before any token is signed
        let refresh_expiration = if handle.create_refresh_token {
            Some(self.refresh_expiration(&handle)?)
        } else {
            None
        };

        // 5. Issue the access token
        let response = self.issue_from_request(&request, &resource_owner).await?;

        let Some(expiration) = refresh_expiration else {
            return Ok(response);
        };

        // 6. Mint and store the next refresh handle
        let refresh = TokenHandle::refresh_token(
            request.client,
            request.application,
            request.scopes,
            resource_owner.into_claims(),
            expiration,
        );

        handle_store.insert(&refresh).await.inspect_err(|err| {
            tracing::error!(
                client_id = %refresh.client.client_id,
                audience = %refresh.application.audience,
                error = %err,
                "Failed to store refresh handle"
            );
        })?;

        tracing::debug!(
            client_id = %refresh.client.client_id,
            expires_at = %expiration,
            "Refresh handle issued"
        );

        Ok(response.with_refresh_token(refresh.handle_id))
    }

    /// Expiration for the refresh handle minted from `handle`.
    ///
    /// The parent grant's refresh expiration wins; otherwise the configured
    /// default lifetime applies from now.
    fn refresh_expiration(&self, handle: &TokenHandle) -> IssuanceResult<OffsetDateTime> {
        if let Some(expiration) = handle.refresh_token_expiration {
            return Ok(expiration);
        }

        self.global
            .default_refresh_expiration(OffsetDateTime::now_utc())
            .ok_or_else(|| {
                tracing::error!(
                    client_id = %handle.client.client_id,
                    lifetime = ?self.global.default_refresh_token_lifetime(),
                    "Default refresh token lifetime is out of range"
                );
                IssuanceError::configuration("default refresh token lifetime is out of range")
            })
    }

    /// Issues an access token for an already validated request.
    ///
    /// # Arguments
    ///
    /// * `request` - Client, application, and scopes accepted upstream
    /// * `resource_owner` - Principal the token is issued for
    ///
    /// # Errors
    ///
    /// Returns the assembler, builder, or signer error unchanged after
    /// logging it.
    pub async fn issue_from_request(
        &self,
        request: &ValidatedRequest,
        resource_owner: &Principal,
    ) -> IssuanceResult<TokenResponse> {
        match self.issue(request, resource_owner).await {
            Ok(response) => {
                tracing::debug!(
                    client_id = %request.client.client_id,
                    audience = %request.application.audience,
                    scopes = request.scopes.len(),
                    expires_in = response.expires_in,
                    "Access token issued"
                );
                Ok(response)
            }
            Err(err) => {
                tracing::error!(
                    client_id = %request.client.client_id,
                    audience = %request.application.audience,
                    category = %err.category(),
                    error = ?err,
                    "Token issuance failed"
                );
                Err(err)
            }
        }
    }

    async fn issue(
        &self,
        request: &ValidatedRequest,
        resource_owner: &Principal,
    ) -> IssuanceResult<TokenResponse> {
        let claims = self.claims_assembler.assemble(request, resource_owner);
        let spec = self
            .descriptor_builder
            .build(request, claims, &self.global)?;
        let access_token = self.signer.sign(&spec).await?;

        Ok(TokenResponse::new(
            access_token,
            request.application.expires_in(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IssuerSettings;
    use crate::token::descriptor::TokenSpecification;
    use crate::token::jwt::{JwtError, SigningCredential};
    use crate::types::{Application, Claim, Client, Scope};
    use std::collections::HashMap;
    use std::sync::RwLock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use time::Duration;

    const ISSUER: &str = "https://auth.example.com";

    /// Mock handle store for testing.
    #[derive(Default)]
    struct MockHandleStore {
        handles: RwLock<HashMap<String, TokenHandle>>,
        inserted: RwLock<Vec<TokenHandle>>,
        fail_insert: bool,
    }

    impl MockHandleStore {
        fn with_handle(handle: &TokenHandle) -> Self {
            let store = Self::default();
            store
                .handles
                .write()
                .unwrap()
                .insert(handle.id_hash(), handle.clone());
            store
        }

        fn inserted(&self) -> Vec<TokenHandle> {
            self.inserted.read().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl HandleStore for MockHandleStore {
        async fn find(&self, handle_id: &str) -> IssuanceResult<Option<TokenHandle>> {
            Ok(self
                .handles
                .read()
                .unwrap()
                .get(&TokenHandle::hash_id(handle_id))
                .cloned())
        }

        async fn take(&self, handle_id: &str) -> IssuanceResult<TakeOutcome> {
            let removed = self
                .handles
                .write()
                .unwrap()
                .remove(&TokenHandle::hash_id(handle_id));
            Ok(match removed {
                Some(handle) if handle.is_expired() => TakeOutcome::Expired,
                Some(handle) => TakeOutcome::Deleted(handle),
                None => TakeOutcome::Consumed,
            })
        }

        async fn insert(&self, handle: &TokenHandle) -> IssuanceResult<()> {
            if self.fail_insert {
                return Err(IssuanceError::storage("disk full"));
            }
            self.inserted.write().unwrap().push(handle.clone());
            self.handles
                .write()
                .unwrap()
                .insert(handle.id_hash(), handle.clone());
            Ok(())
        }

        async fn cleanup_expired(&self) -> IssuanceResult<u64> {
            Ok(0)
        }
    }

    /// Counts calls and delegates to the standard assembler.
    #[derive(Default)]
    struct CountingAssembler {
        calls: AtomicUsize,
    }

    impl ClaimsAssembler for CountingAssembler {
        fn assemble(&self, request: &ValidatedRequest, owner: &Principal) -> Vec<Claim> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            StandardClaimsAssembler.assemble(request, owner)
        }
    }

    /// Records every specification it is asked to sign.
    #[derive(Default)]
    struct RecordingSigner {
        specs: RwLock<Vec<TokenSpecification>>,
    }

    #[async_trait::async_trait]
    impl TokenSigner for RecordingSigner {
        async fn sign(&self, spec: &TokenSpecification) -> IssuanceResult<String> {
            self.specs.write().unwrap().push(spec.clone());
            Ok(format!("signed-{}", self.specs.read().unwrap().len()))
        }
    }

    struct FailingSigner;

    #[async_trait::async_trait]
    impl TokenSigner for FailingSigner {
        async fn sign(&self, _spec: &TokenSpecification) -> IssuanceResult<String> {
            Err(JwtError::invalid_key("key does not match algorithm").into())
        }
    }

    fn global() -> Arc<GlobalConfiguration> {
        Arc::new(GlobalConfiguration::new(IssuerSettings {
            issuer: ISSUER.to_string(),
            ..IssuerSettings::default()
        }))
    }

    fn application(lifetime: u32) -> Application {
        let credential = SigningCredential::symmetric(b"0123456789abcdef0123456789abcdef").unwrap();
        Application::new("app1", "api1", lifetime, Arc::new(credential))
    }

    fn request() -> ValidatedRequest {
        ValidatedRequest::new(
            Client::new("c1"),
            application(60),
            Scope::list(["read", "write"]),
        )
    }

    fn code_handle() -> TokenHandle {
        TokenHandle::authorization_code(
            Client::new("c1"),
            application(60),
            Scope::list(["read", "write"]),
            vec![Claim::new("sub", "u1")],
        )
    }

    fn pairs(claims: &[Claim]) -> Vec<(String, String)> {
        claims
            .iter()
            .map(|c| (c.claim_type.clone(), c.value.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_issue_from_request_example() {
        let signer = Arc::new(RecordingSigner::default());
        let service = TokenService::new(global()).with_signer(signer.clone());
        let owner = Principal::new("password", vec![Claim::new("sub", "u1")]);

        let response = service
            .issue_from_request(&request(), &owner)
            .await
            .unwrap();

        assert_eq!(response.expires_in, 3600);
        assert_eq!(response.token_type, "Bearer");
        assert!(response.refresh_token.is_none());

        let specs = signer.specs.read().unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].issuer, ISSUER);
        assert_eq!(specs[0].audience, "api1");
        assert_eq!(
            pairs(&specs[0].subject.claims),
            vec![
                ("client_id".to_string(), "c1".to_string()),
                ("scope".to_string(), "read".to_string()),
                ("scope".to_string(), "write".to_string()),
                ("sub".to_string(), "u1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_issue_from_request_window() {
        let signer = Arc::new(RecordingSigner::default());
        let service = TokenService::new(global()).with_signer(signer.clone());
        let request = ValidatedRequest::new(Client::new("c1"), application(15), vec![]);

        let before = OffsetDateTime::now_utc();
        let response = service
            .issue_from_request(&request, &Principal::anonymous())
            .await
            .unwrap();
        let after = OffsetDateTime::now_utc();

        assert_eq!(response.expires_in, 15 * 60);
        let specs = signer.specs.read().unwrap();
        assert!(specs[0].not_before >= before && specs[0].not_before <= after);
        assert_eq!(specs[0].expires - specs[0].not_before, Duration::minutes(15));
    }

    #[tokio::test]
    async fn test_issue_from_request_signs_real_jwt() {
        let service = TokenService::new(global());
        let owner = Principal::new("password", vec![Claim::new("sub", "u1")]);

        let response = service
            .issue_from_request(&request(), &owner)
            .await
            .unwrap();

        let claims = application(60)
            .signing_credential
            .verify(&response.access_token, ISSUER, "api1")
            .unwrap();
        assert_eq!(claims["client_id"], "c1");
        assert_eq!(claims["sub"], "u1");
        assert_eq!(claims["scope"], serde_json::json!(["read", "write"]));
    }

    #[tokio::test]
    async fn test_issue_from_request_signing_failure_unchanged() {
        let service = TokenService::new(global()).with_signer(Arc::new(FailingSigner));

        let err = service
            .issue_from_request(&request(), &Principal::anonymous())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            IssuanceError::Signing(JwtError::InvalidKey { .. })
        ));
    }

    #[tokio::test]
    async fn test_issue_from_request_configuration_error() {
        let service = TokenService::new(global());
        let request = ValidatedRequest::new(Client::new("c1"), application(0), vec![]);

        let err = service
            .issue_from_request(&request, &Principal::anonymous())
            .await
            .unwrap_err();
        assert!(matches!(err, IssuanceError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_issue_from_handle_then_replay() {
        let handle = code_handle();
        let store = MockHandleStore::with_handle(&handle);
        let service = TokenService::new(global());

        let response = service.issue_from_handle(&handle, &store).await.unwrap();
        assert_eq!(response.expires_in, 3600);
        assert!(response.refresh_token.is_none());
        assert!(store.inserted().is_empty());

        let err = service.issue_from_handle(&handle, &store).await.unwrap_err();
        assert!(matches!(err, IssuanceError::ReplayAttempt));
        assert_eq!(err.oauth_error_code(), "invalid_grant");
    }

    #[tokio::test]
    async fn test_replay_skips_assembly_and_signing() {
        let handle = code_handle();
        let store = MockHandleStore::default();
        let assembler = Arc::new(CountingAssembler::default());
        let signer = Arc::new(RecordingSigner::default());
        let service = TokenService::new(global())
            .with_claims_assembler(assembler.clone())
            .with_signer(signer.clone());

        let err = service.issue_from_handle(&handle, &store).await.unwrap_err();

        assert!(matches!(err, IssuanceError::ReplayAttempt));
        assert_eq!(assembler.calls.load(Ordering::SeqCst), 0);
        assert!(signer.specs.read().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_issue_from_handle_rebuilds_principal_claims() {
        let handle = code_handle();
        let store = MockHandleStore::with_handle(&handle);
        let signer = Arc::new(RecordingSigner::default());
        let service = TokenService::new(global()).with_signer(signer.clone());

        service.issue_from_handle(&handle, &store).await.unwrap();

        let specs = signer.specs.read().unwrap();
        assert_eq!(
            pairs(&specs[0].subject.claims),
            vec![
                ("client_id".to_string(), "c1".to_string()),
                ("scope".to_string(), "read".to_string()),
                ("scope".to_string(), "write".to_string()),
                ("sub".to_string(), "u1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_issue_from_handle_mints_refresh_handle() {
        let expiration = OffsetDateTime::now_utc() + Duration::days(30);
        let handle = code_handle().with_refresh_token(Some(expiration));
        let store = MockHandleStore::with_handle(&handle);
        let service = TokenService::new(global());

        let response = service.issue_from_handle(&handle, &store).await.unwrap();

        let inserted = store.inserted();
        assert_eq!(inserted.len(), 1);
        let refresh = &inserted[0];
        assert_eq!(response.refresh_token.as_deref(), Some(refresh.handle_id.as_str()));
        assert_eq!(refresh.handle_type, crate::types::HandleType::RefreshToken);
        assert_eq!(refresh.client, handle.client);
        assert_eq!(refresh.application.id, handle.application.id);
        assert_eq!(refresh.scopes, handle.scopes);
        assert_eq!(refresh.resource_owner, handle.resource_owner);
        assert_eq!(refresh.expires_at, Some(expiration));
        assert!(refresh.create_refresh_token);
        assert_ne!(refresh.handle_id, handle.handle_id);
    }

    #[tokio::test]
    async fn test_refresh_handle_rotates() {
        let handle = code_handle().with_refresh_token(None);
        let store = MockHandleStore::with_handle(&handle);
        let service = TokenService::new(global());

        let first = service.issue_from_handle(&handle, &store).await.unwrap();
        let refresh = store.find(first.refresh_token.as_deref().unwrap()).await.unwrap().unwrap();

        // Without an explicit expiration the default lifetime applies.
        let expected = global()
            .default_refresh_expiration(OffsetDateTime::now_utc())
            .unwrap();
        let expires_at = refresh.expires_at.unwrap();
        assert!((expected - expires_at).abs() < Duration::minutes(1));

        let second = service.issue_from_handle(&refresh, &store).await.unwrap();
        assert!(second.refresh_token.is_some());
        assert_ne!(second.refresh_token, first.refresh_token);

        let err = service.issue_from_handle(&refresh, &store).await.unwrap_err();
        assert!(matches!(err, IssuanceError::ReplayAttempt));
    }

    #[tokio::test]
    async fn test_expired_handle_rejected() {
        let handle = code_handle().with_expiration(OffsetDateTime::now_utc() - Duration::minutes(1));
        let store = MockHandleStore::with_handle(&handle);
        let service = TokenService::new(global());

        let err = service.issue_from_handle(&handle, &store).await.unwrap_err();
        assert!(matches!(err, IssuanceError::HandleExpired));
        assert_eq!(err.oauth_error_code(), "invalid_grant");
        assert!(store.find(&handle.handle_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_signing_failure_burns_handle() {
        let handle = code_handle().with_refresh_token(None);
        let store = MockHandleStore::with_handle(&handle);
        let service = TokenService::new(global()).with_signer(Arc::new(FailingSigner));

        let err = service.issue_from_handle(&handle, &store).await.unwrap_err();
        assert!(matches!(err, IssuanceError::Signing(_)));
        assert!(err.requires_new_grant());
        assert!(store.inserted().is_empty());

        let err = service.issue_from_handle(&handle, &store).await.unwrap_err();
        assert!(matches!(err, IssuanceError::ReplayAttempt));
    }

    #[tokio::test]
    async fn test_unrepresentable_refresh_lifetime_is_configuration_error() {
        let global = Arc::new(GlobalConfiguration::new(IssuerSettings {
            issuer: ISSUER.to_string(),
            default_refresh_token_lifetime: std::time::Duration::from_secs(
                10_000 * 365 * 24 * 3600,
            ),
            ..IssuerSettings::default()
        }));
        let handle = code_handle().with_refresh_token(None);
        let store = MockHandleStore::with_handle(&handle);
        let signer = Arc::new(RecordingSigner::default());
        let service = TokenService::new(global).with_signer(signer.clone());

        let err = service.issue_from_handle(&handle, &store).await.unwrap_err();
        assert!(matches!(err, IssuanceError::Configuration { .. }));
        assert!(signer.specs.read().unwrap().is_empty());
        assert!(store.inserted().is_empty());
        assert!(store.find(&handle.handle_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unrepresentable_access_lifetime_is_configuration_error() {
        let service = TokenService::new(global());
        let request = ValidatedRequest::new(
            Client::new("c1"),
            application(u32::MAX),
            Scope::list(["read"]),
        );

        let err = service
            .issue_from_request(&request, &Principal::anonymous())
            .await
            .unwrap_err();
        assert!(matches!(err, IssuanceError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_refresh_insert_failure_propagates() {
        let handle = code_handle().with_refresh_token(None);
        let store = MockHandleStore {
            fail_insert: true,
            ..MockHandleStore::default()
        };
        store
            .handles
            .write()
            .unwrap()
            .insert(handle.id_hash(), handle.clone());
        let service = TokenService::new(global());

        let err = service.issue_from_handle(&handle, &store).await.unwrap_err();
        assert!(matches!(err, IssuanceError::Storage { .. }));
        assert!(store.find(&handle.handle_id).await.unwrap().is_none());
    }
}
