//! Single-use token handles.
//!
//! A handle is either an authorization grant awaiting exchange or a refresh
//! token. The plaintext identifier is handed to the client once; stores index
//! handles by [`TokenHandle::hash_id`] and never persist the identifier itself.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::IssuanceResult;
use crate::error::IssuanceError;
use crate::types::{Application, Claim, Client, Scope};

/// Kind of grant a handle represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleType {
    /// Authorization grant created by the authorization endpoint.
    AuthorizationCode,
    /// Refresh token minted alongside an access token.
    RefreshToken,
}

impl HandleType {
    /// Returns the persisted name of the handle type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
        }
    }
}

impl fmt::Display for HandleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HandleType {
    type Err = IssuanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authorization_code" => Ok(Self::AuthorizationCode),
            "refresh_token" => Ok(Self::RefreshToken),
            other => Err(IssuanceError::internal(format!(
                "unknown handle type '{other}'"
            ))),
        }
    }
}

/// Persisted single-use grant record.
#[derive(Debug, Clone)]
pub struct TokenHandle {
    /// Opaque identifier returned to the client. Never stored in plaintext.
    pub handle_id: String,

    /// Kind of grant.
    pub handle_type: HandleType,

    /// Client the grant was issued to.
    pub client: Client,

    /// Application (audience) the grant is valid for.
    pub application: Application,

    /// Granted scopes, in request order.
    pub scopes: Vec<Scope>,

    /// Resource-owner claims captured when the grant was created.
    pub resource_owner: Vec<Claim>,

    /// Whether redeeming this handle mints a new refresh handle.
    pub create_refresh_token: bool,

    /// Expiration applied to the refresh handle minted on redemption.
    pub refresh_token_expiration: Option<OffsetDateTime>,

    /// When the handle was created.
    pub created_at: OffsetDateTime,

    /// When the handle itself expires (None = no expiration).
    pub expires_at: Option<OffsetDateTime>,
}

impl TokenHandle {
    /// Creates an authorization-code handle with a fresh identifier.
    #[must_use]
    pub fn authorization_code(
        client: Client,
        application: Application,
        scopes: Vec<Scope>,
        resource_owner: Vec<Claim>,
    ) -> Self {
        Self {
            handle_id: Self::generate_id(),
            handle_type: HandleType::AuthorizationCode,
            client,
            application,
            scopes,
            resource_owner,
            create_refresh_token: false,
            refresh_token_expiration: None,
            created_at: OffsetDateTime::now_utc(),
            expires_at: None,
        }
    }

    /// Creates a refresh-token handle expiring at `expiration`.
    ///
    /// The handle keeps `create_refresh_token` set so redeeming it rotates to
    /// another refresh handle bounded by the same expiration.
    #[must_use]
    pub fn refresh_token(
        client: Client,
        application: Application,
        scopes: Vec<Scope>,
        resource_owner: Vec<Claim>,
        expiration: OffsetDateTime,
    ) -> Self {
        Self {
            handle_id: Self::generate_id(),
            handle_type: HandleType::RefreshToken,
            client,
            application,
            scopes,
            resource_owner,
            create_refresh_token: true,
            refresh_token_expiration: Some(expiration),
            created_at: OffsetDateTime::now_utc(),
            expires_at: Some(expiration),
        }
    }

    /// Requests a refresh token on redemption.
    #[must_use]
    pub fn with_refresh_token(mut self, expiration: Option<OffsetDateTime>) -> Self {
        self.create_refresh_token = true;
        self.refresh_token_expiration = expiration;
        self
    }

    /// Sets the handle's own expiration.
    #[must_use]
    pub fn with_expiration(mut self, expires_at: OffsetDateTime) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Returns `true` if this handle has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|exp| OffsetDateTime::now_utc() > exp)
            .unwrap_or(false)
    }

    /// SHA-256 hash of this handle's identifier.
    #[must_use]
    pub fn id_hash(&self) -> String {
        Self::hash_id(&self.handle_id)
    }

    /// Hash a handle identifier using SHA-256.
    ///
    /// Used both when storing handles and when looking them up.
    #[must_use]
    pub fn hash_id(handle_id: &str) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(handle_id.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Generate a cryptographically secure handle identifier.
    ///
    /// Returns a 256-bit random value encoded as base64url (43 characters).
    #[must_use]
    pub fn generate_id() -> String {
        use base64::Engine;
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;

        let mut bytes = [0u8; 32];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Serializable form of this handle, without the identifier.
    #[must_use]
    pub fn to_record(&self) -> HandleRecord {
        HandleRecord {
            handle_type: self.handle_type,
            client_id: self.client.client_id.clone(),
            application_id: self.application.id.clone(),
            scopes: self.scopes.iter().map(|s| s.name.clone()).collect(),
            resource_owner: self.resource_owner.clone(),
            create_refresh_token: self.create_refresh_token,
            refresh_token_expiration: self.refresh_token_expiration,
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}

/// Persisted form of a [`TokenHandle`].
///
/// Applications are referenced by id and rehydrated through
/// [`ApplicationStorage`](crate::storage::ApplicationStorage) so signing
/// credentials never reach the handle store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandleRecord {
    pub handle_type: HandleType,
    pub client_id: String,
    pub application_id: String,
    pub scopes: Vec<String>,
    pub resource_owner: Vec<Claim>,
    pub create_refresh_token: bool,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub refresh_token_expiration: Option<OffsetDateTime>,

    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub expires_at: Option<OffsetDateTime>,
}

impl HandleRecord {
    /// Rebuilds the handle with its identifier and resolved application.
    ///
    /// # Errors
    ///
    /// Returns an internal error if `application` is not the one the record
    /// references.
    pub fn into_handle(
        self,
        handle_id: impl Into<String>,
        application: Application,
    ) -> IssuanceResult<TokenHandle> {
        if application.id != self.application_id {
            return Err(IssuanceError::internal(format!(
                "handle references application '{}', got '{}'",
                self.application_id, application.id
            )));
        }

        Ok(TokenHandle {
            handle_id: handle_id.into(),
            handle_type: self.handle_type,
            client: Client::new(self.client_id),
            application,
            scopes: Scope::list(self.scopes),
            resource_owner: self.resource_owner,
            create_refresh_token: self.create_refresh_token,
            refresh_token_expiration: self.refresh_token_expiration,
            created_at: self.created_at,
            expires_at: self.expires_at,
        })
    }
}
