//! # authz-issuer
//!
//! OAuth 2.0 access and refresh token issuance engine.
//!
//! This crate provides:
//! - Request-driven issuance for grants validated upstream
//! - Single-use handle redemption with replay detection
//! - Refresh handle minting and rotation
//! - JWT signing with symmetric (HS256) and asymmetric (RS256, RS384, ES384) keys
//!
//! ## Overview
//!
//! The engine does not validate grants. An authorization endpoint hands it
//! either a [`ValidatedRequest`] plus the resource owner's [`Principal`], or a
//! [`TokenHandle`] created by an earlier step. Handles are deleted before any
//! token material is produced, so a handle can be redeemed at most once.
//!
//! ## Modules
//!
//! - [`config`] - Issuer settings and configuration loading
//! - [`error`] - Issuance error types
//! - [`oauth`] - Token endpoint response types
//! - [`observability`] - Tracing setup
//! - [`storage`] - Handle and application storage
//! - [`token`] - Claims assembly, descriptors, signing, and the engine
//! - [`types`] - Domain types

pub mod config;
pub mod error;
pub mod oauth;
pub mod observability;
pub mod storage;
pub mod token;
pub mod types;

pub use crate::config::{ConfigError, GlobalConfiguration, IssuerSettings};
pub use error::{ErrorCategory, IssuanceError};
pub use oauth::{TokenError, TokenErrorCode, TokenResponse};
pub use storage::{
    ApplicationStorage, HandleStore, InMemoryHandleStore, StaticApplicationStorage, TakeOutcome,
};
pub use token::{
    ClaimsAssembler, DescriptorBuilder, JwtError, JwtSigner, SigningAlgorithm, SigningCredential,
    TokenService, TokenSigner, TokenSpecification,
};
pub use types::{
    Application, Claim, Client, HandleType, Principal, Scope, TokenHandle, ValidatedRequest,
};

/// Type alias for issuance results.
pub type IssuanceResult<T> = Result<T, IssuanceError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use authz_issuer::prelude::*;
/// ```
pub mod prelude {
    pub use crate::IssuanceResult;
    pub use crate::config::{ConfigError, GlobalConfiguration, IssuerSettings};
    pub use crate::error::{ErrorCategory, IssuanceError};
    pub use crate::oauth::{TokenError, TokenErrorCode, TokenResponse};
    pub use crate::storage::{
        ApplicationStorage, HandleStore, InMemoryHandleStore, StaticApplicationStorage,
        TakeOutcome,
    };
    pub use crate::token::{
        ClaimsAssembler, DescriptorBuilder, JwtSigner, SigningAlgorithm, SigningCredential,
        StandardClaimsAssembler, StandardDescriptorBuilder, TokenService, TokenSigner,
    };
    pub use crate::types::{
        Application, Claim, Client, HandleType, Principal, Scope, TokenHandle, ValidatedRequest,
    };
}
