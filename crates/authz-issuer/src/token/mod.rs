//! Token issuance pipeline.
//!
//! Request-driven issuance runs three pluggable stages:
//!
//! 1. [`ClaimsAssembler`] - request + principal -> ordered subject claims
//! 2. [`DescriptorBuilder`] - request + claims + issuer -> [`TokenSpecification`]
//! 3. [`TokenSigner`] - specification -> compact signed token
//!
//! [`TokenService`] drives the stages and owns the single-use handle contract.

pub mod claims;
pub mod descriptor;
pub mod jwt;
pub mod service;
pub mod signer;

pub use claims::{ClaimsAssembler, StandardClaimsAssembler};
pub use descriptor::{
    DescriptorBuilder, IDENTITY_PROVIDER_LABEL, StandardDescriptorBuilder, Subject,
    TokenSpecification,
};
pub use jwt::{JwtError, SigningAlgorithm, SigningCredential};
pub use service::TokenService;
pub use signer::{JwtSigner, REGISTERED_CLAIMS, TokenSigner};
