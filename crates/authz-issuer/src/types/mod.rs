//! Domain types shared by the issuance pipeline.
//!
//! ## Domain Types
//!
//! - [`Client`] - Registered OAuth 2.0 client identity
//! - [`Application`] - Audience, token lifetime, and signing credential
//! - [`Scope`] - Named permission unit
//! - [`Claim`] / [`Principal`] - Ordered resource-owner identity
//! - [`ValidatedRequest`] - Request already validated by the grant validator
//! - [`TokenHandle`] - Single-use authorization-code or refresh-token record

pub mod application;
pub mod client;
pub mod handle;
pub mod principal;
pub mod request;

pub use application::Application;
pub use client::{Client, Scope};
pub use handle::{HandleRecord, HandleType, TokenHandle};
pub use principal::{Claim, Principal, claim_types};
pub use request::ValidatedRequest;
