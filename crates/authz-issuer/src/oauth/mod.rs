//! OAuth 2.0 token endpoint payloads.

pub mod token;

pub use token::{TOKEN_TYPE_BEARER, TokenError, TokenErrorCode, TokenResponse};
