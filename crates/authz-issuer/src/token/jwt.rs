//! JWT signing credentials.
//!
//! A [`SigningCredential`] bundles the key material and algorithm an
//! [`Application`](crate::types::Application) signs its tokens with. Both kinds
//! of registered keys are supported:
//!
//! - **Symmetric**: HMAC with SHA-256 (`HS256`), shared secret of at least 256 bits
//! - **RS256 / RS384**: RSA with SHA-256 / SHA-384
//! - **ES384**: ECDSA with the P-384 curve
//!
//! ## Example
//!
//! ```ignore
//! use authz_issuer::token::jwt::{SigningAlgorithm, SigningCredential};
//!
//! let credential = SigningCredential::generate_rsa(SigningAlgorithm::RS256)?
//!     .with_kid("api1-2024");
//!
//! let token = credential.encode(&claims)?;
//! let verified = credential.verify(&token, "https://issuer.example.com", "api1")?;
//! ```

use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use p384::SecretKey as EcSecretKey;
use p384::ecdsa::SigningKey as EcSigningKey;
use p384::pkcs8::{DecodePrivateKey as EcDecodePrivateKey, EncodePrivateKey as EcEncodePrivateKey};
use rand::RngCore;
use rand::rngs::OsRng;
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use serde_json::{Map, Value};
use time::OffsetDateTime;

/// Minimum length of an HMAC secret, in bytes.
pub const MIN_SYMMETRIC_KEY_LEN: usize = 32;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to encode a token.
    #[error("Failed to encode token: {message}")]
    EncodingError {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode a token.
    #[error("Failed to decode token: {message}")]
    DecodingError {
        /// Description of the decoding error.
        message: String,
    },

    /// The token has expired.
    #[error("Token expired")]
    Expired,

    /// The token signature is invalid.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The token claims are invalid.
    #[error("Invalid claims: {message}")]
    InvalidClaims {
        /// Description of why claims are invalid.
        message: String,
    },

    /// The algorithm cannot be used with the supplied key material.
    #[error("Unsupported algorithm: {message}")]
    UnsupportedAlgorithm {
        /// Description of the mismatch.
        message: String,
    },

    /// Failed to generate a cryptographic key.
    #[error("Key generation error: {message}")]
    KeyGenerationError {
        /// Description of the key generation error.
        message: String,
    },

    /// Invalid key format or data.
    #[error("Invalid key: {message}")]
    InvalidKey {
        /// Description of why the key is invalid.
        message: String,
    },
}

impl JwtError {
    /// Creates a new `EncodingError`.
    #[must_use]
    pub fn encoding_error(message: impl Into<String>) -> Self {
        Self::EncodingError {
            message: message.into(),
        }
    }

    /// Creates a new `DecodingError`.
    #[must_use]
    pub fn decoding_error(message: impl Into<String>) -> Self {
        Self::DecodingError {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidClaims` error.
    #[must_use]
    pub fn invalid_claims(message: impl Into<String>) -> Self {
        Self::InvalidClaims {
            message: message.into(),
        }
    }

    /// Creates a new `UnsupportedAlgorithm` error.
    #[must_use]
    pub fn unsupported_algorithm(message: impl Into<String>) -> Self {
        Self::UnsupportedAlgorithm {
            message: message.into(),
        }
    }

    /// Creates a new `KeyGenerationError`.
    #[must_use]
    pub fn key_generation_error(message: impl Into<String>) -> Self {
        Self::KeyGenerationError {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidKey` error.
    #[must_use]
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a validation error (expired, invalid signature, etc.).
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::Expired | Self::InvalidSignature | Self::InvalidClaims { .. }
        )
    }

    /// Returns `true` if this is a key-related error.
    #[must_use]
    pub fn is_key_error(&self) -> bool {
        matches!(
            self,
            Self::KeyGenerationError { .. }
                | Self::InvalidKey { .. }
                | Self::UnsupportedAlgorithm { .. }
        )
    }
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::MissingAlgorithm => Self::unsupported_algorithm(err.to_string()),
            ErrorKind::InvalidAudience
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidSubject
            | ErrorKind::ImmatureSignature
            | ErrorKind::MissingRequiredClaim(_) => Self::invalid_claims(err.to_string()),
            ErrorKind::InvalidRsaKey(_)
            | ErrorKind::InvalidEcdsaKey
            | ErrorKind::InvalidKeyFormat => Self::invalid_key(err.to_string()),
            _ => Self::decoding_error(err.to_string()),
        }
    }
}

// ============================================================================
// Signing Algorithm
// ============================================================================

/// Supported signing algorithms for JWT tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningAlgorithm {
    /// HMAC with SHA-256 (symmetric keys).
    HS256,
    /// RSA with SHA-256.
    RS256,
    /// RSA with SHA-384.
    RS384,
    /// ECDSA with P-384 curve.
    ES384,
}

impl SigningAlgorithm {
    /// Converts to the `jsonwebtoken` Algorithm type.
    #[must_use]
    pub fn to_jwt_algorithm(self) -> Algorithm {
        match self {
            Self::HS256 => Algorithm::HS256,
            Self::RS256 => Algorithm::RS256,
            Self::RS384 => Algorithm::RS384,
            Self::ES384 => Algorithm::ES384,
        }
    }

    /// Returns the algorithm name as used in JWT headers.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HS256 => "HS256",
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::ES384 => "ES384",
        }
    }

    /// Returns `true` if this algorithm uses a shared secret.
    #[must_use]
    pub fn is_symmetric(&self) -> bool {
        matches!(self, Self::HS256)
    }

    /// Returns `true` if this is an RSA-based algorithm.
    #[must_use]
    pub fn is_rsa(&self) -> bool {
        matches!(self, Self::RS256 | Self::RS384)
    }

    /// Returns `true` if this is an EC-based algorithm.
    #[must_use]
    pub fn is_ec(&self) -> bool {
        matches!(self, Self::ES384)
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Signing Credential
// ============================================================================

/// Key material and algorithm used to sign tokens for one application.
///
/// Credentials are immutable once built and are shared read-only across
/// concurrent issuance calls.
pub struct SigningCredential {
    kid: Option<String>,
    algorithm: SigningAlgorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    created_at: OffsetDateTime,
}

impl fmt::Debug for SigningCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningCredential")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl SigningCredential {
    /// Builds an `HS256` credential from a shared secret.
    ///
    /// # Errors
    /// Returns an error if the secret is shorter than [`MIN_SYMMETRIC_KEY_LEN`].
    pub fn symmetric(secret: &[u8]) -> Result<Self, JwtError> {
        if secret.len() < MIN_SYMMETRIC_KEY_LEN {
            return Err(JwtError::invalid_key(format!(
                "Symmetric key must be at least {} bytes, got {}",
                MIN_SYMMETRIC_KEY_LEN,
                secret.len()
            )));
        }

        Ok(Self {
            kid: None,
            algorithm: SigningAlgorithm::HS256,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            created_at: OffsetDateTime::now_utc(),
        })
    }

    /// Generates a random 256-bit `HS256` credential.
    ///
    /// # Errors
    /// Never fails in practice; the signature matches the other constructors.
    pub fn generate_symmetric() -> Result<Self, JwtError> {
        let mut secret = [0u8; MIN_SYMMETRIC_KEY_LEN];
        OsRng.fill_bytes(&mut secret);
        Self::symmetric(&secret)
    }

    /// Generates a new RSA key pair.
    ///
    /// # Errors
    /// Returns an error if key generation fails or algorithm is not RSA-based.
    pub fn generate_rsa(algorithm: SigningAlgorithm) -> Result<Self, JwtError> {
        if !algorithm.is_rsa() {
            return Err(JwtError::unsupported_algorithm(format!(
                "Algorithm {} is not RSA-based",
                algorithm
            )));
        }

        let private_key = RsaPrivateKey::new(&mut OsRng, 2048)
            .map_err(|e| JwtError::key_generation_error(e.to_string()))?;
        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| JwtError::key_generation_error(e.to_string()))?;

        Self::rsa_from_key(algorithm, &private_key, private_pem.as_bytes())
    }

    /// Generates a new EC key pair using the P-384 curve.
    ///
    /// # Errors
    /// Returns an error if key generation fails.
    pub fn generate_ec() -> Result<Self, JwtError> {
        let secret_key = EcSecretKey::random(&mut OsRng);
        Self::ec_from_key(&secret_key)
    }

    /// Loads a credential from a PEM-encoded private key.
    ///
    /// RSA keys may be PKCS#1 or PKCS#8; EC keys may be PKCS#8 or SEC1. The
    /// verification key is derived from the private key.
    ///
    /// # Errors
    /// Returns an error if the PEM data is invalid, or if `algorithm` is
    /// symmetric or does not match the key type.
    pub fn from_pem(algorithm: SigningAlgorithm, private_pem: &str) -> Result<Self, JwtError> {
        if algorithm.is_symmetric() {
            return Err(JwtError::unsupported_algorithm(format!(
                "{} uses a shared secret, not a PEM key",
                algorithm
            )));
        }

        if algorithm.is_rsa() {
            let private_key = RsaPrivateKey::from_pkcs8_pem(private_pem)
                .or_else(|_| RsaPrivateKey::from_pkcs1_pem(private_pem))
                .map_err(|e| JwtError::invalid_key(format!("Not an RSA private key: {}", e)))?;
            return Self::rsa_from_key(algorithm, &private_key, private_pem.as_bytes());
        }

        let secret_key = EcSecretKey::from_pkcs8_pem(private_pem)
            .or_else(|_| EcSecretKey::from_sec1_pem(private_pem))
            .map_err(|e| JwtError::invalid_key(format!("Not a P-384 private key: {}", e)))?;
        Self::ec_from_key(&secret_key)
    }

    fn rsa_from_key(
        algorithm: SigningAlgorithm,
        private_key: &RsaPrivateKey,
        private_pem: &[u8],
    ) -> Result<Self, JwtError> {
        let encoding_key =
            EncodingKey::from_rsa_pem(private_pem).map_err(|e| JwtError::invalid_key(e.to_string()))?;

        let public_pem = private_key
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| JwtError::invalid_key(e.to_string()))?;
        let decoding_key = DecodingKey::from_rsa_pem(public_pem.as_bytes())
            .map_err(|e| JwtError::invalid_key(e.to_string()))?;

        Ok(Self {
            kid: None,
            algorithm,
            encoding_key,
            decoding_key,
            created_at: OffsetDateTime::now_utc(),
        })
    }

    fn ec_from_key(secret_key: &EcSecretKey) -> Result<Self, JwtError> {
        let signing_key = EcSigningKey::from(secret_key);
        let point = signing_key.verifying_key().to_encoded_point(false);
        let x = point
            .x()
            .ok_or_else(|| JwtError::invalid_key("Missing x coordinate"))?;
        let y = point
            .y()
            .ok_or_else(|| JwtError::invalid_key("Missing y coordinate"))?;

        // jsonwebtoken only reads EC private keys as PKCS#8.
        let private_pem = secret_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| JwtError::invalid_key(e.to_string()))?;
        let encoding_key = EncodingKey::from_ec_pem(private_pem.as_bytes())
            .map_err(|e| JwtError::invalid_key(e.to_string()))?;

        let decoding_key = DecodingKey::from_ec_components(
            &URL_SAFE_NO_PAD.encode(x.as_slice()),
            &URL_SAFE_NO_PAD.encode(y.as_slice()),
        )
        .map_err(|e| JwtError::invalid_key(e.to_string()))?;

        Ok(Self {
            kid: None,
            algorithm: SigningAlgorithm::ES384,
            encoding_key,
            decoding_key,
            created_at: OffsetDateTime::now_utc(),
        })
    }

    /// Sets the key ID written to the JWT `kid` header.
    #[must_use]
    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    /// Returns the key ID, if any.
    #[must_use]
    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    /// Returns the signing algorithm.
    #[must_use]
    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    /// Returns when the credential was built.
    #[must_use]
    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    /// Encodes a claim map into a compact JWT string.
    ///
    /// # Errors
    /// Returns an error if the key cannot sign with the configured algorithm.
    pub fn encode(&self, claims: &Map<String, Value>) -> Result<String, JwtError> {
        let mut header = Header::new(self.algorithm.to_jwt_algorithm());
        header.kid = self.kid.clone();

        encode(&header, claims, &self.encoding_key).map_err(|e| {
            match JwtError::from(e) {
                err @ (JwtError::UnsupportedAlgorithm { .. } | JwtError::InvalidKey { .. }) => err,
                other => JwtError::encoding_error(other.to_string()),
            }
        })
    }

    /// Decodes a token and validates signature, issuer, audience, and expiry.
    ///
    /// # Errors
    /// Returns an error if the token does not verify against this credential.
    pub fn verify(
        &self,
        token: &str,
        issuer: &str,
        audience: &str,
    ) -> Result<Map<String, Value>, JwtError> {
        let mut validation = Validation::new(self.algorithm.to_jwt_algorithm());
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        validation.validate_exp = true;
        validation.validate_nbf = true;

        decode::<Map<String, Value>>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(JwtError::from)
    }
}

// ============================================================================
// Tests
// ============================================================================
