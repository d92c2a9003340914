//! Issuer configuration.
//!
//! [`IssuerSettings`] is the deserializable form, loaded from TOML and
//! environment overrides by [`loader::load_settings`]. The engine receives a
//! validated, immutable [`GlobalConfiguration`] snapshot.
//!
//! # Example (TOML)
//!
//! ```toml
//! issuer = "https://auth.example.com"
//! default_refresh_token_lifetime = "90d"
//! verify_signed_tokens = true
//! log_level = "info"
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Log levels accepted by `log_level`.
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Upper bound for `default_refresh_token_lifetime` (100 years).
pub const MAX_REFRESH_TOKEN_LIFETIME: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// Issuer settings as read from configuration sources.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct IssuerSettings {
    /// Token issuer (`iss` claim).
    pub issuer: String,

    /// Lifetime of refresh handles whose parent grant did not set one.
    #[serde(with = "humantime_serde")]
    pub default_refresh_token_lifetime: Duration,

    /// Verify every token right after signing it.
    pub verify_signed_tokens: bool,

    /// Default tracing level when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for IssuerSettings {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:8080".to_string(),
            default_refresh_token_lifetime: Duration::from_secs(90 * 24 * 3600), // 90 days
            verify_signed_tokens: true,
            log_level: "info".to_string(),
        }
    }
}

impl IssuerSettings {
    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the issuer is empty and
    /// `ConfigError::InvalidValue` if the refresh lifetime is zero or above
    /// [`MAX_REFRESH_TOKEN_LIFETIME`], or the log level is unknown.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.trim().is_empty() {
            return Err(ConfigError::Missing("issuer".to_string()));
        }

        if self.default_refresh_token_lifetime.is_zero() {
            return Err(ConfigError::InvalidValue(
                "default_refresh_token_lifetime must be > 0".to_string(),
            ));
        }

        if self.default_refresh_token_lifetime > MAX_REFRESH_TOKEN_LIFETIME {
            return Err(ConfigError::InvalidValue(
                "default_refresh_token_lifetime must not exceed 100 years".to_string(),
            ));
        }

        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::InvalidValue(format!(
                "Invalid log level: '{}'. Must be one of trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),

    /// Configuration sources could not be read or deserialized.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Immutable configuration snapshot shared by all issuance calls.
#[derive(Debug, Clone)]
pub struct GlobalConfiguration {
    issuer: String,
    default_refresh_token_lifetime: Duration,
    verify_signed_tokens: bool,
}

impl GlobalConfiguration {
    /// Creates a snapshot without validating it.
    ///
    /// The descriptor builder still rejects an empty issuer at issuance time,
    /// and [`default_refresh_expiration`](Self::default_refresh_expiration)
    /// reports an unrepresentable lifetime as `None`.
    #[must_use]
    pub fn new(settings: IssuerSettings) -> Self {
        Self {
            issuer: settings.issuer,
            default_refresh_token_lifetime: settings.default_refresh_token_lifetime,
            verify_signed_tokens: settings.verify_signed_tokens,
        }
    }

    /// Validates `settings` and creates a snapshot.
    ///
    /// # Errors
    ///
    /// Returns the first validation error.
    pub fn from_settings(settings: IssuerSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self::new(settings))
    }

    /// Token issuer.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Lifetime applied to refresh handles without an explicit expiration.
    #[must_use]
    pub fn default_refresh_token_lifetime(&self) -> Duration {
        self.default_refresh_token_lifetime
    }

    /// Expiration of a refresh handle minted at `now` without an explicit one.
    ///
    /// Returns `None` if the result does not fit in an [`OffsetDateTime`].
    #[must_use]
    pub fn default_refresh_expiration(&self, now: OffsetDateTime) -> Option<OffsetDateTime> {
        time::Duration::try_from(self.default_refresh_token_lifetime)
            .ok()
            .and_then(|lifetime| now.checked_add(lifetime))
    }

    /// Whether signers should verify their own output.
    #[must_use]
    pub fn verify_signed_tokens(&self) -> bool {
        self.verify_signed_tokens
    }
}

impl Default for GlobalConfiguration {
    fn default() -> Self {
        Self::new(IssuerSettings::default())
    }
}

pub mod loader {
    use std::path::Path;

    use config::{Config, Environment, File};

    use super::{ConfigError, IssuerSettings};

    /// Default configuration file, relative to the working directory.
    pub const DEFAULT_CONFIG_FILE: &str = "authz-issuer.toml";

    /// Environment variable prefix, e.g. `AUTHZ_ISSUER__ISSUER`.
    pub const ENV_PREFIX: &str = "AUTHZ_ISSUER";

    /// Loads settings from `path` (or [`DEFAULT_CONFIG_FILE`]) and the
    /// environment, then validates them.
    ///
    /// A missing file is not an error; defaults and environment overrides
    /// still apply.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or validation fails.
    pub fn load_settings(path: Option<&Path>) -> Result<IssuerSettings, ConfigError> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));

        let mut builder = Config::builder();
        if path.exists() {
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .separator("__"),
        );

        let settings: IssuerSettings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }
}
