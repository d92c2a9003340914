//! PostgreSQL handle store for authz-issuer
//!
//! Persists single-use authorization and refresh handles in the
//! `token_handle` table. Handles are keyed by the SHA-256 hash of their
//! identifier; the plaintext identifier never reaches the database.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use authz_issuer::storage::StaticApplicationStorage;
//! use authz_issuer_postgres::PostgresHandleStore;
//!
//! let store = PostgresHandleStore::connect(
//!     "postgres://localhost/authz",
//!     Arc::new(StaticApplicationStorage::new(applications)),
//! )
//! .await?;
//! store.migrate().await?;
//!
//! let response = service.issue_from_handle(&handle, &store).await?;
//! ```

pub mod handle;

use authz_issuer::IssuanceError;
use sqlx_core::pool::Pool;
use sqlx_postgres::Postgres;

/// PostgreSQL connection pool type alias.
pub type PgPool = Pool<Postgres>;

pub use handle::{HandleRow, HandleStorage, PostgresHandleStore};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during handle storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx_core::Error),

    /// Resource already exists (conflict).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored data is not a valid handle.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl StorageError {
    /// Create a `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Create an `InvalidInput` error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Returns `true` if this is a `Conflict` error.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Returns `true` if this is a database error.
    #[must_use]
    pub fn is_database_error(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

impl From<StorageError> for IssuanceError {
    fn from(err: StorageError) -> Self {
        IssuanceError::storage(err.to_string())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// Tests
// =============================================================================
