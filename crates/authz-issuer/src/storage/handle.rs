//! Handle store trait.
//!
//! # Security Considerations
//!
//! - Handles are indexed by the SHA-256 hash of their identifier
//! - `take` must be atomic: at most one caller observes `Deleted`
//! - Expired handles should be cleaned up periodically

use async_trait::async_trait;

use crate::IssuanceResult;
use crate::types::TokenHandle;

/// Result of an atomic take.
///
/// Replay is an expected outcome, not a storage failure.
#[derive(Debug, Clone)]
pub enum TakeOutcome {
    /// The handle existed and this caller deleted it.
    Deleted(TokenHandle),
    /// No such handle: already redeemed or never issued.
    Consumed,
    /// The handle existed but had expired. It has been deleted.
    Expired,
}

/// Storage for single-use token handles.
///
/// # Implementations
///
/// - [`InMemoryHandleStore`](crate::storage::InMemoryHandleStore)
/// - `authz-issuer-postgres` - PostgreSQL storage backend
#[async_trait]
pub trait HandleStore: Send + Sync {
    /// Finds a handle by its plaintext identifier.
    ///
    /// Returns handles regardless of expiration; callers check
    /// [`TokenHandle::is_expired`] if they need to.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find(&self, handle_id: &str) -> IssuanceResult<Option<TokenHandle>>;

    /// Atomically looks up and deletes a handle.
    ///
    /// Concurrent calls for the same identifier must yield at most one
    /// [`TakeOutcome::Deleted`].
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails. A missing handle is
    /// reported as [`TakeOutcome::Consumed`], not as an error.
    async fn take(&self, handle_id: &str) -> IssuanceResult<TakeOutcome>;

    /// Stores a new handle.
    ///
    /// # Errors
    ///
    /// Returns an error if a handle with the same identifier exists or the
    /// storage operation fails.
    async fn insert(&self, handle: &TokenHandle) -> IssuanceResult<()>;

    /// Deletes expired handles.
    ///
    /// # Returns
    ///
    /// Returns the number of handles deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn cleanup_expired(&self) -> IssuanceResult<u64>;
}
