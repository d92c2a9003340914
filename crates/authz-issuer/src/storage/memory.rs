//! In-memory handle store.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::IssuanceResult;
use crate::error::IssuanceError;
use crate::storage::handle::{HandleStore, TakeOutcome};
use crate::types::TokenHandle;

/// Process-local [`HandleStore`].
///
/// Entries are keyed by identifier hash. `take` is a single
/// `DashMap::remove`, which holds the shard lock for the lookup and the
/// delete, so concurrent redemptions of one handle see exactly one winner.
#[derive(Debug, Default)]
pub struct InMemoryHandleStore {
    handles: DashMap<String, TokenHandle>,
}

impl InMemoryHandleStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored handles, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns `true` if the store holds no handles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[async_trait]
impl HandleStore for InMemoryHandleStore {
    async fn find(&self, handle_id: &str) -> IssuanceResult<Option<TokenHandle>> {
        let hash = TokenHandle::hash_id(handle_id);
        Ok(self.handles.get(&hash).map(|entry| entry.value().clone()))
    }

    async fn take(&self, handle_id: &str) -> IssuanceResult<TakeOutcome> {
        let hash = TokenHandle::hash_id(handle_id);

        Ok(match self.handles.remove(&hash) {
            Some((_, handle)) if handle.is_expired() => TakeOutcome::Expired,
            Some((_, handle)) => TakeOutcome::Deleted(handle),
            None => TakeOutcome::Consumed,
        })
    }

    async fn insert(&self, handle: &TokenHandle) -> IssuanceResult<()> {
        match self.handles.entry(handle.id_hash()) {
            Entry::Occupied(_) => Err(IssuanceError::storage("handle already exists")),
            Entry::Vacant(slot) => {
                slot.insert(handle.clone());
                Ok(())
            }
        }
    }

    async fn cleanup_expired(&self) -> IssuanceResult<u64> {
        let before = self.handles.len();
        self.handles.retain(|_, handle| !handle.is_expired());
        let removed = before.saturating_sub(self.handles.len());

        if removed > 0 {
            tracing::debug!(removed, "Expired handles removed");
        }

        Ok(removed as u64)
    }
}
