//! Token handle storage.
//!
//! `take` is a single `DELETE ... RETURNING` statement, so concurrent
//! redemptions of one handle are serialized by the row lock and at most one
//! of them gets the row back.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;

use authz_issuer::storage::{ApplicationStorage, HandleStore, TakeOutcome};
use authz_issuer::types::{HandleRecord, HandleType, TokenHandle};
use authz_issuer::{IssuanceError, IssuanceResult};

use crate::{PgPool, StorageError, StorageResult};

/// Table definition.
pub const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS token_handle (
    handle_hash TEXT PRIMARY KEY,
    handle_type TEXT NOT NULL,
    resource JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    expires_at TIMESTAMPTZ
)
"#;

/// Index used by expiry cleanup.
pub const CREATE_EXPIRES_INDEX_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS token_handle_expires_at_idx
    ON token_handle (expires_at)
    WHERE expires_at IS NOT NULL
"#;

type HandleTuple = (
    String,
    String,
    serde_json::Value,
    OffsetDateTime,
    Option<OffsetDateTime>,
);

// =============================================================================
// Types
// =============================================================================

/// Handle record from database.
#[derive(Debug, Clone)]
pub struct HandleRow {
    /// SHA-256 hash of the handle identifier
    pub handle_hash: String,
    /// Handle type (`authorization_code` or `refresh_token`)
    pub handle_type: String,
    /// Serialized [`HandleRecord`]
    pub resource: serde_json::Value,
    pub created_at: OffsetDateTime,
    pub expires_at: Option<OffsetDateTime>,
}

impl HandleRow {
    /// Create from database tuple.
    fn from_tuple(row: HandleTuple) -> Self {
        Self {
            handle_hash: row.0,
            handle_type: row.1,
            resource: row.2,
            created_at: row.3,
            expires_at: row.4,
        }
    }

    /// Returns `true` if the row has passed its expiration.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|exp| OffsetDateTime::now_utc() > exp)
            .unwrap_or(false)
    }

    /// Parses the stored handle record.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource is not a handle record or disagrees
    /// with the `handle_type` column.
    pub fn record(&self) -> StorageResult<HandleRecord> {
        let record: HandleRecord = serde_json::from_value(self.resource.clone())?;
        let column: HandleType = self
            .handle_type
            .parse()
            .map_err(|_| StorageError::invalid_input(format!("handle type '{}'", self.handle_type)))?;

        if record.handle_type != column {
            return Err(StorageError::invalid_input(format!(
                "handle type column '{}' does not match resource '{}'",
                column, record.handle_type
            )));
        }

        Ok(record)
    }
}

// =============================================================================
// Handle Storage
// =============================================================================

/// Row-level handle operations.
pub struct HandleStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> HandleStorage<'a> {
    /// Create a new handle storage with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Creates the `token_handle` table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the DDL fails.
    pub async fn migrate(&self) -> StorageResult<()> {
        query(CREATE_TABLE_SQL).execute(self.pool).await?;
        query(CREATE_EXPIRES_INDEX_SQL).execute(self.pool).await?;
        Ok(())
    }

    /// Find a handle by its hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_hash(&self, handle_hash: &str) -> StorageResult<Option<HandleRow>> {
        let row: Option<HandleTuple> = query_as(
            r#"
            SELECT handle_hash, handle_type, resource, created_at, expires_at
            FROM token_handle
            WHERE handle_hash = $1
            "#,
        )
        .bind(handle_hash)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(HandleRow::from_tuple))
    }

    /// Atomically delete a handle and return it.
    ///
    /// Returns `None` if no row matched, including when a concurrent caller
    /// deleted it first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn take_by_hash(&self, handle_hash: &str) -> StorageResult<Option<HandleRow>> {
        let row: Option<HandleTuple> = query_as(
            r#"
            DELETE FROM token_handle
            WHERE handle_hash = $1
            RETURNING handle_hash, handle_type, resource, created_at, expires_at
            "#,
        )
        .bind(handle_hash)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(HandleRow::from_tuple))
    }

    /// Create a new handle row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the hash already exists, or a
    /// database error if the insert fails.
    pub async fn create(
        &self,
        handle_hash: &str,
        record: &HandleRecord,
    ) -> StorageResult<HandleRow> {
        let resource = serde_json::to_value(record)?;

        let row: HandleTuple = query_as(
            r#"
            INSERT INTO token_handle (handle_hash, handle_type, resource, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING handle_hash, handle_type, resource, created_at, expires_at
            "#,
        )
        .bind(handle_hash)
        .bind(record.handle_type.as_str())
        .bind(&resource)
        .bind(record.created_at)
        .bind(record.expires_at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx_core::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StorageError::conflict("handle already exists");
            }
            StorageError::from(e)
        })?;

        Ok(HandleRow::from_tuple(row))
    }

    /// Delete handles past their expiration.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn cleanup_expired(&self) -> StorageResult<u64> {
        let result = query(
            r#"
            DELETE FROM token_handle
            WHERE expires_at IS NOT NULL
              AND expires_at < NOW()
            "#,
        )
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Arc-Owning Handle Store
// =============================================================================

/// PostgreSQL [`HandleStore`].
///
/// Owns an `Arc<PgPool>` so it can be shared as `Arc<dyn HandleStore>`.
/// Applications are rehydrated through [`ApplicationStorage`].
#[derive(Clone)]
pub struct PostgresHandleStore {
    pool: Arc<PgPool>,
    applications: Arc<dyn ApplicationStorage>,
}

impl PostgresHandleStore {
    /// Create a new store with an existing connection pool.
    #[must_use]
    pub fn new(pool: Arc<PgPool>, applications: Arc<dyn ApplicationStorage>) -> Self {
        Self { pool, applications }
    }

    /// Create a new store by connecting to the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect(
        database_url: &str,
        applications: Arc<dyn ApplicationStorage>,
    ) -> StorageResult<Self> {
        use sqlx_core::pool::PoolOptions;
        let pool = PoolOptions::<sqlx_postgres::Postgres>::new()
            .connect(database_url)
            .await?;
        Ok(Self::new(Arc::new(pool), applications))
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the `token_handle` table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the DDL fails.
    pub async fn migrate(&self) -> StorageResult<()> {
        HandleStorage::new(&self.pool).migrate().await
    }
}

/// Rebuilds a [`TokenHandle`] from a row.
///
/// # Errors
///
/// Returns a storage error if the row is malformed and `InvalidGrant` if the
/// referenced application is no longer registered.
pub async fn rehydrate(
    row: &HandleRow,
    handle_id: &str,
    applications: &dyn ApplicationStorage,
) -> IssuanceResult<TokenHandle> {
    let record = row.record()?;
    let application = applications
        .find_by_id(&record.application_id)
        .await?
        .ok_or_else(|| {
            IssuanceError::invalid_grant(format!(
                "handle references unknown application '{}'",
                record.application_id
            ))
        })?;

    record.into_handle(handle_id, application)
}

#[async_trait]
impl HandleStore for PostgresHandleStore {
    async fn find(&self, handle_id: &str) -> IssuanceResult<Option<TokenHandle>> {
        let storage = HandleStorage::new(&self.pool);
        match storage.find_by_hash(&TokenHandle::hash_id(handle_id)).await? {
            Some(row) => Ok(Some(
                rehydrate(&row, handle_id, self.applications.as_ref()).await?,
            )),
            None => Ok(None),
        }
    }

    async fn take(&self, handle_id: &str) -> IssuanceResult<TakeOutcome> {
        let storage = HandleStorage::new(&self.pool);
        let Some(row) = storage.take_by_hash(&TokenHandle::hash_id(handle_id)).await? else {
            return Ok(TakeOutcome::Consumed);
        };

        if row.is_expired() {
            return Ok(TakeOutcome::Expired);
        }

        let handle = rehydrate(&row, handle_id, self.applications.as_ref()).await?;
        Ok(TakeOutcome::Deleted(handle))
    }

    async fn insert(&self, handle: &TokenHandle) -> IssuanceResult<()> {
        let storage = HandleStorage::new(&self.pool);
        storage
            .create(&handle.id_hash(), &handle.to_record())
            .await?;
        Ok(())
    }

    async fn cleanup_expired(&self) -> IssuanceResult<u64> {
        let storage = HandleStorage::new(&self.pool);
        let removed = storage.cleanup_expired().await?;
        if removed > 0 {
            tracing::debug!(removed, "Expired handles removed");
        }
        Ok(removed)
    }
}

// =============================================================================
// Tests
// =============================================================================
