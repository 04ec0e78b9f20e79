/// Storage layer
///
/// [`Keyspace`] is the backend seam; [`Store`] is the cloneable handle the
/// rest of the application holds. Every call through a `Store` is bounded by a
/// timeout so a stalled backend surfaces as [`StoreError::Unavailable`]
/// instead of hanging a request.
///
/// # Example
///
/// ```no_run
/// use goaltrack_shared::store::{RowKey, Store, Table};
///
/// # async fn example() -> Result<(), goaltrack_shared::store::StoreError> {
/// let store = Store::in_memory();
/// let row: Option<serde_json::Value> = store
///     .get(Table::UsersByUsername, &RowKey::single("runner"))
///     .await?;
/// assert!(row.is_none());
/// # Ok(())
/// # }
/// ```

pub mod error;
pub mod keyspace;
pub mod memory;
pub mod postgres;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

pub use error::StoreError;
pub use keyspace::{Batch, ClusteringOrder, Keyspace, RowKey, Table, Write};
pub use memory::MemoryKeyspace;
pub use postgres::PgKeyspace;

/// Default upper bound for a single keyspace call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared, timeout-bounded handle to a keyspace backend
#[derive(Clone)]
pub struct Store {
    keyspace: Arc<dyn Keyspace>,
    call_timeout: Duration,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("backend", &self.keyspace.backend())
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

impl Store {
    pub fn new(keyspace: Arc<dyn Keyspace>, call_timeout: Duration) -> Self {
        Self {
            keyspace,
            call_timeout,
        }
    }

    /// Fresh in-memory store with the default call timeout
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKeyspace::new()), DEFAULT_CALL_TIMEOUT)
    }

    pub fn backend(&self) -> &'static str {
        self.keyspace.backend()
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Applies `batch` atomically; an empty batch is a no-op
    pub async fn execute(&self, batch: Batch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }

        debug!(writes = batch.len(), backend = self.backend(), "Executing batch");
        self.bounded("execute", self.keyspace.execute(batch)).await
    }

    /// Reads one row and decodes it into `T`
    pub async fn get<T: DeserializeOwned>(
        &self,
        table: Table,
        key: &RowKey,
    ) -> Result<Option<T>, StoreError> {
        let row = self.bounded("get", self.keyspace.get(table, key)).await?;
        Ok(row.map(serde_json::from_value).transpose()?)
    }

    /// Reads up to `limit` rows of a partition in clustering order
    pub async fn scan<T: DeserializeOwned>(
        &self,
        table: Table,
        partition: &str,
        from: Option<&str>,
        limit: usize,
    ) -> Result<Vec<T>, StoreError> {
        let rows = self
            .bounded("scan", self.keyspace.scan(table, partition, from, limit))
            .await?;

        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(StoreError::from))
            .collect()
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.bounded("ping", self.keyspace.ping()).await
    }

    /// Releases backend resources during shutdown
    pub async fn close(&self) {
        self.keyspace.close().await;
    }

    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    operation,
                    backend = self.backend(),
                    timeout_ms = self.call_timeout.as_millis() as u64,
                    "Keyspace call timed out"
                );
                Err(StoreError::Unavailable(format!(
                    "{} did not complete within {}ms",
                    operation,
                    self.call_timeout.as_millis()
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value as JsonValue};

    /// Backend that never answers
    struct StalledKeyspace;

    #[async_trait]
    impl Keyspace for StalledKeyspace {
        fn backend(&self) -> &'static str {
            "stalled"
        }

        async fn execute(&self, _batch: Batch) -> Result<(), StoreError> {
            std::future::pending().await
        }

        async fn get(&self, _table: Table, _key: &RowKey) -> Result<Option<JsonValue>, StoreError> {
            std::future::pending().await
        }

        async fn scan(
            &self,
            _table: Table,
            _partition: &str,
            _from: Option<&str>,
            _limit: usize,
        ) -> Result<Vec<JsonValue>, StoreError> {
            std::future::pending().await
        }

        async fn ping(&self) -> Result<(), StoreError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_backend_surfaces_unavailable() {
        let store = Store::new(Arc::new(StalledKeyspace), Duration::from_millis(50));

        let err = store
            .get::<JsonValue>(Table::GoalsById, &RowKey::single("g1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        let err = store.ping().await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_typed_round_trip() {
        let store = Store::in_memory();
        let mut batch = Batch::new();
        batch
            .upsert(Table::GoalsById, RowKey::single("g1"), &json!({"title": "Run"}))
            .unwrap();
        store.execute(batch).await.unwrap();

        let row: Option<JsonValue> = store
            .get(Table::GoalsById, &RowKey::single("g1"))
            .await
            .unwrap();
        assert_eq!(row, Some(json!({"title": "Run"})));
        assert_eq!(store.backend(), "memory");
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let store = Store::in_memory();
        store.execute(Batch::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_decode_failure_is_serialization_error() {
        let store = Store::in_memory();
        let mut batch = Batch::new();
        batch
            .upsert(Table::GoalsById, RowKey::single("g1"), &json!("not a number"))
            .unwrap();
        store.execute(batch).await.unwrap();

        let err = store
            .get::<u32>(Table::GoalsById, &RowKey::single("g1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }
}
