/// In-process keyspace backend
///
/// Partitions are `BTreeMap`s keyed by clustering key, so scans come out
/// sorted without extra work. A whole batch is checked and applied while one
/// write lock is held, which gives the same all-or-nothing behaviour as the
/// Postgres transaction.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;
use tracing::debug;

use super::error::StoreError;
use super::keyspace::{Batch, ClusteringOrder, Keyspace, RowKey, Table, Write};

type Partition = BTreeMap<String, JsonValue>;

/// Keyspace held entirely in memory; contents are lost on drop
#[derive(Debug, Default)]
pub struct MemoryKeyspace {
    partitions: RwLock<HashMap<(Table, String), Partition>>,
}

impl MemoryKeyspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of rows across all tables
    #[cfg(test)]
    pub(crate) async fn row_count(&self) -> usize {
        self.partitions.read().await.values().map(BTreeMap::len).sum()
    }
}

fn contains(partitions: &HashMap<(Table, String), Partition>, table: Table, key: &RowKey) -> bool {
    partitions
        .get(&(table, key.partition.clone()))
        .is_some_and(|rows| rows.contains_key(&key.clustering))
}

#[async_trait]
impl Keyspace for MemoryKeyspace {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn execute(&self, batch: Batch) -> Result<(), StoreError> {
        let mut partitions = self.partitions.write().await;

        // Check inserts against the state the batch itself builds up
        let mut staged: HashMap<(Table, &RowKey), bool> = HashMap::new();
        for write in batch.writes() {
            let slot = (write.table(), write.key());
            let exists = staged
                .get(&slot)
                .copied()
                .unwrap_or_else(|| contains(&partitions, slot.0, slot.1));

            if let Write::Insert { table, key, .. } = write {
                if exists {
                    return Err(StoreError::Duplicate {
                        table: *table,
                        key: key.to_string(),
                    });
                }
            }
            staged.insert(slot, !matches!(write, Write::Delete { .. }));
        }
        drop(staged);

        let writes = batch.len();
        for write in batch.into_writes() {
            match write {
                Write::Insert { table, key, row } | Write::Upsert { table, key, row } => {
                    partitions
                        .entry((table, key.partition))
                        .or_default()
                        .insert(key.clustering, row);
                }
                Write::Delete { table, key } => {
                    let slot = (table, key.partition);
                    if let Some(rows) = partitions.get_mut(&slot) {
                        rows.remove(&key.clustering);
                        if rows.is_empty() {
                            partitions.remove(&slot);
                        }
                    }
                }
            }
        }

        debug!(writes, "Applied batch to memory keyspace");
        Ok(())
    }

    async fn get(&self, table: Table, key: &RowKey) -> Result<Option<JsonValue>, StoreError> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .get(&(table, key.partition.clone()))
            .and_then(|rows| rows.get(&key.clustering))
            .cloned())
    }

    async fn scan(
        &self,
        table: Table,
        partition: &str,
        from: Option<&str>,
        limit: usize,
    ) -> Result<Vec<JsonValue>, StoreError> {
        let partitions = self.partitions.read().await;
        let Some(rows) = partitions.get(&(table, partition.to_string())) else {
            return Ok(Vec::new());
        };

        let rows = match (table.clustering_order(), from) {
            (ClusteringOrder::Ascending, Some(from)) => rows
                .range(from.to_string()..)
                .take(limit)
                .map(|(_, row)| row.clone())
                .collect(),
            (ClusteringOrder::Ascending, None) => rows.values().take(limit).cloned().collect(),
            (ClusteringOrder::Descending, Some(from)) => rows
                .range(..=from.to_string())
                .rev()
                .take(limit)
                .map(|(_, row)| row.clone())
                .collect(),
            (ClusteringOrder::Descending, None) => {
                rows.values().rev().take(limit).cloned().collect()
            }
        };

        Ok(rows)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
