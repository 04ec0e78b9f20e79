/// Wide-column keyspace abstraction
///
/// Every logical entity is stored as rows in named tables. A row is addressed
/// by a partition key and a clustering key; rows inside one partition are kept
/// sorted by clustering key in the direction declared for their table.
///
/// Writes are grouped into [`Batch`]es that a backend applies all-or-nothing.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as JsonValue;

use super::error::StoreError;

/// Sort direction of the clustering key within a partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusteringOrder {
    Ascending,
    Descending,
}

/// Every projection table known to the keyspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    /// Canonical user record, partitioned by email
    Users,
    UsersByUsername,
    UsersById,
    /// Full goal rows per user, newest first
    UserGoals,
    GoalsById,
    GoalsByStatus,
    GoalsByCategory,
    /// Goal summaries per user ordered by target date
    GoalsByTargetDate,
    OneTimeTokens,
}

impl Table {
    /// Every table, in declaration order
    pub const ALL: [Table; 9] = [
        Table::Users,
        Table::UsersByUsername,
        Table::UsersById,
        Table::UserGoals,
        Table::GoalsById,
        Table::GoalsByStatus,
        Table::GoalsByCategory,
        Table::GoalsByTargetDate,
        Table::OneTimeTokens,
    ];

    /// Table name as persisted by the backends
    pub fn name(&self) -> &'static str {
        match self {
            Table::Users => "users",
            Table::UsersByUsername => "users_by_username",
            Table::UsersById => "users_by_id",
            Table::UserGoals => "user_goals",
            Table::GoalsById => "goals_by_id",
            Table::GoalsByStatus => "goals_by_status",
            Table::GoalsByCategory => "goals_by_category",
            Table::GoalsByTargetDate => "goals_by_target_date",
            Table::OneTimeTokens => "one_time_tokens",
        }
    }

    /// Direction in which a scan walks a partition
    pub fn clustering_order(&self) -> ClusteringOrder {
        match self {
            Table::GoalsByTargetDate => ClusteringOrder::Ascending,
            Table::UserGoals | Table::GoalsByStatus | Table::GoalsByCategory => {
                ClusteringOrder::Descending
            }
            // Single-row partitions, order is irrelevant
            Table::Users
            | Table::UsersByUsername
            | Table::UsersById
            | Table::GoalsById
            | Table::OneTimeTokens => ClusteringOrder::Ascending,
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Address of one row: partition key plus clustering key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowKey {
    pub partition: String,
    pub clustering: String,
}

impl RowKey {
    pub fn new(partition: impl Into<String>, clustering: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            clustering: clustering.into(),
        }
    }

    /// Key for tables holding exactly one row per partition
    pub fn single(partition: impl Into<String>) -> Self {
        Self::new(partition, String::new())
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.clustering.is_empty() {
            f.write_str(&self.partition)
        } else {
            write!(f, "{}/{}", self.partition, self.clustering)
        }
    }
}

/// A single mutation inside a batch
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Insert-if-absent: an existing row aborts the whole batch
    Insert {
        table: Table,
        key: RowKey,
        row: JsonValue,
    },
    /// Insert or overwrite
    Upsert {
        table: Table,
        key: RowKey,
        row: JsonValue,
    },
    /// Remove the row if present
    Delete { table: Table, key: RowKey },
}

impl Write {
    pub fn table(&self) -> Table {
        match self {
            Write::Insert { table, .. } | Write::Upsert { table, .. } | Write::Delete { table, .. } => {
                *table
            }
        }
    }

    pub fn key(&self) -> &RowKey {
        match self {
            Write::Insert { key, .. } | Write::Upsert { key, .. } | Write::Delete { key, .. } => key,
        }
    }
}

/// Ordered group of writes applied atomically by a [`Keyspace`]
#[derive(Debug, Clone, Default)]
pub struct Batch {
    writes: Vec<Write>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an insert-if-absent of `row`
    pub fn insert<T: Serialize>(
        &mut self,
        table: Table,
        key: RowKey,
        row: &T,
    ) -> Result<&mut Self, StoreError> {
        let row = serde_json::to_value(row)?;
        self.writes.push(Write::Insert { table, key, row });
        Ok(self)
    }

    /// Stage an unconditional write of `row`
    pub fn upsert<T: Serialize>(
        &mut self,
        table: Table,
        key: RowKey,
        row: &T,
    ) -> Result<&mut Self, StoreError> {
        let row = serde_json::to_value(row)?;
        self.writes.push(Write::Upsert { table, key, row });
        Ok(self)
    }

    pub fn delete(&mut self, table: Table, key: RowKey) -> &mut Self {
        self.writes.push(Write::Delete { table, key });
        self
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn into_writes(self) -> Vec<Write> {
        self.writes
    }
}

/// Storage backend emulating a wide-column keyspace
///
/// Implementations must apply a [`Batch`] all-or-nothing: if any
/// [`Write::Insert`] finds an existing row, no write of the batch is visible
/// and [`StoreError::Duplicate`] is returned.
#[async_trait]
pub trait Keyspace: Send + Sync {
    /// Short backend name used in logs and health output
    fn backend(&self) -> &'static str;

    async fn execute(&self, batch: Batch) -> Result<(), StoreError>;

    async fn get(&self, table: Table, key: &RowKey) -> Result<Option<JsonValue>, StoreError>;

    /// Read up to `limit` rows of one partition in the table's clustering order
    ///
    /// When `from` is set the scan starts at that clustering key inclusive:
    /// rows `>= from` for ascending tables, rows `<= from` for descending ones.
    async fn scan(
        &self,
        table: Table,
        partition: &str,
        from: Option<&str>,
        limit: usize,
    ) -> Result<Vec<JsonValue>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    /// Release backend resources; further calls may fail
    async fn close(&self) {}
}
