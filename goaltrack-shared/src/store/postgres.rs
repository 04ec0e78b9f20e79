/// PostgreSQL keyspace backend
///
/// All projection tables share the `wide_rows` table, keyed by
/// `(table_name, partition_key, clustering_key)`. A [`Batch`] runs inside one
/// transaction; an insert-if-absent that hits an existing row rolls the whole
/// transaction back.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgPool;
use tracing::{debug, warn};

use super::error::StoreError;
use super::keyspace::{Batch, ClusteringOrder, Keyspace, RowKey, Table, Write};
use crate::db::pool;

const INSERT_IF_ABSENT: &str = "INSERT INTO wide_rows (table_name, partition_key, clustering_key, row_data)
     VALUES ($1, $2, $3, $4)
     ON CONFLICT (table_name, partition_key, clustering_key) DO NOTHING";

const UPSERT: &str = "INSERT INTO wide_rows (table_name, partition_key, clustering_key, row_data)
     VALUES ($1, $2, $3, $4)
     ON CONFLICT (table_name, partition_key, clustering_key)
     DO UPDATE SET row_data = EXCLUDED.row_data, written_at = NOW()";

const DELETE: &str = "DELETE FROM wide_rows
     WHERE table_name = $1 AND partition_key = $2 AND clustering_key = $3";

const GET: &str = "SELECT row_data FROM wide_rows
     WHERE table_name = $1 AND partition_key = $2 AND clustering_key = $3";

const SCAN_ASC: &str = "SELECT row_data FROM wide_rows
     WHERE table_name = $1 AND partition_key = $2
     ORDER BY clustering_key ASC LIMIT $3";

const SCAN_ASC_FROM: &str = "SELECT row_data FROM wide_rows
     WHERE table_name = $1 AND partition_key = $2 AND clustering_key >= $4
     ORDER BY clustering_key ASC LIMIT $3";

const SCAN_DESC: &str = "SELECT row_data FROM wide_rows
     WHERE table_name = $1 AND partition_key = $2
     ORDER BY clustering_key DESC LIMIT $3";

const SCAN_DESC_FROM: &str = "SELECT row_data FROM wide_rows
     WHERE table_name = $1 AND partition_key = $2 AND clustering_key <= $4
     ORDER BY clustering_key DESC LIMIT $3";

/// Keyspace stored in a PostgreSQL database
#[derive(Debug, Clone)]
pub struct PgKeyspace {
    pool: PgPool,
}

impl PgKeyspace {
    /// Wraps an existing pool; run migrations before first use
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Keyspace for PgKeyspace {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn execute(&self, batch: Batch) -> Result<(), StoreError> {
        let writes = batch.len();
        let mut tx = self.pool.begin().await?;

        for write in batch.into_writes() {
            match write {
                Write::Insert { table, key, row } => {
                    let result = sqlx::query(INSERT_IF_ABSENT)
                        .bind(table.name())
                        .bind(&key.partition)
                        .bind(&key.clustering)
                        .bind(&row)
                        .execute(&mut *tx)
                        .await?;

                    if result.rows_affected() == 0 {
                        tx.rollback().await?;
                        warn!(table = %table, key = %key, "Insert-if-absent hit an existing row");
                        return Err(StoreError::Duplicate {
                            table,
                            key: key.to_string(),
                        });
                    }
                }
                Write::Upsert { table, key, row } => {
                    sqlx::query(UPSERT)
                        .bind(table.name())
                        .bind(&key.partition)
                        .bind(&key.clustering)
                        .bind(&row)
                        .execute(&mut *tx)
                        .await?;
                }
                Write::Delete { table, key } => {
                    sqlx::query(DELETE)
                        .bind(table.name())
                        .bind(&key.partition)
                        .bind(&key.clustering)
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        tx.commit().await?;
        debug!(writes, "Committed batch to postgres keyspace");
        Ok(())
    }

    async fn get(&self, table: Table, key: &RowKey) -> Result<Option<JsonValue>, StoreError> {
        let row = sqlx::query_scalar::<_, JsonValue>(GET)
            .bind(table.name())
            .bind(&key.partition)
            .bind(&key.clustering)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn scan(
        &self,
        table: Table,
        partition: &str,
        from: Option<&str>,
        limit: usize,
    ) -> Result<Vec<JsonValue>, StoreError> {
        let sql = match (table.clustering_order(), from.is_some()) {
            (ClusteringOrder::Ascending, false) => SCAN_ASC,
            (ClusteringOrder::Ascending, true) => SCAN_ASC_FROM,
            (ClusteringOrder::Descending, false) => SCAN_DESC,
            (ClusteringOrder::Descending, true) => SCAN_DESC_FROM,
        };

        let mut query = sqlx::query_scalar::<_, JsonValue>(sql)
            .bind(table.name())
            .bind(partition)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX));
        if let Some(from) = from {
            query = query.bind(from);
        }

        Ok(query.fetch_all(&self.pool).await?)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        pool::health_check(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        pool::close_pool(&self.pool).await;
    }
}
