/// PostgreSQL plumbing used by the `postgres` keyspace backend
pub mod migrations;
pub mod pool;

pub use migrations::{get_migration_status, run_migrations, MigrationStatus};
pub use pool::{close_pool, create_pool, health_check, DatabaseConfig};
