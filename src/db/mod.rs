//! Database abstraction layer for querycsv.
//!
//! Provides a trait-based interface for the few operations an export needs,
//! so the exporter can run against MySQL or an in-memory mock.

mod mock;
mod mysql;
mod types;

pub use mock::MockDatabaseClient;
pub use mysql::MySqlClient;
pub use types::{ColumnInfo, Value};

use crate::config::ConnectionConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Creates a MySQL client for the given configuration.
pub async fn connect(config: &ConnectionConfig) -> Result<Arc<dyn DatabaseClient>> {
    let client = MySqlClient::connect(config).await?;
    Ok(Arc::new(client))
}

/// Trait defining the interface for database clients.
///
/// All operations are async and return Results with ExportError. `params`
/// are positional values for `?` placeholders; an empty slice means the SQL
/// is fully literal. Each call runs exactly one statement.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Executes a statement that returns no rows.
    async fn execute_statement(&self, sql: &str, params: &[Value]) -> Result<()>;

    /// Runs a query returning a single integer, such as a COUNT.
    async fn fetch_count(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Returns the columns `sql` projects without reading any rows.
    async fn probe_columns(&self, sql: &str, params: &[Value]) -> Result<Vec<ColumnInfo>>;

    /// Closes the database connection.
    async fn close(&self) -> Result<()>;
}
