//! Entry points for creating exports.

use std::sync::Arc;

use tracing::debug;

use crate::config::ExportConfig;
use crate::db::DatabaseClient;
use crate::error::{ExportError, Result};
use crate::export::CsvExport;
use crate::query::{QueryShape, StructuredQuery};

/// Creates [`CsvExport`]s from structured queries or raw SQL.
pub struct QueryToCsv;

impl QueryToCsv {
    /// Starts an export from a query builder or model query.
    ///
    /// Any other query shape is rejected with
    /// [`ExportError::InvalidQueryType`] before touching the database.
    pub async fn from_builder(
        client: Arc<dyn DatabaseClient>,
        config: ExportConfig,
        query: &dyn StructuredQuery,
    ) -> Result<CsvExport> {
        let shape = query.shape();
        if !shape.is_supported() {
            let name = match shape {
                QueryShape::Unsupported(name) if !name.is_empty() => name,
                _ => query.type_name().to_string(),
            };
            return Err(ExportError::invalid_query_type(name));
        }

        debug!("Creating export from {}", query.type_name());
        CsvExport::from_structured(client, config, query).await
    }

    /// Starts an export from raw SQL.
    ///
    /// Only a single SELECT statement is accepted.
    pub fn from_raw_query(
        client: Arc<dyn DatabaseClient>,
        config: ExportConfig,
        sql: &str,
    ) -> Result<CsvExport> {
        CsvExport::from_raw_query(client, config, sql)
    }
}
