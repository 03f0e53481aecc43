//! MySQL database client implementation.
//!
//! Provides the `MySqlClient` struct that implements the `DatabaseClient`
//! trait for MySQL and MariaDB servers using sqlx.

use crate::config::ConnectionConfig;
use crate::db::{ColumnInfo, DatabaseClient, Value};
use crate::error::{ExportError, Result};
use async_trait::async_trait;
use sqlx::mysql::{MySql, MySqlArguments, MySqlDatabaseError, MySqlPool, MySqlPoolOptions};
use sqlx::query::{Query, QueryScalar};
use sqlx::{Column as _, Executor, Statement as _, TypeInfo};
use std::time::Duration;
use tracing::{debug, warn};

/// Maximum number of connection retry attempts.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// SQLSTATE class MySQL reports for mismatched UNION column counts.
const CARDINALITY_VIOLATION: &str = "21000";

/// MySQL database client.
#[derive(Debug)]
pub struct MySqlClient {
    pool: MySqlPool,
}

impl MySqlClient {
    /// Connects to the server described by `config`, retrying transient
    /// failures with exponential backoff.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let conn_str = config.to_connection_string()?;

        let mut last_error = None;
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

        for attempt in 1..=MAX_RETRY_ATTEMPTS {
            debug!("Connection attempt {} of {}", attempt, MAX_RETRY_ATTEMPTS);

            let result = MySqlPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(10))
                .connect(&conn_str)
                .await;

            match result {
                Ok(pool) => {
                    debug!("Successfully connected to {}", config.display_string());
                    return Ok(Self { pool });
                }
                Err(e) => {
                    let is_transient = is_transient_error(&e);
                    last_error = Some(e);

                    if attempt < MAX_RETRY_ATTEMPTS && is_transient {
                        warn!(
                            "Connection attempt {} failed (transient error), retrying in {:?}",
                            attempt, delay
                        );
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    } else {
                        break;
                    }
                }
            }
        }

        match last_error {
            Some(e) => Err(map_connection_error(e, config)),
            None => Err(ExportError::connection("No connection attempt was made")),
        }
    }
}

#[async_trait]
impl DatabaseClient for MySqlClient {
    async fn execute_statement(&self, sql: &str, params: &[Value]) -> Result<()> {
        // Prepared even without params, so stacked statements are refused.
        let done = bind_query(sqlx::query(sql), params)
            .execute(&self.pool)
            .await
            .map_err(|e| ExportError::query(format_query_error(e)))?;
        debug!("Statement affected {} row(s)", done.rows_affected());
        Ok(())
    }

    async fn fetch_count(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let count: i64 = bind_scalar(sqlx::query_scalar(sql), params)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| ExportError::query(format_query_error(e)))?;

        u64::try_from(count)
            .map_err(|_| ExportError::query(format!("Count query returned {count}")))
    }

    async fn probe_columns(&self, sql: &str, _params: &[Value]) -> Result<Vec<ColumnInfo>> {
        // Preparing is enough to learn the projection; nothing is executed.
        let statement = (&self.pool)
            .prepare(sql)
            .await
            .map_err(|e| ExportError::query(format_query_error(e)))?;

        Ok(statement
            .columns()
            .iter()
            .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
            .collect())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

fn bind_query<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &'q [Value],
) -> Query<'q, MySql, MySqlArguments> {
    for value in params {
        query = match value {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Int(i) => query.bind(*i),
            Value::Float(f) => query.bind(*f),
            Value::String(s) => query.bind(s.as_str()),
        };
    }
    query
}

fn bind_scalar<'q>(
    mut query: QueryScalar<'q, MySql, i64, MySqlArguments>,
    params: &'q [Value],
) -> QueryScalar<'q, MySql, i64, MySqlArguments> {
    for value in params {
        query = match value {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Int(i) => query.bind(*i),
            Value::Float(f) => query.bind(*f),
            Value::String(s) => query.bind(s.as_str()),
        };
    }
    query
}

/// Determines if a sqlx error is transient and worth retrying.
fn is_transient_error(error: &sqlx::Error) -> bool {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused")
        || error_str.contains("timed out")
        || error_str.contains("timeout")
        || error_str.contains("temporarily unavailable")
        || error_str.contains("connection reset")
        || error_str.contains("broken pipe")
        || error_str.contains("too many connections")
    {
        return true;
    }

    false
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(error: sqlx::Error, config: &ConnectionConfig) -> ExportError {
    let host = config.host.as_deref().unwrap_or("localhost");
    let port = config.port;
    let user = config.user.as_deref().unwrap_or("unknown");
    let database = config.database.as_deref().unwrap_or("unknown");

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        ExportError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("access denied") {
        ExportError::connection(format!(
            "Access denied for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("unknown database") {
        ExportError::connection(format!("Database '{database}' does not exist."))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        ExportError::connection(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        ExportError::connection(error.to_string())
    }
}

/// Formats a query error the way the mysql client prints them:
/// `ERROR 1064 (42000): message`.
///
/// Column count mismatches are prefixed with `Cardinality violation` so the
/// exporter can recognize them from the text alone.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let message = db_error.message();
    let code = db_error.code();
    let number = db_error
        .try_downcast_ref::<MySqlDatabaseError>()
        .map(|e| e.number());

    let mut result = String::new();
    if code.as_deref() == Some(CARDINALITY_VIOLATION) {
        result.push_str("Cardinality violation: ");
    }

    result.push_str("ERROR");
    if let Some(number) = number {
        result.push_str(&format!(" {number}"));
    }
    if let Some(code) = code {
        result.push_str(&format!(" ({code})"));
    }
    result.push_str(": ");
    result.push_str(message);
    result
}
