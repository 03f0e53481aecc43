//! Error types for querycsv.
//!
//! Defines the error enum shared by the facade, the exporter and the
//! database layer.

use thiserror::Error;

/// Main error type for export operations.
#[derive(Error, Debug)]
pub enum ExportError {
    /// The structured query passed to the facade is not a supported shape.
    #[error(
        "Invalid query type: expected a query builder or a model query, instance of {0} is given"
    )]
    InvalidQueryType(String),

    /// The raw query starts with something other than SELECT.
    #[error("Disallowed statement: {0} query is not allowed for exports, please use select statements")]
    DisallowedStatement(String),

    /// The raw query contains a statement separator outside string literals.
    #[error("Multiple statements: query string seems to contain more than one query")]
    MultipleStatements,

    /// Header count disagrees with the number of projected columns.
    #[error("Column count mismatch: {}", cardinality_detail(.headers, .columns))]
    ColumnCardinalityMismatch {
        /// Number of header values registered on the export.
        headers: usize,
        /// Number of columns the query projects, when known.
        columns: Option<usize>,
    },

    /// The export statement failed for any other reason.
    #[error("Export failed: {message}. Query: \"{query}\"")]
    ExportExecutionFailed {
        /// Message reported by the database.
        message: String,
        /// The query that was being exported.
        query: String,
    },

    /// Database connection errors (host unreachable, auth failed, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Auxiliary query errors (row counts, column probes).
    #[error("Query error: {0}")]
    Query(String),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem errors while preparing the export target.
    #[error("I/O error: {0}")]
    Io(String),
}

fn cardinality_detail(headers: &usize, columns: &Option<usize>) -> String {
    match columns {
        Some(columns) => format!(
            "{headers} column header(s) specified but the query selects {columns} column(s)"
        ),
        None => "the count of column headers does not match the selected columns".to_string(),
    }
}

impl ExportError {
    /// Creates an invalid query type error naming the rejected type.
    pub fn invalid_query_type(type_name: impl Into<String>) -> Self {
        Self::InvalidQueryType(type_name.into())
    }

    /// Creates a disallowed statement error naming the leading keyword.
    pub fn disallowed_statement(keyword: impl Into<String>) -> Self {
        Self::DisallowedStatement(keyword.into())
    }

    /// Creates an execution failure carrying the offending query.
    pub fn execution_failed(message: impl Into<String>, query: impl Into<String>) -> Self {
        Self::ExportExecutionFailed {
            message: message.into(),
            query: query.into(),
        }
    }

    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an I/O error with the given message.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidQueryType(_) => "Invalid Query Type",
            Self::DisallowedStatement(_) => "Disallowed Statement",
            Self::MultipleStatements => "Multiple Statements",
            Self::ColumnCardinalityMismatch { .. } => "Column Count Mismatch",
            Self::ExportExecutionFailed { .. } => "Export Error",
            Self::Connection(_) => "Connection Error",
            Self::Query(_) => "Query Error",
            Self::Config(_) => "Configuration Error",
            Self::Io(_) => "I/O Error",
        }
    }

    /// Returns a message safe to show to end users.
    ///
    /// Identical to `Display` except that execution failures omit the
    /// statement text.
    pub fn user_message(&self) -> String {
        match self {
            Self::ExportExecutionFailed { .. } => {
                "Export failed: there is an error in the SELECT query".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Returns true if the error was raised while validating input, before
    /// anything ran against the database.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidQueryType(_) | Self::DisallowedStatement(_) | Self::MultipleStatements
        )
    }
}

impl From<std::io::Error> for ExportError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Result type alias using ExportError.
pub type Result<T> = std::result::Result<T, ExportError>;
