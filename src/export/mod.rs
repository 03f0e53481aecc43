//! The export pipeline.
//!
//! A [`CsvExport`] holds one normalized query. Callers pick the output file
//! and header row, then call [`CsvExport::generate`] (or one of the delivery
//! helpers) to have the server write the CSV with `INTO OUTFILE`.

mod download;
mod path;
mod statement;

pub use download::{FileDownload, CSV_CONTENT_TYPE};
pub use path::{path_lock, prepare_target, relative_to, resolve_export_path, DEFAULT_FILE_NAME};
pub use statement::{build_outfile_statement, probe_statement, CsvFormat};

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{BindingMode, ExportConfig};
use crate::db::{DatabaseClient, Value};
use crate::error::{ExportError, Result};
use crate::logging::{export_log_line, round_millis, EXPORT_LOG_TARGET};
use crate::query::{check_for_sql_injection, interpolate_bindings, StructuredQuery};

/// How the export's query was supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    RawQuery,
    BuilderQuery,
}

/// Summary of a finished export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportReport {
    pub path: String,
    pub mode: QueryMode,
    /// Execution time in milliseconds; only measured when logging is on.
    pub execution_ms: Option<f64>,
    pub row_count: Option<u64>,
}

/// One query-to-CSV export.
pub struct CsvExport {
    client: Arc<dyn DatabaseClient>,
    config: ExportConfig,
    mode: QueryMode,
    query: String,
    params: Vec<Value>,
    column_headers: Vec<String>,
    row_count: Option<u64>,
    export_file_path: Option<String>,
    format: CsvFormat,
    execution_ms: Option<f64>,
    generated: bool,
}

impl fmt::Debug for CsvExport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsvExport")
            .field("mode", &self.mode)
            .field("query", &self.query)
            .field("params", &self.params)
            .field("column_headers", &self.column_headers)
            .field("row_count", &self.row_count)
            .field("export_file_path", &self.export_file_path)
            .finish_non_exhaustive()
    }
}

impl CsvExport {
    fn new(
        client: Arc<dyn DatabaseClient>,
        config: ExportConfig,
        mode: QueryMode,
        query: String,
        params: Vec<Value>,
        row_count: Option<u64>,
    ) -> Self {
        Self {
            client,
            config,
            mode,
            query,
            params,
            column_headers: Vec::new(),
            row_count,
            export_file_path: None,
            format: CsvFormat::default(),
            execution_ms: None,
            generated: false,
        }
    }

    /// Builds an export from raw SQL after checking it is a single SELECT.
    pub(crate) fn from_raw_query(
        client: Arc<dyn DatabaseClient>,
        config: ExportConfig,
        sql: &str,
    ) -> Result<Self> {
        let query = check_for_sql_injection(sql)?;
        Ok(Self::new(
            client,
            config,
            QueryMode::RawQuery,
            query,
            Vec::new(),
            None,
        ))
    }

    /// Builds an export from a structured query.
    ///
    /// Runs the query's COUNT first when row counts are logged.
    pub(crate) async fn from_structured(
        client: Arc<dyn DatabaseClient>,
        config: ExportConfig,
        query: &dyn StructuredQuery,
    ) -> Result<Self> {
        let bindings = query.bindings();

        let row_count = if config.wants_row_count() {
            let count = client.fetch_count(&query.count_sql(), &bindings).await?;
            debug!("Query matches {} row(s)", count);
            Some(count)
        } else {
            None
        };

        let (text, params) = match config.binding_mode {
            BindingMode::Inline => (interpolate_bindings(&query.to_sql(), &bindings), Vec::new()),
            BindingMode::Parameterized => (query.to_sql(), bindings),
        };

        Ok(Self::new(
            client,
            config,
            QueryMode::BuilderQuery,
            text,
            params,
            row_count,
        ))
    }

    /// Chooses the output file. `None` or blank values fall back to the
    /// configured defaults. A file already at the resolved path is replaced
    /// when the export runs.
    pub fn set_output_file(mut self, file_name: Option<&str>, folder: Option<&str>) -> Result<Self> {
        self.export_file_path = Some(resolve_export_path(&self.config, file_name, folder)?);
        Ok(self)
    }

    /// Sets the header row. An empty list leaves the current headers as
    /// they are.
    pub fn set_column_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let headers: Vec<String> = headers.into_iter().map(Into::into).collect();
        if !headers.is_empty() {
            self.column_headers = headers;
        }
        self
    }

    /// Overrides the field/line layout of the generated file.
    pub fn with_format(mut self, format: CsvFormat) -> Self {
        self.format = format;
        self
    }

    pub fn mode(&self) -> QueryMode {
        self.mode
    }

    /// The query that will be exported.
    pub fn query_text(&self) -> &str {
        &self.query
    }

    /// Parameters sent with the query (parameterized binding mode only).
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn column_headers(&self) -> &[String] {
        &self.column_headers
    }

    /// Rows matched by a structured query, when they were counted.
    pub fn row_count(&self) -> Option<u64> {
        self.row_count
    }

    /// The resolved output path, once known.
    pub fn export_file_path(&self) -> Option<&str> {
        self.export_file_path.as_deref()
    }

    /// Report of the last generation, if any.
    pub fn report(&self) -> Option<ExportReport> {
        if !self.generated {
            return None;
        }
        Some(ExportReport {
            path: self.export_file_path.clone()?,
            mode: self.mode,
            execution_ms: self.execution_ms,
            row_count: self.row_count,
        })
    }

    /// Writes the CSV file.
    pub async fn generate(mut self) -> Result<Self> {
        let path = match &self.export_file_path {
            Some(path) => path.clone(),
            None => {
                let path = resolve_export_path(&self.config, None, None)?;
                self.export_file_path = Some(path.clone());
                path
            }
        };

        let headers = self.resolve_headers().await?;
        let statement = build_outfile_statement(&headers, &self.query, &path, &self.format);

        let lock = path_lock(&path);
        let _guard = lock.lock().await;
        prepare_target(Path::new(&path)).await?;

        let started = self.config.enable_logging.then(Instant::now);
        debug!(mode = ?self.mode, path = %path, "Executing export statement");

        if let Err(e) = self.client.execute_statement(&statement, &self.params).await {
            return Err(self.execution_error(e, headers.len()));
        }

        if let Some(started) = started {
            let elapsed_ms = round_millis(started.elapsed());
            self.execution_ms = Some(elapsed_ms);

            let base = self.config.base_path().unwrap_or_default();
            let row_count = self.row_count.filter(|_| self.config.addlog_row_count);
            info!(
                target: EXPORT_LOG_TARGET,
                "{}",
                export_log_line(elapsed_ms, &relative_to(&path, &base), row_count)
            );
        }

        self.generated = true;
        Ok(self)
    }

    /// Generates the file and returns its path.
    pub async fn as_file_path(self) -> Result<String> {
        let export = self.generate().await?;
        export
            .export_file_path
            .ok_or_else(|| ExportError::io("Export path was not resolved"))
    }

    /// Generates the file and describes it for download.
    pub async fn as_download(self) -> Result<FileDownload> {
        let path = self.as_file_path().await?;
        Ok(FileDownload::new(path))
    }

    /// Header row to write. Checks the registered headers against the
    /// query's columns when probing is enabled, and falls back to the column
    /// names when no headers were registered.
    async fn resolve_headers(&self) -> Result<Vec<String>> {
        if !self.config.probe_columns {
            return Ok(self.column_headers.clone());
        }

        let columns = self
            .client
            .probe_columns(&probe_statement(&self.query), &self.params)
            .await
            .map_err(|e| self.execution_error(e, self.column_headers.len()))?;

        if self.column_headers.is_empty() {
            return Ok(columns.into_iter().map(|c| c.name).collect());
        }

        if !columns.is_empty() && columns.len() != self.column_headers.len() {
            return Err(ExportError::ColumnCardinalityMismatch {
                headers: self.column_headers.len(),
                columns: Some(columns.len()),
            });
        }

        Ok(self.column_headers.clone())
    }

    fn execution_error(&self, error: ExportError, headers: usize) -> ExportError {
        let message = match error {
            ExportError::Query(message)
            | ExportError::Connection(message)
            | ExportError::Io(message) => message,
            other => other.to_string(),
        };

        if message.to_lowercase().contains("cardinality") {
            warn!("Header row does not match the query's columns: {}", message);
            return ExportError::ColumnCardinalityMismatch {
                headers,
                columns: None,
            };
        }

        warn!("Export statement failed: {}", message);
        ExportError::execution_failed(message, self.query.clone())
    }
}
