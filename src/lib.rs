//! querycsv - Export SQL query results to CSV files.
//!
//! Queries are written out by the MySQL server itself with
//! `SELECT ... INTO OUTFILE`. Start with [`QueryToCsv`].

pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod facade;
pub mod logging;
pub mod query;

pub use config::{BindingMode, Config, ExportConfig};
pub use error::{ExportError, Result};
pub use export::{CsvExport, CsvFormat, ExportReport, FileDownload, QueryMode};
pub use facade::QueryToCsv;
pub use query::{Model, ModelQuery, SelectBuilder, StructuredQuery};
