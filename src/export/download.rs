//! Download descriptor for a generated export.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{ExportError, Result};

/// MIME type of generated files.
pub const CSV_CONTENT_TYPE: &str = "text/csv";

/// Everything an HTTP layer needs to stream a generated file back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDownload {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Name offered to the client.
    pub file_name: String,
    /// MIME type of the body.
    pub content_type: &'static str,
}

impl FileDownload {
    /// Describes the file at `path`, offering its own name to the client.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            file_name,
            content_type: CSV_CONTENT_TYPE,
        }
    }

    /// Value for the `Content-Disposition` response header.
    pub fn content_disposition(&self) -> String {
        let name = self.file_name.replace(['"', '\\'], "_");
        format!("attachment; filename=\"{name}\"")
    }

    /// Size of the file in bytes.
    pub async fn size(&self) -> Result<u64> {
        let metadata = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| not_readable(&self.path, e))?;
        Ok(metadata.len())
    }

    /// Opens the file for streaming.
    pub async fn open(&self) -> Result<tokio::fs::File> {
        tokio::fs::File::open(&self.path)
            .await
            .map_err(|e| not_readable(&self.path, e))
    }
}

fn not_readable(path: &Path, e: std::io::Error) -> ExportError {
    ExportError::io(format!("Cannot read export file {}: {e}", path.display()))
}
