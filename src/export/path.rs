//! Export file naming, target preparation and per-path serialization.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, LazyLock, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::config::ExportConfig;
use crate::error::{ExportError, Result};

/// Base name used when the caller does not supply one.
pub const DEFAULT_FILE_NAME: &str = "sheetfile";

const CSV_EXTENSION: &str = ".csv";

/// Resolves the export path for `file_name` in `folder` under the storage
/// root and creates the folder.
///
/// A file already at the path is left alone; [`prepare_target`] removes it
/// under the path lock right before the export runs. The returned path is
/// absolute and uses `/` separators.
pub fn resolve_export_path(
    config: &ExportConfig,
    file_name: Option<&str>,
    folder: Option<&str>,
) -> Result<String> {
    resolve_export_path_at(config, file_name, folder, unix_timestamp())
}

fn resolve_export_path_at(
    config: &ExportConfig,
    file_name: Option<&str>,
    folder: Option<&str>,
    timestamp: u64,
) -> Result<String> {
    let folder = non_blank(folder).unwrap_or_else(|| config.folder_or_default());
    let base = non_blank(file_name).unwrap_or(DEFAULT_FILE_NAME);

    let file_name = if config.add_timestamp {
        format!("{base}{timestamp}{CSV_EXTENSION}")
    } else {
        format!("{base}{CSV_EXTENSION}")
    };

    let dir = config.storage_root()?.join(folder);
    let path = dir.join(&file_name);

    if !dir.exists() {
        debug!("Creating export folder {}", dir.display());
        std::fs::create_dir_all(&dir).map_err(|e| {
            ExportError::io(format!("Cannot create folder {}: {e}", dir.display()))
        })?;
    }

    Ok(normalize_separators(&path))
}

/// Deletes a stale file at `path` and makes sure its folder exists.
///
/// Callers hold [`path_lock`] for `path` until the export has written it.
pub async fn prepare_target(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed existing export file {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(ExportError::io(format!(
                "Cannot remove existing file {}: {e}",
                path.display()
            )))
        }
    }

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            ExportError::io(format!("Cannot create folder {}: {e}", parent.display()))
        })?;
    }

    Ok(())
}

/// Returns `path` relative to `base`, the way it appears in the export log.
///
/// Paths outside `base` are returned whole.
pub fn relative_to(path: &str, base: &Path) -> String {
    let base = normalize_separators(base);
    let base = base.trim_end_matches('/');
    match path.strip_prefix(base) {
        Some(rest) if base.is_empty() || rest.is_empty() || rest.starts_with('/') => {
            rest.to_string()
        }
        _ => path.to_string(),
    }
}

static PATH_LOCKS: LazyLock<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Returns the lock serializing exports that write to `path`.
pub fn path_lock(path: &str) -> Arc<tokio::sync::Mutex<()>> {
    let mut locks = PATH_LOCKS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    // Drop locks nobody else holds so the map does not grow forever.
    locks.retain(|key, lock| key == path || Arc::strong_count(lock) > 1);
    locks.entry(path.to_string()).or_default().clone()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn normalize_separators(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
