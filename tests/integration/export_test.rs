//! End-to-end export tests against the mock database.

use std::io::Write;
use std::sync::{Arc, Mutex};

use querycsv::db::{MockDatabaseClient, Value};
use querycsv::{ExportConfig, ExportError, ModelQuery, Model, QueryToCsv, SelectBuilder};
use tempfile::{tempdir, TempDir};

struct Order;

impl Model for Order {
    const TABLE: &'static str = "orders";
}

fn orders() -> Arc<MockDatabaseClient> {
    Arc::new(MockDatabaseClient::with_result(
        &["id", "total", "note"],
        vec![
            vec![Value::Int(1), Value::Float(9.5), Value::from("gift")],
            vec![Value::Int(2), Value::Float(12.0), Value::Null],
            vec![Value::Int(3), Value::Float(3.25), Value::from("rush")],
        ],
    ))
}

fn config_in(dir: &TempDir) -> ExportConfig {
    ExportConfig {
        storage_root: Some(dir.path().join("storage")),
        base_path: Some(dir.path().to_path_buf()),
        add_timestamp: false,
        ..Default::default()
    }
}

/// Collects formatted log output for the current thread.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (buffer, guard)
}

#[tokio::test]
async fn test_header_row_precedes_data() {
    let dir = tempdir().unwrap();
    let client = orders();

    let path = QueryToCsv::from_raw_query(client, config_in(&dir), "select id, total, note from orders")
        .unwrap()
        .set_output_file(Some("orders"), Some("reports"))
        .unwrap()
        .set_column_headers(["Order", "Total", "Note"])
        .as_file_path()
        .await
        .unwrap();

    assert!(path.ends_with("/storage/reports/orders.csv"));
    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "\"Order\",\"Total\",\"Note\"");
    assert_eq!(lines[2], "\"2\",\"12\",\\N");
}

#[tokio::test]
async fn test_builder_export_with_download() {
    let dir = tempdir().unwrap();
    let client = orders();
    let query = SelectBuilder::table("orders")
        .select(["id", "total", "note"])
        .where_op("total", ">", 1);

    let download = QueryToCsv::from_builder(client.clone(), config_in(&dir), &query)
        .await
        .unwrap()
        .set_output_file(Some("big-orders"), None)
        .unwrap()
        .as_download()
        .await
        .unwrap();

    assert_eq!(download.file_name, "big-orders.csv");
    assert_eq!(download.content_type, "text/csv");
    assert!(download.size().await.unwrap() > 0);

    let statement = &client.statements()[0].sql;
    assert!(statement.contains("where `total` > 1"));
    assert!(statement.contains("INTO OUTFILE"));
}

#[tokio::test]
async fn test_model_query_export() {
    let dir = tempdir().unwrap();
    let client = orders();
    let query = ModelQuery::<Order>::new().select(["id", "total", "note"]);

    let export = QueryToCsv::from_builder(client, config_in(&dir), &query)
        .await
        .unwrap()
        .generate()
        .await
        .unwrap();

    assert_eq!(export.row_count(), Some(3));
    assert!(export.export_file_path().unwrap().ends_with("/csvexport/sheetfile.csv"));
}

#[tokio::test]
async fn test_timing_and_row_count_logged_for_builder_exports() {
    let dir = tempdir().unwrap();
    let (logs, _guard) = capture_logs();

    QueryToCsv::from_builder(orders(), config_in(&dir), &SelectBuilder::table("orders"))
        .await
        .unwrap()
        .set_output_file(Some("all"), None)
        .unwrap()
        .generate()
        .await
        .unwrap();

    let output = logs.contents();
    assert!(output.contains("Export Execution Time :"));
    assert!(output.contains("| File : /storage/csvexport/all.csv"));
    assert!(output.contains("| Row Count : 3"));
}

#[tokio::test]
async fn test_raw_exports_log_no_row_count() {
    let dir = tempdir().unwrap();
    let (logs, _guard) = capture_logs();

    QueryToCsv::from_raw_query(orders(), config_in(&dir), "select * from orders")
        .unwrap()
        .generate()
        .await
        .unwrap();

    let output = logs.contents();
    assert!(output.contains("Export Execution Time :"));
    assert!(!output.contains("Row Count"));
}

#[tokio::test]
async fn test_nothing_logged_when_logging_disabled() {
    let dir = tempdir().unwrap();
    let (logs, _guard) = capture_logs();
    let config = ExportConfig {
        enable_logging: false,
        ..config_in(&dir)
    };
    let client = orders();

    QueryToCsv::from_builder(client.clone(), config, &SelectBuilder::table("orders"))
        .await
        .unwrap()
        .generate()
        .await
        .unwrap();

    assert!(!logs.contents().contains("Export Execution Time"));
    assert!(client.count_queries().is_empty());
}

#[tokio::test]
async fn test_rejected_raw_queries_never_reach_database() {
    let dir = tempdir().unwrap();
    let client = orders();

    for sql in ["drop table orders", "select 1; delete from orders", "  UPDATE orders SET x = 1"] {
        let result = QueryToCsv::from_raw_query(client.clone(), config_in(&dir), sql);
        assert!(result.is_err(), "accepted: {sql}");
        assert!(result.unwrap_err().is_validation());
    }
    assert!(client.statements().is_empty());
    assert!(client.probe_queries().is_empty());
}

#[tokio::test]
async fn test_header_mismatch_reported() {
    let dir = tempdir().unwrap();

    let err = QueryToCsv::from_raw_query(orders(), config_in(&dir), "select * from orders")
        .unwrap()
        .set_column_headers(["only", "two"])
        .generate()
        .await
        .unwrap_err();

    assert!(matches!(err, ExportError::ColumnCardinalityMismatch { .. }));
    assert_eq!(err.category(), "Column Count Mismatch");
}

#[tokio::test]
async fn test_repeated_export_replaces_file() {
    let dir = tempdir().unwrap();
    let client = orders();

    for _ in 0..2 {
        QueryToCsv::from_raw_query(client.clone(), config_in(&dir), "select * from orders")
            .unwrap()
            .set_output_file(Some("same"), None)
            .unwrap()
            .generate()
            .await
            .unwrap();
    }

    client.set_rows(vec![vec![Value::Int(7), Value::Float(1.0), Value::from("x")]]);
    let path = QueryToCsv::from_raw_query(client.clone(), config_in(&dir), "select * from orders")
        .unwrap()
        .set_output_file(Some("same"), None)
        .unwrap()
        .as_file_path()
        .await
        .unwrap();

    let content = std::fs::read_to_string(path).unwrap();
    assert_eq!(content.lines().count(), 2);
    assert!(content.contains("\"7\""));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_exports_to_same_path() {
    let dir = tempdir().unwrap();
    let client = orders();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let client = client.clone();
        let config = config_in(&dir);
        handles.push(tokio::spawn(async move {
            QueryToCsv::from_raw_query(client, config, "select * from orders")?
                .set_output_file(Some("shared"), None)?
                .as_file_path()
                .await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let content = std::fs::read_to_string(dir.path().join("storage/csvexport/shared.csv")).unwrap();
    assert_eq!(content.lines().count(), 4);
}
