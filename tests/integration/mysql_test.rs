//! MySQL integration tests.
//!
//! Need DATABASE_URL pointing at a MySQL or MariaDB server. The export test
//! also needs EXPORT_DIR, a directory the server is allowed to write to
//! (see `secure_file_priv`) and this process can read.

use std::path::PathBuf;
use std::sync::Arc;

use querycsv::config::ConnectionConfig;
use querycsv::db::{DatabaseClient, MySqlClient, Value};
use querycsv::{ExportConfig, ExportError, QueryToCsv};

/// Helper to get test database URL from environment.
fn get_test_database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok()
}

/// Helper to create a test client.
async fn get_test_client() -> Option<MySqlClient> {
    let url = get_test_database_url()?;
    let config = ConnectionConfig::from_connection_string(&url).ok()?;
    MySqlClient::connect(&config).await.ok()
}

#[tokio::test]
async fn test_probe_columns() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let columns = client
        .probe_columns(
            "SELECT * FROM (\n    SELECT 1 AS num, 'hello' AS greeting\n) AS probe LIMIT 0",
            &[],
        )
        .await
        .unwrap();

    assert_eq!(columns.len(), 2);
    assert_eq!(columns[0].name, "num");
    assert_eq!(columns[1].name, "greeting");

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_fetch_count_with_params() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let count = client
        .fetch_count(
            "SELECT COUNT(*) FROM (SELECT 1 AS n UNION ALL SELECT 2 UNION ALL SELECT 3) AS t WHERE n > ?",
            &[Value::Int(1)],
        )
        .await
        .unwrap();
    assert_eq!(count, 2);

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_union_column_mismatch_is_reported() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let err = client
        .execute_statement("SELECT 1 UNION ALL SELECT 1, 2", &[])
        .await
        .unwrap_err();
    assert!(err.to_string().to_lowercase().contains("cardinality"));

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_stacked_statements_are_refused() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let err = client
        .execute_statement("SELECT 1; SELECT 2", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, ExportError::Query(_)));

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_export_to_server_directory() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let Some(dir) = std::env::var("EXPORT_DIR").ok().map(PathBuf::from) else {
        eprintln!("Skipping test: EXPORT_DIR not set");
        return;
    };

    let config = ExportConfig {
        storage_root: Some(dir.clone()),
        base_path: Some(dir),
        add_timestamp: true,
        ..Default::default()
    };

    let path = QueryToCsv::from_raw_query(
        Arc::new(client),
        config,
        "SELECT 1 AS id, 'it''s' AS note UNION ALL SELECT 2, NULL",
    )
    .unwrap()
    .set_column_headers(["id", "note"])
    .as_file_path()
    .await
    .unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "\"id\",\"note\"");
    assert!(lines[1].contains("\"it's\""));
    assert!(lines[2].ends_with("\\N"));
}

#[tokio::test]
async fn test_connect_with_invalid_host() {
    let config = ConnectionConfig {
        host: Some("invalid.host.that.does.not.exist.local".to_string()),
        port: 3306,
        database: Some("testdb".to_string()),
        user: Some("testuser".to_string()),
        password: Some("testpass".to_string()),
    };

    let err = MySqlClient::connect(&config).await.unwrap_err();
    assert!(matches!(err, ExportError::Connection(_)));
}
