//! Mock database client for testing.
//!
//! Records every statement it receives and emulates `SELECT ... INTO OUTFILE`
//! by writing its configured rows to the target path the way MySQL does:
//! fields separated by `,`, enclosed in `"`, NULL written as `\N`.

use super::{ColumnInfo, DatabaseClient, Value};
use crate::error::{ExportError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::sync::{LazyLock, Mutex, MutexGuard};

static OUTFILE_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)INTO\s+OUTFILE\s+'((?:[^'\\]|\\.|'')*)'").expect("valid regex")
});

static STRING_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'((?:[^'\\]|\\.|'')*)'").expect("valid regex"));

/// A statement received by the mock, with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Debug, Default)]
struct MockState {
    columns: Vec<ColumnInfo>,
    rows: Vec<Vec<Value>>,
    count: u64,
    failure: Option<String>,
    statements: Vec<RecordedStatement>,
    counts: Vec<RecordedStatement>,
    probes: Vec<RecordedStatement>,
}

/// A mock database client that returns predefined results.
#[derive(Debug, Default)]
pub struct MockDatabaseClient {
    state: Mutex<MockState>,
}

impl MockDatabaseClient {
    /// Creates a new mock with no columns and no rows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock whose queries project `columns` and return `rows`.
    pub fn with_result(columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        let client = Self::new();
        {
            let mut state = client.lock();
            state.columns = columns
                .iter()
                .map(|name| ColumnInfo::new(*name, "VARCHAR"))
                .collect();
            state.count = rows.len() as u64;
            state.rows = rows;
        }
        client
    }

    /// Replaces the rows returned by subsequent exports.
    pub fn set_rows(&self, rows: Vec<Vec<Value>>) {
        let mut state = self.lock();
        state.count = rows.len() as u64;
        state.rows = rows;
    }

    /// Makes every subsequent statement fail with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        self.lock().failure = Some(message.into());
    }

    /// Statements passed to `execute_statement`, in order.
    pub fn statements(&self) -> Vec<RecordedStatement> {
        self.lock().statements.clone()
    }

    /// Queries passed to `fetch_count`, in order.
    pub fn count_queries(&self) -> Vec<RecordedStatement> {
        self.lock().counts.clone()
    }

    /// Queries passed to `probe_columns`, in order.
    pub fn probe_queries(&self) -> Vec<RecordedStatement> {
        self.lock().probes.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn execute_statement(&self, sql: &str, params: &[Value]) -> Result<()> {
        let mut state = self.lock();
        state.statements.push(RecordedStatement {
            sql: sql.to_string(),
            params: params.to_vec(),
        });

        if let Some(message) = &state.failure {
            return Err(ExportError::query(message.clone()));
        }

        let Some(target) = OUTFILE_TARGET.captures(sql).map(|c| unescape(&c[1])) else {
            return Ok(());
        };

        let header = header_row(sql);
        if let Some(header) = &header {
            if header.len() != state.columns.len() {
                return Err(ExportError::query(
                    "Cardinality violation: ERROR 1222 (21000): The used SELECT statements have a different number of columns",
                ));
            }
        }

        if std::path::Path::new(&target).exists() {
            return Err(ExportError::query(format!(
                "ERROR 1086 (HY000): File '{target}' already exists"
            )));
        }

        let mut content = String::new();
        if let Some(header) = header {
            let values: Vec<Value> = header.into_iter().map(Value::String).collect();
            content.push_str(&csv_line(&values));
        }
        for row in &state.rows {
            content.push_str(&csv_line(row));
        }

        std::fs::write(&target, content)
            .map_err(|e| ExportError::query(format!("Can't create/write to file '{target}': {e}")))
    }

    async fn fetch_count(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let mut state = self.lock();
        state.counts.push(RecordedStatement {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        Ok(state.count)
    }

    async fn probe_columns(&self, sql: &str, params: &[Value]) -> Result<Vec<ColumnInfo>> {
        let mut state = self.lock();
        state.probes.push(RecordedStatement {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        if let Some(message) = &state.failure {
            return Err(ExportError::query(message.clone()));
        }
        Ok(state.columns.clone())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Extracts the synthetic header row, i.e. the literals of the SELECT that
/// directly precedes the first `UNION ALL`.
fn header_row(sql: &str) -> Option<Vec<String>> {
    let (before_union, _) = sql.split_once("UNION ALL")?;
    let select_line = before_union.lines().rev().find(|l| !l.trim().is_empty())?;
    Some(
        STRING_LITERAL
            .captures_iter(select_line)
            .map(|c| unescape(&c[1]))
            .collect(),
    )
}

fn unescape(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    let mut chars = literal.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '\'' if chars.peek() == Some(&'\'') => {
                chars.next();
                out.push('\'');
            }
            _ => out.push(c),
        }
    }
    out
}

fn csv_line(values: &[Value]) -> String {
    let fields: Vec<String> = values
        .iter()
        .map(|value| match value {
            Value::Null => "\\N".to_string(),
            other => format!("\"{}\"", other.to_display_string().replace('"', "\\\"")),
        })
        .collect();
    format!("{}\n", fields.join(","))
}
