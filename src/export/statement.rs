//! Rewrites a SELECT into a MySQL `INTO OUTFILE` bulk-export statement.

/// CSV layout passed to the server's `FIELDS`/`LINES` clauses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvFormat {
    /// `FIELDS TERMINATED BY`.
    pub field_terminator: String,
    /// `OPTIONALLY ENCLOSED BY`.
    pub enclosure: char,
    /// `LINES TERMINATED BY`, written as a SQL escape sequence.
    pub line_terminator: String,
}

impl Default for CsvFormat {
    fn default() -> Self {
        Self {
            field_terminator: ",".to_string(),
            enclosure: '"',
            line_terminator: "\\n".to_string(),
        }
    }
}

/// Builds the export statement for `query`.
///
/// When `headers` is non-empty a synthetic header row is unioned ahead of
/// the result set, so it must have as many values as the query has columns.
pub fn build_outfile_statement(
    headers: &[String],
    query: &str,
    path: &str,
    format: &CsvFormat,
) -> String {
    let source = if headers.is_empty() {
        format!("    {query}")
    } else {
        let header_row = headers
            .iter()
            .map(|h| quote_literal(h))
            .collect::<Vec<_>>()
            .join(", ");
        format!("    SELECT {header_row}\n    UNION ALL\n    {query}")
    };

    format!(
        "SELECT * FROM (\n{source}\n) AS export\nINTO OUTFILE {path}\nFIELDS TERMINATED BY {fields}\nOPTIONALLY ENCLOSED BY {enclosure}\nLINES TERMINATED BY '{lines}'",
        path = quote_literal(path),
        fields = quote_literal(&format.field_terminator),
        enclosure = quote_literal(&format.enclosure.to_string()),
        lines = format.line_terminator,
    )
}

/// Wraps `query` so preparing it reports the projected columns without
/// producing rows.
pub fn probe_statement(query: &str) -> String {
    format!("SELECT * FROM (\n    {query}\n) AS probe LIMIT 0")
}

/// Quotes a value as a MySQL string literal.
fn quote_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\'' => out.push_str("''"),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}
