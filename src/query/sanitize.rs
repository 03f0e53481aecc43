//! Validation for raw export queries.
//!
//! Raw SQL is only accepted when it is a single SELECT statement. The checks
//! run on a lower-cased copy; the caller's text is returned untouched.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{ExportError, Result};

/// Leading keywords a raw export query may start with.
const ALLOWED_STATEMENTS: &[&str] = &["select"];

/// Character separating stacked statements.
const STATEMENT_SEPARATOR: char = ';';

/// Matches double- or single-quoted literals the way MySQL reads them: a
/// backslash escapes the next character and a doubled quote stands for
/// itself. Empty literals match too.
static QUOTED_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)"(?:\\.|""|[^"\\])*"|'(?:\\.|''|[^'\\])*'"#).expect("valid regex")
});

/// Checks that `sql` is a single SELECT statement and returns it unchanged.
///
/// Fails with `DisallowedStatement` when the first word is not `select`, and
/// with `MultipleStatements` when a `;` appears outside string literals.
pub fn check_for_sql_injection(sql: &str) -> Result<String> {
    let lowered = sql.trim().to_lowercase();
    let keyword = lowered.split_whitespace().next().unwrap_or_default();

    if !ALLOWED_STATEMENTS.contains(&keyword) {
        return Err(ExportError::disallowed_statement(keyword));
    }

    let without_literals = QUOTED_LITERAL.replace_all(&lowered, "");
    if without_literals.contains(STATEMENT_SEPARATOR) {
        return Err(ExportError::MultipleStatements);
    }

    Ok(sql.to_string())
}
