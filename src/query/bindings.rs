//! Textual binding substitution for structured queries.

use crate::db::Value;

/// Replaces `?` placeholders in `sql` with `bindings`, left to right.
///
/// Numeric values are written bare, nulls as `NULL`, and everything else is
/// wrapped in single quotes without escaping, so the result is only as safe as the bindings
/// are trusted. Substituted text is not rescanned for placeholders.
/// Placeholders without a binding stay as they are; extra bindings are
/// ignored.
pub fn interpolate_bindings(sql: &str, bindings: &[Value]) -> String {
    let mut out = String::with_capacity(sql.len() + bindings.len() * 8);
    let mut values = bindings.iter();

    for c in sql.chars() {
        if c != '?' {
            out.push(c);
            continue;
        }
        match values.next() {
            Some(value) if value.is_numeric() => out.push_str(&value.to_display_string()),
            Some(Value::Null) => out.push_str("NULL"),
            Some(value) => {
                out.push('\'');
                out.push_str(&value.to_display_string());
                out.push('\'');
            }
            None => out.push('?'),
        }
    }

    out
}
