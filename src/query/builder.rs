//! A small SELECT query builder.
//!
//! Produces MySQL SQL with backtick-quoted identifiers and `?` placeholders,
//! keeping the bound values separately.

use super::{QueryShape, StructuredQuery};
use crate::db::Value;

/// Sort direction for `order by`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Compare {
        column: String,
        operator: String,
        value: Value,
    },
    In {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },
    Null {
        column: String,
        negated: bool,
    },
    Raw {
        sql: String,
        bindings: Vec<Value>,
    },
}

/// Builder for single-table SELECT queries.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectBuilder {
    table: String,
    columns: Vec<String>,
    conditions: Vec<Condition>,
    orders: Vec<(String, Direction)>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl SelectBuilder {
    /// Starts a query against `table`.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            conditions: Vec::new(),
            orders: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Sets the projected columns. `column as alias` is supported.
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Adds `column = value`.
    pub fn where_eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.where_op(column, "=", value)
    }

    /// Adds `column <operator> value`.
    pub fn where_op(
        mut self,
        column: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.conditions.push(Condition::Compare {
            column: column.into(),
            operator: operator.into(),
            value: value.into(),
        });
        self
    }

    /// Adds `column in (...)`.
    pub fn where_in<I, V>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.conditions.push(Condition::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        });
        self
    }

    /// Adds `column not in (...)`.
    pub fn where_not_in<I, V>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.conditions.push(Condition::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        });
        self
    }

    /// Adds `column is null`.
    pub fn where_null(mut self, column: impl Into<String>) -> Self {
        self.conditions.push(Condition::Null {
            column: column.into(),
            negated: false,
        });
        self
    }

    /// Adds `column is not null`.
    pub fn where_not_null(mut self, column: impl Into<String>) -> Self {
        self.conditions.push(Condition::Null {
            column: column.into(),
            negated: true,
        });
        self
    }

    /// Adds a raw condition with its own placeholders.
    pub fn where_raw<I, V>(mut self, sql: impl Into<String>, bindings: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.conditions.push(Condition::Raw {
            sql: sql.into(),
            bindings: bindings.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Appends an `order by` term.
    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.orders.push((column.into(), direction));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    fn compile_columns(&self) -> String {
        if self.columns.is_empty() {
            return "*".to_string();
        }
        self.columns
            .iter()
            .map(|c| wrap(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn compile_wheres(&self) -> String {
        if self.conditions.is_empty() {
            return String::new();
        }

        let clauses: Vec<String> = self
            .conditions
            .iter()
            .map(|condition| match condition {
                Condition::Compare {
                    column, operator, ..
                } => format!("{} {} ?", wrap(column), operator),
                Condition::In {
                    values, negated, ..
                } if values.is_empty() => {
                    if *negated {
                        "1 = 1".to_string()
                    } else {
                        "0 = 1".to_string()
                    }
                }
                Condition::In {
                    column,
                    values,
                    negated,
                } => format!(
                    "{} {}in ({})",
                    wrap(column),
                    if *negated { "not " } else { "" },
                    vec!["?"; values.len()].join(", ")
                ),
                Condition::Null { column, negated } => format!(
                    "{} is {}null",
                    wrap(column),
                    if *negated { "not " } else { "" }
                ),
                Condition::Raw { sql, .. } => sql.clone(),
            })
            .collect();

        format!(" where {}", clauses.join(" and "))
    }

    fn compile_tail(&self) -> String {
        let mut sql = String::new();
        if !self.orders.is_empty() {
            let terms: Vec<String> = self
                .orders
                .iter()
                .map(|(column, direction)| format!("{} {}", wrap(column), direction.as_sql()))
                .collect();
            sql.push_str(" order by ");
            sql.push_str(&terms.join(", "));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" limit {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" offset {offset}"));
        }
        sql
    }
}

impl StructuredQuery for SelectBuilder {
    fn shape(&self) -> QueryShape {
        QueryShape::Builder
    }

    fn to_sql(&self) -> String {
        format!(
            "select {} from {}{}{}",
            self.compile_columns(),
            wrap(&self.table),
            self.compile_wheres(),
            self.compile_tail()
        )
    }

    fn bindings(&self) -> Vec<Value> {
        let mut bindings = Vec::new();
        for condition in &self.conditions {
            match condition {
                Condition::Compare { value, .. } => bindings.push(value.clone()),
                Condition::In { values, .. } => bindings.extend(values.iter().cloned()),
                Condition::Null { .. } => {}
                Condition::Raw { bindings: raw, .. } => bindings.extend(raw.iter().cloned()),
            }
        }
        bindings
    }

    fn count_sql(&self) -> String {
        // Ordering is irrelevant to a count; a limit or offset changes it, so
        // those queries are counted as a subquery.
        if self.limit.is_some() || self.offset.is_some() {
            return format!(
                "select count(*) as aggregate from ({}) as count_query",
                self.to_sql()
            );
        }
        format!(
            "select count(*) as aggregate from {}{}",
            wrap(&self.table),
            self.compile_wheres()
        )
    }
}

/// Quotes an identifier with backticks, handling `a.b`, `*` and
/// `expr as alias`.
fn wrap(identifier: &str) -> String {
    let lowered = identifier.to_ascii_lowercase();
    if let Some(pos) = lowered.find(" as ") {
        let (name, alias) = (&identifier[..pos], &identifier[pos + 4..]);
        return format!("{} as {}", wrap(name.trim()), wrap_segment(alias.trim()));
    }

    identifier
        .split('.')
        .map(wrap_segment)
        .collect::<Vec<_>>()
        .join(".")
}

fn wrap_segment(segment: &str) -> String {
    if segment == "*" {
        return segment.to_string();
    }
    format!("`{}`", segment.replace('`', "``"))
}
