//! Query representations accepted by the exporter.
//!
//! A query reaches the exporter either as raw SQL text, which must pass the
//! sanitizer, or as a structured query object implementing
//! [`StructuredQuery`].

mod bindings;
mod builder;
mod model;
mod sanitize;

pub use bindings::interpolate_bindings;
pub use builder::{Direction, SelectBuilder};
pub use model::{Model, ModelQuery};
pub use sanitize::check_for_sql_injection;

use crate::db::Value;

/// The kinds of structured query the exporter understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryShape {
    /// A plain table query builder.
    Builder,
    /// A model (object-relational) query.
    Model,
    /// Anything else; carries a description of the offending type.
    Unsupported(String),
}

impl QueryShape {
    /// Returns true for the shapes the exporter accepts.
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Builder | Self::Model)
    }
}

/// A query expressed as composable calls rather than literal SQL.
pub trait StructuredQuery: Send + Sync {
    /// Which supported shape this query is, if any.
    fn shape(&self) -> QueryShape;

    /// SQL skeleton with `?` placeholders.
    fn to_sql(&self) -> String;

    /// Values for the placeholders, in order.
    fn bindings(&self) -> Vec<Value>;

    /// SQL counting the rows this query matches; shares `bindings()`.
    fn count_sql(&self) -> String {
        format!(
            "select count(*) as aggregate from ({}) as count_query",
            self.to_sql()
        )
    }

    /// Name used in error messages.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
