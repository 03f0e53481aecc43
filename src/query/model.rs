//! Model queries: a [`SelectBuilder`] bound to a model's table and scopes.

use std::marker::PhantomData;

use super::{Direction, QueryShape, SelectBuilder, StructuredQuery};
use crate::db::Value;

/// A database-backed model.
pub trait Model {
    /// Table holding the model's rows.
    const TABLE: &'static str;

    /// Whether deleted rows are kept and marked with a timestamp.
    const SOFT_DELETES: bool = false;

    /// Column holding the soft-delete timestamp.
    const DELETED_AT: &'static str = "deleted_at";
}

/// Query over a model's table.
///
/// Soft-deleted rows are excluded unless `with_trashed` is called.
pub struct ModelQuery<M: Model> {
    query: SelectBuilder,
    with_trashed: bool,
    // fn() -> M keeps the query Send + Sync whatever M is
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> ModelQuery<M> {
    /// Starts a query over all rows of `M`.
    pub fn new() -> Self {
        Self {
            query: SelectBuilder::table(M::TABLE),
            with_trashed: false,
            _model: PhantomData,
        }
    }

    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query = self.query.select(columns);
        self
    }

    pub fn where_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query = self.query.where_eq(column, value);
        self
    }

    pub fn where_op(
        mut self,
        column: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.query = self.query.where_op(column, operator, value);
        self
    }

    pub fn where_in<I, V>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.query = self.query.where_in(column, values);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.query = self.query.order_by(column, direction);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.query = self.query.limit(limit);
        self
    }

    /// Includes soft-deleted rows.
    pub fn with_trashed(mut self) -> Self {
        self.with_trashed = true;
        self
    }

    /// Applies a closure to the underlying builder for anything not exposed
    /// directly.
    pub fn tap(mut self, f: impl FnOnce(SelectBuilder) -> SelectBuilder) -> Self {
        self.query = f(self.query);
        self
    }

    /// The builder with model scopes applied.
    fn scoped(&self) -> SelectBuilder {
        if M::SOFT_DELETES && !self.with_trashed {
            self.query
                .clone()
                .where_null(format!("{}.{}", M::TABLE, M::DELETED_AT))
        } else {
            self.query.clone()
        }
    }
}

impl<M: Model> Default for ModelQuery<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> StructuredQuery for ModelQuery<M> {
    fn shape(&self) -> QueryShape {
        QueryShape::Model
    }

    fn to_sql(&self) -> String {
        self.scoped().to_sql()
    }

    fn bindings(&self) -> Vec<Value> {
        self.scoped().bindings()
    }

    fn count_sql(&self) -> String {
        self.scoped().count_sql()
    }
}
