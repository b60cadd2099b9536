//! Fluent condition wrappers.
//!
//! A wrapper accumulates conditions for one entity type and compiles into a
//! [`Criteria`] (or [`UpdateCriteria`]) that is handed to a mapper unchanged.
//! Two flavours exist per wrapper:
//!
//! - string columns: `QueryWrapper<User>` accepts `"name"`, checked when the
//!   statement is rendered
//! - typed columns: `LambdaQueryWrapper<User>` accepts only `Field<User>`
//!   constants such as `User::NAME`, checked at compile time
//!
//! The builder methods live on the [`Conditions`], [`QueryClauses`] and
//! [`Assignments`] traits so the chain builders share them.

use std::fmt;
use std::marker::PhantomData;

use crate::clause::OrderBy;
use crate::criteria::{Criteria, UpdateCriteria};
use crate::expr::Expr;
use sqlmapper_core::{Field, Value};

/// Anything that names a column.
pub trait ColumnRef {
    fn column_name(&self) -> &str;
}

impl ColumnRef for String {
    fn column_name(&self) -> &str {
        self
    }
}

impl<M> ColumnRef for Field<M> {
    fn column_name(&self) -> &str {
        self.column()
    }
}

fn column_expr<C: ColumnRef>(column: impl Into<C>) -> Expr {
    let column: C = column.into();
    Expr::col(column.column_name())
}

/// WHERE-condition builder methods.
pub trait Conditions: Sized {
    /// Column type accepted by this builder.
    type Column: ColumnRef;

    /// The criteria conditions are added to.
    fn criteria_mut(&mut self) -> &mut Criteria;

    /// Add an arbitrary condition expression.
    fn filter(mut self, condition: Expr) -> Self {
        self.criteria_mut().predicate.push(condition);
        self
    }

    /// Join the next condition with OR instead of AND.
    fn or(mut self) -> Self {
        self.criteria_mut().predicate.or_next();
        self
    }

    /// `column = value`
    fn eq(self, column: impl Into<Self::Column>, value: impl Into<Value>) -> Self {
        self.filter(column_expr::<Self::Column>(column).eq(Expr::lit(value)))
    }

    /// `column <> value`
    fn ne(self, column: impl Into<Self::Column>, value: impl Into<Value>) -> Self {
        self.filter(column_expr::<Self::Column>(column).ne(Expr::lit(value)))
    }

    /// `column > value`
    fn gt(self, column: impl Into<Self::Column>, value: impl Into<Value>) -> Self {
        self.filter(column_expr::<Self::Column>(column).gt(Expr::lit(value)))
    }

    /// `column >= value`
    fn ge(self, column: impl Into<Self::Column>, value: impl Into<Value>) -> Self {
        self.filter(column_expr::<Self::Column>(column).ge(Expr::lit(value)))
    }

    /// `column < value`
    fn lt(self, column: impl Into<Self::Column>, value: impl Into<Value>) -> Self {
        self.filter(column_expr::<Self::Column>(column).lt(Expr::lit(value)))
    }

    /// `column <= value`
    fn le(self, column: impl Into<Self::Column>, value: impl Into<Value>) -> Self {
        self.filter(column_expr::<Self::Column>(column).le(Expr::lit(value)))
    }

    /// `column LIKE '%value%'`
    fn like(self, column: impl Into<Self::Column>, value: impl fmt::Display) -> Self {
        self.filter(column_expr::<Self::Column>(column).like(format!("%{value}%")))
    }

    /// `column NOT LIKE '%value%'`
    fn not_like(self, column: impl Into<Self::Column>, value: impl fmt::Display) -> Self {
        self.filter(column_expr::<Self::Column>(column).not_like(format!("%{value}%")))
    }

    /// `column LIKE '%value'`
    fn like_left(self, column: impl Into<Self::Column>, value: impl fmt::Display) -> Self {
        self.filter(column_expr::<Self::Column>(column).like(format!("%{value}")))
    }

    /// `column LIKE 'value%'`
    fn like_right(self, column: impl Into<Self::Column>, value: impl fmt::Display) -> Self {
        self.filter(column_expr::<Self::Column>(column).like(format!("{value}%")))
    }

    /// `column IN (values...)`; an empty list matches nothing.
    fn in_list<I>(self, column: impl Into<Self::Column>, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let values = values.into_iter().map(Expr::lit).collect();
        self.filter(column_expr::<Self::Column>(column).in_list(values))
    }

    /// `column NOT IN (values...)`; an empty list matches everything.
    fn not_in<I>(self, column: impl Into<Self::Column>, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let values = values.into_iter().map(Expr::lit).collect();
        self.filter(column_expr::<Self::Column>(column).not_in(values))
    }

    /// `column IS NULL`
    fn is_null(self, column: impl Into<Self::Column>) -> Self {
        self.filter(column_expr::<Self::Column>(column).is_null())
    }

    /// `column IS NOT NULL`
    fn is_not_null(self, column: impl Into<Self::Column>) -> Self {
        self.filter(column_expr::<Self::Column>(column).is_not_null())
    }

    /// `column BETWEEN low AND high`
    fn between(
        self,
        column: impl Into<Self::Column>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.filter(column_expr::<Self::Column>(column).between(Expr::lit(low), Expr::lit(high)))
    }
}

/// Projection, ordering and row-limit methods of query builders.
pub trait QueryClauses: Conditions {
    /// Restrict the selected columns.
    fn select<I>(mut self, columns: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Self::Column>,
    {
        let criteria = self.criteria_mut();
        for column in columns {
            let column: Self::Column = column.into();
            criteria.select.push(column.column_name().to_string());
        }
        self
    }

    fn order_by_asc(mut self, column: impl Into<Self::Column>) -> Self {
        let column: Self::Column = column.into();
        self.criteria_mut()
            .order_by
            .push(OrderBy::asc(column.column_name()));
        self
    }

    fn order_by_desc(mut self, column: impl Into<Self::Column>) -> Self {
        let column: Self::Column = column.into();
        self.criteria_mut()
            .order_by
            .push(OrderBy::desc(column.column_name()));
        self
    }

    /// Return at most `n` rows.
    fn limit(mut self, n: u64) -> Self {
        self.criteria_mut().limit = Some(n);
        self
    }
}

/// SET-assignment methods of update builders.
pub trait Assignments: Conditions {
    fn update_mut(&mut self) -> &mut UpdateCriteria;

    /// `SET column = value`
    fn set(mut self, column: impl Into<Self::Column>, value: impl Into<Value>) -> Self {
        let column: Self::Column = column.into();
        self.update_mut().assign(column.column_name(), value.into());
        self
    }

    /// `SET column = NULL`
    fn set_null(self, column: impl Into<Self::Column>) -> Self {
        self.set(column, Value::Null)
    }
}

/// Query conditions for entity `M`, with string column names by default.
pub struct QueryWrapper<M, C = String> {
    criteria: Criteria,
    _marker: PhantomData<fn() -> (M, C)>,
}

/// Query conditions for entity `M` that only accept `Field<M>` columns.
pub type LambdaQueryWrapper<M> = QueryWrapper<M, Field<M>>;

impl<M, C> QueryWrapper<M, C> {
    pub fn new() -> Self {
        Self {
            criteria: Criteria::new(),
            _marker: PhantomData,
        }
    }

    pub fn criteria(&self) -> &Criteria {
        &self.criteria
    }

    pub fn into_criteria(self) -> Criteria {
        self.criteria
    }
}

impl<M, C> Default for QueryWrapper<M, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M, C> Clone for QueryWrapper<M, C> {
    fn clone(&self) -> Self {
        Self {
            criteria: self.criteria.clone(),
            _marker: PhantomData,
        }
    }
}

impl<M, C> fmt::Debug for QueryWrapper<M, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryWrapper")
            .field("entity", &std::any::type_name::<M>())
            .field("criteria", &self.criteria)
            .finish()
    }
}

impl<M, C: ColumnRef> Conditions for QueryWrapper<M, C> {
    type Column = C;

    fn criteria_mut(&mut self) -> &mut Criteria {
        &mut self.criteria
    }
}

impl<M, C: ColumnRef> QueryClauses for QueryWrapper<M, C> {}

/// Update assignments and conditions for entity `M`.
pub struct UpdateWrapper<M, C = String> {
    update: UpdateCriteria,
    _marker: PhantomData<fn() -> (M, C)>,
}

/// Update wrapper that only accepts `Field<M>` columns.
pub type LambdaUpdateWrapper<M> = UpdateWrapper<M, Field<M>>;

impl<M, C> UpdateWrapper<M, C> {
    pub fn new() -> Self {
        Self {
            update: UpdateCriteria::new(),
            _marker: PhantomData,
        }
    }

    pub fn update_criteria(&self) -> &UpdateCriteria {
        &self.update
    }

    /// The WHERE criteria alone, as used by deletes.
    pub fn criteria(&self) -> &Criteria {
        &self.update.criteria
    }

    pub fn into_update_criteria(self) -> UpdateCriteria {
        self.update
    }
}

impl<M, C> Default for UpdateWrapper<M, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M, C> Clone for UpdateWrapper<M, C> {
    fn clone(&self) -> Self {
        Self {
            update: self.update.clone(),
            _marker: PhantomData,
        }
    }
}

impl<M, C> fmt::Debug for UpdateWrapper<M, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateWrapper")
            .field("entity", &std::any::type_name::<M>())
            .field("update", &self.update)
            .finish()
    }
}

impl<M, C: ColumnRef> Conditions for UpdateWrapper<M, C> {
    type Column = C;

    fn criteria_mut(&mut self) -> &mut Criteria {
        &mut self.update.criteria
    }
}

impl<M, C: ColumnRef> Assignments for UpdateWrapper<M, C> {
    fn update_mut(&mut self) -> &mut UpdateCriteria {
        &mut self.update
    }
}
