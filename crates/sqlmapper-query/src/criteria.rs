//! Compiled query and update criteria handed to mappers.

use crate::clause::{Limit, OrderBy};
use crate::expr::Expr;
use sqlmapper_core::Value;

/// WHERE predicate under construction.
///
/// Conditions are joined with AND unless [`Predicate::or_next`] was called
/// right before, in which case the next condition is joined with OR.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    expr: Option<Expr>,
    next_or: bool,
}

impl Predicate {
    /// Append a condition.
    pub fn push(&mut self, condition: Expr) {
        self.expr = Some(match self.expr.take() {
            None => condition,
            Some(prev) if self.next_or => prev.or(condition),
            Some(prev) => prev.and(condition),
        });
        self.next_or = false;
    }

    /// Join the next condition with OR.
    pub fn or_next(&mut self) {
        self.next_or = self.expr.is_some();
    }

    pub fn expr(&self) -> Option<&Expr> {
        self.expr.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.expr.is_none()
    }
}

/// Select criteria: projection, predicate, ordering and row window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    /// Selected columns; empty selects every mapped column
    pub select: Vec<String>,
    pub predicate: Predicate,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// The WHERE expression, if any condition was added.
    pub fn where_expr(&self) -> Option<&Expr> {
        self.predicate.expr()
    }

    /// LIMIT/OFFSET to render, if any.
    ///
    /// An offset without a limit renders as an unbounded window.
    pub fn window(&self) -> Option<Limit> {
        match (self.limit, self.offset) {
            (None, None) => None,
            (limit, offset) => Some(Limit {
                limit: limit.unwrap_or(i64::MAX as u64),
                offset: offset.unwrap_or(0),
            }),
        }
    }

    /// Copy of these criteria restricted to one page window.
    pub fn paged(&self, limit: u64, offset: u64) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(offset),
            ..self.clone()
        }
    }

    /// Copy of these criteria suited to a COUNT query.
    pub fn for_count(&self) -> Self {
        Self {
            predicate: self.predicate.clone(),
            ..Self::default()
        }
    }
}

/// Update criteria: SET assignments plus the WHERE criteria.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateCriteria {
    pub assignments: Vec<(String, Value)>,
    pub criteria: Criteria,
}

impl UpdateCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an assignment.
    pub fn assign(&mut self, column: impl Into<String>, value: Value) {
        let column = column.into();
        match self.assignments.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.assignments.push((column, value)),
        }
    }
}
