//! SQL rendering for mapper statements.
//!
//! Every statement is rendered from a table's metadata plus either an entity
//! row or a [`Criteria`]. The result is a `(sql, params)` pair ready for a
//! [`Connection`](sqlmapper_core::Connection).

use crate::criteria::{Criteria, UpdateCriteria};
use sqlmapper_core::{Dialect, Error, QueryErrorKind, Result, TableMetadata, Value, check_column};

/// Renders statements for one table in one dialect.
#[derive(Debug, Clone, Copy)]
pub struct StatementBuilder<'a> {
    meta: &'a TableMetadata,
    dialect: Dialect,
}

impl<'a> StatementBuilder<'a> {
    pub fn new(meta: &'a TableMetadata, dialect: Dialect) -> Self {
        Self { meta, dialect }
    }

    fn table(&self) -> String {
        self.dialect.quote_identifier(self.meta.table_name)
    }

    fn quote(&self, column: &str) -> String {
        self.dialect.quote_identifier(column)
    }

    fn is_generated(&self, column: &str) -> bool {
        self.meta
            .columns
            .iter()
            .any(|f| f.column_name == column && f.auto_increment)
    }

    /// Columns an INSERT of `row` writes.
    ///
    /// Generated columns are left out while their value is unset so the
    /// database assigns them.
    pub fn insert_columns(&self, row: &[(&'static str, Value)]) -> Vec<&'static str> {
        row.iter()
            .filter(|(column, value)| !(self.is_generated(column) && value.is_unset_key()))
            .map(|(column, _)| *column)
            .collect()
    }

    /// `INSERT INTO t (c1, c2) VALUES (?1, ?2)` for the given columns.
    pub fn insert_sql(&self, columns: &[&str]) -> String {
        let names: Vec<_> = columns.iter().map(|c| self.quote(c)).collect();
        let placeholders: Vec<_> = (1..=columns.len())
            .map(|i| self.dialect.placeholder(i))
            .collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table(),
            names.join(", "),
            placeholders.join(", ")
        )
    }

    /// Parameter values of `row` for the given column list.
    pub fn values_for(columns: &[&str], row: &[(&'static str, Value)]) -> Vec<Value> {
        columns
            .iter()
            .map(|column| {
                row.iter()
                    .find(|(c, _)| c == column)
                    .map_or(Value::Null, |(_, v)| v.clone())
            })
            .collect()
    }

    /// INSERT of one entity row.
    pub fn insert(&self, row: &[(&'static str, Value)]) -> (String, Vec<Value>) {
        let columns = self.insert_columns(row);
        let params = Self::values_for(&columns, row);
        (self.insert_sql(&columns), params)
    }

    /// UPDATE of one entity row by primary key.
    ///
    /// NULL fields are left untouched. Returns `None` when no column would
    /// be written.
    pub fn update_by_id(
        &self,
        row: &[(&'static str, Value)],
        id: &Value,
    ) -> Option<(String, Vec<Value>)> {
        let mut params = Vec::new();
        let mut sets = Vec::new();
        for (column, value) in row {
            if *column == self.meta.primary_key || value.is_null() {
                continue;
            }
            params.push(value.clone());
            sets.push(format!(
                "{} = {}",
                self.quote(column),
                self.dialect.placeholder(params.len())
            ));
        }
        if sets.is_empty() {
            return None;
        }
        params.push(id.clone());
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = {}",
            self.table(),
            sets.join(", "),
            self.quote(self.meta.primary_key),
            self.dialect.placeholder(params.len())
        );
        Some((sql, params))
    }

    /// UPDATE by criteria.
    ///
    /// SET values come from the non-NULL, non-key fields of `row` (if given)
    /// followed by the explicit assignments, which win on conflict.
    #[allow(clippy::result_large_err)]
    pub fn update(
        &self,
        row: Option<&[(&'static str, Value)]>,
        update: &UpdateCriteria,
    ) -> Result<(String, Vec<Value>)> {
        let mut assignments: Vec<(&str, &Value)> = Vec::new();
        for (column, value) in row.unwrap_or_default() {
            let overridden = update.assignments.iter().any(|(c, _)| c.as_str() == *column);
            if *column != self.meta.primary_key && !value.is_null() && !overridden {
                assignments.push((*column, value));
            }
        }
        for (column, value) in &update.assignments {
            check_column(column)?;
            assignments.push((column.as_str(), value));
        }
        if assignments.is_empty() {
            return Err(Error::query(
                QueryErrorKind::Syntax,
                None,
                format!("update of {} has no columns to set", self.meta.table_name),
            ));
        }

        let mut params = Vec::new();
        let mut sets = Vec::new();
        for (column, value) in assignments {
            params.push(value.clone());
            sets.push(format!(
                "{} = {}",
                self.quote(column),
                self.dialect.placeholder(params.len())
            ));
        }
        let mut sql = format!("UPDATE {} SET {}", self.table(), sets.join(", "));
        sql.push_str(&self.where_clause(&update.criteria, &mut params)?);
        Ok((sql, params))
    }

    pub fn delete_by_id(&self, id: &Value) -> (String, Vec<Value>) {
        let sql = format!(
            "DELETE FROM {} WHERE {} = {}",
            self.table(),
            self.quote(self.meta.primary_key),
            self.dialect.placeholder(1)
        );
        (sql, vec![id.clone()])
    }

    pub fn delete_batch_ids(&self, ids: &[Value]) -> (String, Vec<Value>) {
        let sql = format!(
            "DELETE FROM {} WHERE {} IN ({})",
            self.table(),
            self.quote(self.meta.primary_key),
            self.placeholders(ids.len())
        );
        (sql, ids.to_vec())
    }

    #[allow(clippy::result_large_err)]
    pub fn delete(&self, criteria: &Criteria) -> Result<(String, Vec<Value>)> {
        let mut params = Vec::new();
        let mut sql = format!("DELETE FROM {}", self.table());
        sql.push_str(&self.where_clause(criteria, &mut params)?);
        Ok((sql, params))
    }

    pub fn select_by_id(&self, id: &Value) -> (String, Vec<Value>) {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = {}",
            self.all_columns(),
            self.table(),
            self.quote(self.meta.primary_key),
            self.dialect.placeholder(1)
        );
        (sql, vec![id.clone()])
    }

    pub fn select_batch_ids(&self, ids: &[Value]) -> (String, Vec<Value>) {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} IN ({})",
            self.all_columns(),
            self.table(),
            self.quote(self.meta.primary_key),
            self.placeholders(ids.len())
        );
        (sql, ids.to_vec())
    }

    /// SELECT by criteria: projection, WHERE, ORDER BY, LIMIT/OFFSET.
    #[allow(clippy::result_large_err)]
    pub fn select(&self, criteria: &Criteria) -> Result<(String, Vec<Value>)> {
        let projection = if criteria.select.is_empty() {
            self.all_columns()
        } else {
            let mut columns = Vec::with_capacity(criteria.select.len());
            for column in &criteria.select {
                check_column(column)?;
                columns.push(self.quote(column));
            }
            columns.join(", ")
        };

        let mut params = Vec::new();
        let mut sql = format!("SELECT {} FROM {}", projection, self.table());
        sql.push_str(&self.where_clause(criteria, &mut params)?);
        if !criteria.order_by.is_empty() {
            let terms = criteria
                .order_by
                .iter()
                .map(|o| o.to_sql(self.dialect))
                .collect::<Result<Vec<_>>>()?;
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }
        if let Some(window) = criteria.window() {
            sql.push(' ');
            sql.push_str(&window.to_sql());
        }
        Ok((sql, params))
    }

    /// `SELECT COUNT(*)` over the criteria's WHERE clause.
    #[allow(clippy::result_large_err)]
    pub fn count(&self, criteria: &Criteria) -> Result<(String, Vec<Value>)> {
        let mut params = Vec::new();
        let mut sql = format!("SELECT COUNT(*) FROM {}", self.table());
        sql.push_str(&self.where_clause(criteria, &mut params)?);
        Ok((sql, params))
    }

    fn all_columns(&self) -> String {
        self.meta
            .column_names()
            .map(|c| self.quote(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn placeholders(&self, n: usize) -> String {
        (1..=n)
            .map(|i| self.dialect.placeholder(i))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn where_clause(&self, criteria: &Criteria, params: &mut Vec<Value>) -> Result<String> {
        match criteria.where_expr() {
            Some(expr) => {
                let offset = params.len();
                let mut where_params = Vec::new();
                let sql = expr.build_with_dialect(self.dialect, &mut where_params, offset)?;
                params.extend(where_params);
                Ok(format!(" WHERE {sql}"))
            }
            None => Ok(String::new()),
        }
    }
}
