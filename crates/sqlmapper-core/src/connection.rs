//! Database connection trait and SQL dialects.
//!
//! - [`Connection`] - blocking statement execution and transaction control
//! - [`Dialect`] - placeholder and identifier-quoting rules per backend
//!
//! Connections are used from a single session at a time; every call blocks
//! the caller's thread until the database answers.

use crate::error::Result;
use crate::identifiers::{quote_ident, quote_ident_mysql};
use crate::row::Row;
use crate::value::Value;

/// SQL dialect for generating database-specific SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// PostgreSQL dialect (uses $1, $2 placeholders)
    #[default]
    Postgres,
    /// SQLite dialect (uses ?1, ?2 placeholders)
    Sqlite,
    /// MySQL dialect (uses ? placeholders)
    Mysql,
}

impl Dialect {
    /// Generate a placeholder for the given parameter index (1-based).
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Sqlite => format!("?{index}"),
            Dialect::Mysql => "?".to_string(),
        }
    }

    /// Quote an identifier for this dialect.
    pub fn quote_identifier(self, name: &str) -> String {
        match self {
            Dialect::Postgres | Dialect::Sqlite => quote_ident(name),
            Dialect::Mysql => quote_ident_mysql(name),
        }
    }
}

/// Result of one INSERT execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inserted {
    /// Rows the statement inserted, as reported by the backend.
    pub changes: u64,
    /// Row id the backend generated. Only meaningful when `changes > 0`.
    pub id: i64,
}

/// A database connection capable of executing statements.
///
/// # Example
///
/// ```rust,ignore
/// let rows = conn.query("SELECT * FROM users WHERE id = ?1", &[Value::BigInt(1)])?;
///
/// conn.begin()?;
/// conn.execute("INSERT INTO logs (msg) VALUES (?1)", &[Value::Text("action".into())])?;
/// conn.commit()?;
/// ```
pub trait Connection: Send {
    /// The SQL dialect statements for this connection must be rendered in.
    fn dialect(&self) -> Dialect;

    /// Execute a query and return all rows.
    #[allow(clippy::result_large_err)]
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Execute a query and return the first row, if any.
    #[allow(clippy::result_large_err)]
    fn query_one(&mut self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        Ok(self.query(sql, params)?.into_iter().next())
    }

    /// Execute a statement (INSERT, UPDATE, DELETE) and return rows affected.
    #[allow(clippy::result_large_err)]
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Execute an INSERT and return its change count and generated row id.
    #[allow(clippy::result_large_err)]
    fn insert(&mut self, sql: &str, params: &[Value]) -> Result<Inserted>;

    /// Execute one statement once per parameter set.
    ///
    /// The statement is prepared once; the returned vector holds the rows
    /// affected by each execution, in order.
    #[allow(clippy::result_large_err)]
    fn execute_many(&mut self, sql: &str, param_sets: &[Vec<Value>]) -> Result<Vec<u64>>;

    /// Execute one INSERT once per parameter set.
    ///
    /// Like [`execute_many`](Connection::execute_many), but returns the
    /// outcome of each execution.
    #[allow(clippy::result_large_err)]
    fn insert_many(&mut self, sql: &str, param_sets: &[Vec<Value>]) -> Result<Vec<Inserted>>;

    /// Begin a transaction.
    #[allow(clippy::result_large_err)]
    fn begin(&mut self) -> Result<()>;

    /// Commit the current transaction.
    #[allow(clippy::result_large_err)]
    fn commit(&mut self) -> Result<()>;

    /// Roll back the current transaction.
    #[allow(clippy::result_large_err)]
    fn rollback(&mut self) -> Result<()>;
}
