//! SQLite connection implementation.
//!
//! Safe wrappers around SQLite's C API implementing the blocking
//! [`Connection`] trait. Batch execution prepares a statement once and
//! rebinds it for every parameter set.

// Allow casts in FFI code where we need to match C types exactly
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::result_large_err)] // Error type is defined in sqlmapper-core
#![allow(clippy::borrow_as_ptr)] // FFI requires raw pointers

use crate::ffi;
use crate::types;
use sqlmapper_core::{
    ColumnInfo, Connection, ConnectionError, ConnectionErrorKind, Dialect, Error, Inserted,
    QueryErrorKind, Result, Row, Value,
};
use std::ffi::{CStr, CString, c_int};
use std::ptr;
use std::sync::Arc;

/// Configuration for opening SQLite connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteConfig {
    /// Path to the database file, ":memory:", or a `file:` URI.
    pub path: String,
    /// Open flags (read-only, read-write, create, etc.)
    pub flags: OpenFlags,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

/// Flags controlling how the database is opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenFlags {
    /// Open for reading only.
    pub read_only: bool,
    /// Open for reading and writing.
    pub read_write: bool,
    /// Create the database if it doesn't exist.
    pub create: bool,
    /// Enable URI filename interpretation.
    pub uri: bool,
    /// Enable shared cache mode.
    pub shared_cache: bool,
}

impl OpenFlags {
    /// Create flags for read-only access.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Default::default()
        }
    }

    /// Create flags for read-write access with creation if needed.
    pub fn create_read_write() -> Self {
        Self {
            read_write: true,
            create: true,
            ..Default::default()
        }
    }

    fn to_sqlite_flags(self) -> c_int {
        // each connection is owned by one session at a time
        let mut flags = ffi::SQLITE_OPEN_NOMUTEX;

        if self.read_only {
            flags |= ffi::SQLITE_OPEN_READONLY;
        }
        if self.read_write {
            flags |= ffi::SQLITE_OPEN_READWRITE;
        }
        if self.create {
            flags |= ffi::SQLITE_OPEN_CREATE;
        }
        if self.uri {
            flags |= ffi::SQLITE_OPEN_URI;
        }
        if self.shared_cache {
            flags |= ffi::SQLITE_OPEN_SHAREDCACHE;
        }

        // Default to read-write if no mode specified
        if flags & (ffi::SQLITE_OPEN_READONLY | ffi::SQLITE_OPEN_READWRITE) == 0 {
            flags |= ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE;
        }

        flags
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
            flags: OpenFlags::create_read_write(),
            busy_timeout_ms: 5000,
        }
    }
}

impl SqliteConfig {
    /// Config for a file-based database.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Config for a private in-memory database.
    ///
    /// Every connection opened from it sees its own empty database.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Config for a named in-memory database shared by every connection
    /// opened from it in this process.
    ///
    /// The database lives as long as at least one connection to it is open.
    pub fn shared_memory(name: &str) -> Self {
        Self {
            path: format!("file:{name}?mode=memory&cache=shared"),
            flags: OpenFlags {
                uri: true,
                ..OpenFlags::create_read_write()
            },
            ..Self::default()
        }
    }

    /// Set open flags.
    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set busy timeout.
    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }

    /// Whether connections opened from this config share one in-memory
    /// database.
    pub fn is_shared_memory(&self) -> bool {
        self.flags.uri && self.path.contains("mode=memory")
    }
}

/// A connection to a SQLite database.
pub struct SqliteConnection {
    db: *mut ffi::sqlite3,
    path: String,
}

// SAFETY: the handle is opened with SQLITE_OPEN_NOMUTEX and only ever used
// through `&mut self` or by the thread that owns the connection; moving it
// between threads is allowed by SQLite in multi-thread mode.
unsafe impl Send for SqliteConnection {}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteConnection {
    /// Open a new SQLite connection with the given configuration.
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        let c_path = CString::new(config.path.as_str())
            .map_err(|_| connect_error("Invalid path: contains null byte".to_string()))?;

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        let flags = config.flags.to_sqlite_flags();

        // SAFETY: We pass valid pointers and check the return value
        let rc = unsafe { ffi::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, ptr::null()) };

        if rc != ffi::SQLITE_OK {
            let msg = if db.is_null() {
                ffi::error_string(rc).to_string()
            } else {
                // SAFETY: db is a handle SQLite allocated; it must be closed
                // even when open failed
                unsafe {
                    let msg = ffi::last_error_message(db);
                    ffi::sqlite3_close(db);
                    msg
                }
            };
            return Err(connect_error(format!(
                "Failed to open database {}: {msg}",
                config.path
            )));
        }

        if config.busy_timeout_ms > 0 {
            // SAFETY: db is valid
            unsafe {
                ffi::sqlite3_busy_timeout(db, config.busy_timeout_ms as c_int);
            }
        }

        tracing::debug!(path = %config.path, "Opened SQLite connection");
        Ok(Self {
            db,
            path: config.path.clone(),
        })
    }

    /// Open a private in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::open(&SqliteConfig::memory())
    }

    /// Open a file-based database.
    pub fn open_file(path: impl Into<String>) -> Result<Self> {
        Self::open(&SqliteConfig::file(path))
    }

    /// Get the database path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Execute one or more `;`-separated statements without parameters
    /// (DDL, pragmas, scripts).
    pub fn execute_raw(&mut self, sql: &str) -> Result<()> {
        let c_sql = CString::new(sql).map_err(|_| null_byte_error(sql))?;
        let mut errmsg: *mut std::ffi::c_char = ptr::null_mut();

        // SAFETY: All pointers are valid
        let rc = unsafe {
            ffi::sqlite3_exec(self.db, c_sql.as_ptr(), None, ptr::null_mut(), &mut errmsg)
        };

        if rc != ffi::SQLITE_OK {
            let msg = if errmsg.is_null() {
                ffi::error_string(rc).to_string()
            } else {
                // SAFETY: errmsg was allocated by SQLite and is freed once
                unsafe {
                    let msg = CStr::from_ptr(errmsg).to_string_lossy().into_owned();
                    ffi::sqlite3_free(errmsg.cast());
                    msg
                }
            };
            return Err(Error::query(error_code_to_kind(rc), Some(sql), msg));
        }

        Ok(())
    }

    /// Get the last insert rowid.
    pub fn last_insert_rowid(&self) -> i64 {
        // SAFETY: db is valid
        unsafe { ffi::sqlite3_last_insert_rowid(self.db) }
    }

    /// Get the number of rows changed by the last statement.
    pub fn changes(&self) -> u64 {
        // SAFETY: db is valid
        let changes = unsafe { ffi::sqlite3_changes(self.db) };
        changes.max(0) as u64
    }

    /// Whether a transaction is open on this connection.
    pub fn in_transaction(&self) -> bool {
        // SAFETY: db is valid
        unsafe { ffi::sqlite3_get_autocommit(self.db) == 0 }
    }

    /// Close the connection, reporting a failure to do so.
    ///
    /// Any open transaction is rolled back first.
    pub fn close(mut self) -> Result<()> {
        if self.in_transaction() {
            self.execute_raw("ROLLBACK")?;
        }
        // SAFETY: db is valid and every Statement finalizes itself on drop
        let rc = unsafe { ffi::sqlite3_close(self.db) };
        if rc != ffi::SQLITE_OK {
            // handle stays owned; Drop makes one more attempt
            return Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Close,
                message: format!("Failed to close {}: {}", self.path, ffi::error_string(rc)),
                source: None,
            }));
        }
        self.db = ptr::null_mut();
        tracing::debug!(path = %self.path, "Closed SQLite connection");
        Ok(())
    }

    fn prepare(&self, sql: &str) -> Result<Statement> {
        let c_sql = CString::new(sql).map_err(|_| null_byte_error(sql))?;
        let mut stmt: *mut ffi::sqlite3_stmt = ptr::null_mut();

        // SAFETY: All pointers are valid
        let rc = unsafe {
            ffi::sqlite3_prepare_v2(
                self.db,
                c_sql.as_ptr(),
                c_sql.as_bytes().len() as c_int,
                &mut stmt,
                ptr::null_mut(),
            )
        };

        if rc != ffi::SQLITE_OK {
            return Err(self.last_error(sql));
        }
        tracing::trace!(sql = %sql, "Prepared statement");
        Ok(Statement { stmt })
    }

    fn last_error(&self, sql: &str) -> Error {
        // SAFETY: db is valid
        let (code, msg) = unsafe { (ffi::sqlite3_errcode(self.db), ffi::last_error_message(self.db)) };
        Error::query(error_code_to_kind(code), Some(sql), msg)
    }

    /// Bind `params`, step to completion and return rows changed.
    fn run(&self, stmt: &Statement, sql: &str, params: &[Value]) -> Result<u64> {
        stmt.bind_all(params).map_err(|index| self.bind_error(sql, index))?;
        loop {
            match stmt.step() {
                ffi::SQLITE_ROW => {}
                ffi::SQLITE_DONE => return Ok(self.changes()),
                _ => return Err(self.last_error(sql)),
            }
        }
    }

    fn bind_error(&self, sql: &str, index: usize) -> Error {
        // SAFETY: db is valid
        let msg = unsafe { ffi::last_error_message(self.db) };
        Error::query(
            QueryErrorKind::Database,
            Some(sql),
            format!("Failed to bind parameter {index}: {msg}"),
        )
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        if !self.db.is_null() {
            // SAFETY: db is valid and dropped once
            let rc = unsafe { ffi::sqlite3_close(self.db) };
            if rc != ffi::SQLITE_OK {
                tracing::warn!(path = %self.path, code = rc, "Failed to close SQLite connection");
            }
        }
    }
}

impl Connection for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let stmt = self.prepare(sql)?;
        stmt.bind_all(params).map_err(|index| self.bind_error(sql, index))?;

        // SAFETY: stmt is valid
        let col_count = unsafe { ffi::sqlite3_column_count(stmt.stmt) };
        let col_names = (0..col_count)
            .map(|i| {
                // SAFETY: stmt is valid and i is in range
                unsafe { types::column_name(stmt.stmt, i) }.unwrap_or_else(|| format!("col{i}"))
            })
            .collect();
        let columns = Arc::new(ColumnInfo::new(col_names));

        let mut rows = Vec::new();
        loop {
            match stmt.step() {
                ffi::SQLITE_ROW => {
                    let values = (0..col_count)
                        // SAFETY: stmt is valid, we just got SQLITE_ROW
                        .map(|i| unsafe { types::read_column(stmt.stmt, i) })
                        .collect();
                    rows.push(Row::with_columns(Arc::clone(&columns), values));
                }
                ffi::SQLITE_DONE => break,
                _ => return Err(self.last_error(sql)),
            }
        }

        tracing::trace!(sql = %sql, rows = rows.len(), "Query complete");
        Ok(rows)
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        let stmt = self.prepare(sql)?;
        let changes = self.run(&stmt, sql, params)?;
        tracing::trace!(sql = %sql, changes, "Statement executed");
        Ok(changes)
    }

    fn insert(&mut self, sql: &str, params: &[Value]) -> Result<Inserted> {
        let changes = self.execute(sql, params)?;
        Ok(Inserted {
            changes,
            id: self.last_insert_rowid(),
        })
    }

    fn execute_many(&mut self, sql: &str, param_sets: &[Vec<Value>]) -> Result<Vec<u64>> {
        let stmt = self.prepare(sql)?;
        let mut affected = Vec::with_capacity(param_sets.len());
        for params in param_sets {
            stmt.reset();
            affected.push(self.run(&stmt, sql, params)?);
        }
        tracing::trace!(sql = %sql, executions = param_sets.len(), "Batch executed");
        Ok(affected)
    }

    fn insert_many(&mut self, sql: &str, param_sets: &[Vec<Value>]) -> Result<Vec<Inserted>> {
        let stmt = self.prepare(sql)?;
        let mut outcomes = Vec::with_capacity(param_sets.len());
        for params in param_sets {
            stmt.reset();
            let changes = self.run(&stmt, sql, params)?;
            outcomes.push(Inserted {
                changes,
                id: self.last_insert_rowid(),
            });
        }
        tracing::trace!(sql = %sql, rows = param_sets.len(), "Batch insert executed");
        Ok(outcomes)
    }

    fn begin(&mut self) -> Result<()> {
        if self.in_transaction() {
            return Err(Error::query(
                QueryErrorKind::Database,
                None,
                "Already in a transaction",
            ));
        }
        self.execute_raw("BEGIN IMMEDIATE")
    }

    fn commit(&mut self) -> Result<()> {
        if !self.in_transaction() {
            return Err(Error::query(QueryErrorKind::Database, None, "Not in a transaction"));
        }
        self.execute_raw("COMMIT")
    }

    fn rollback(&mut self) -> Result<()> {
        if !self.in_transaction() {
            return Err(Error::query(QueryErrorKind::Database, None, "Not in a transaction"));
        }
        self.execute_raw("ROLLBACK")
    }
}

/// A prepared statement, finalized on drop.
struct Statement {
    stmt: *mut ffi::sqlite3_stmt,
}

impl Statement {
    /// Bind every parameter; on failure returns the 1-based index that failed.
    fn bind_all(&self, params: &[Value]) -> std::result::Result<(), usize> {
        for (i, param) in params.iter().enumerate() {
            // SAFETY: stmt is valid, index is 1-based
            let rc = unsafe { types::bind_value(self.stmt, (i + 1) as c_int, param) };
            if rc != ffi::SQLITE_OK {
                return Err(i + 1);
            }
        }
        Ok(())
    }

    fn step(&self) -> c_int {
        // SAFETY: stmt is valid
        unsafe { ffi::sqlite3_step(self.stmt) }
    }

    /// Rewind for another execution and drop the previous bindings.
    fn reset(&self) {
        // SAFETY: stmt is valid; the reset code repeats the last step error,
        // which was already reported
        unsafe {
            ffi::sqlite3_reset(self.stmt);
            ffi::sqlite3_clear_bindings(self.stmt);
        }
    }
}

impl Drop for Statement {
    fn drop(&mut self) {
        // SAFETY: stmt is valid and finalized once
        unsafe {
            ffi::sqlite3_finalize(self.stmt);
        }
    }
}

fn connect_error(message: String) -> Error {
    Error::Connection(ConnectionError {
        kind: ConnectionErrorKind::Connect,
        message,
        source: None,
    })
}

fn null_byte_error(sql: &str) -> Error {
    Error::query(QueryErrorKind::Syntax, Some(sql), "SQL contains null byte")
}

fn error_code_to_kind(code: c_int) -> QueryErrorKind {
    // extended result codes carry the primary code in the low byte
    match code & 0xff {
        ffi::SQLITE_CONSTRAINT => QueryErrorKind::Constraint,
        ffi::SQLITE_BUSY | ffi::SQLITE_LOCKED => QueryErrorKind::Busy,
        _ => QueryErrorKind::Database,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> SqliteConnection {
        let mut conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INTEGER)")
            .unwrap();
        conn
    }

    #[test]
    fn test_insert_and_query() {
        let mut conn = setup();
        let inserted = conn
            .insert(
                "INSERT INTO users (name, age) VALUES (?1, ?2)",
                &[Value::Text("ada".into()), Value::Int(36)],
            )
            .unwrap();
        assert_eq!(inserted, Inserted { changes: 1, id: 1 });
        let id = inserted.id;

        let rows = conn
            .query("SELECT id, name, age FROM users WHERE id = ?1", &[Value::BigInt(id)])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_named::<String>("name").unwrap(), "ada");
        assert_eq!(rows[0].get_named::<Option<i32>>("age").unwrap(), Some(36));
    }

    #[test]
    fn test_execute_reports_changes() {
        let mut conn = setup();
        conn.execute_raw("INSERT INTO users (name) VALUES ('a'), ('b'), ('c')")
            .unwrap();
        let changed = conn
            .execute("UPDATE users SET age = ?1 WHERE id > ?2", &[Value::Int(1), Value::Int(1)])
            .unwrap();
        assert_eq!(changed, 2);
    }

    #[test]
    fn test_insert_many_reuses_statement() {
        let mut conn = setup();
        let sets = vec![
            vec![Value::Text("a".into())],
            vec![Value::Text("b".into())],
            vec![Value::Text("c".into())],
        ];
        let outcomes = conn
            .insert_many("INSERT INTO users (name) VALUES (?1)", &sets)
            .unwrap();
        let ids: Vec<i64> = outcomes.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(outcomes.iter().all(|o| o.changes == 1));

        let affected = conn
            .execute_many(
                "UPDATE users SET age = ?1 WHERE id = ?2",
                &[
                    vec![Value::Int(10), Value::BigInt(1)],
                    vec![Value::Int(20), Value::BigInt(99)],
                ],
            )
            .unwrap();
        assert_eq!(affected, vec![1, 0]);
    }

    #[test]
    fn test_constraint_error_kind() {
        let mut conn = setup();
        let err = conn
            .execute("INSERT INTO users (name) VALUES (?1)", &[Value::Null])
            .unwrap_err();
        match err {
            Error::Query(q) => assert_eq!(q.kind, QueryErrorKind::Constraint),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_transaction_rollback() {
        let mut conn = setup();
        conn.begin().unwrap();
        assert!(conn.in_transaction());
        assert!(conn.begin().is_err());
        conn.execute("INSERT INTO users (name) VALUES (?1)", &[Value::Text("x".into())])
            .unwrap();
        conn.rollback().unwrap();
        assert!(!conn.in_transaction());

        let rows = conn.query("SELECT COUNT(*) FROM users", &[]).unwrap();
        assert_eq!(rows[0].get_as::<i64>(0).unwrap(), 0);
        assert!(conn.commit().is_err());
    }

    #[test]
    fn test_values_round_trip_through_storage_classes() {
        let mut conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw("CREATE TABLE t (b INTEGER, d REAL, x BLOB, j TEXT, big INTEGER)")
            .unwrap();
        conn.execute(
            "INSERT INTO t VALUES (?1, ?2, ?3, ?4, ?5)",
            &[
                Value::Bool(true),
                Value::Double(1.5),
                Value::Bytes(vec![1, 2, 3]),
                Value::Json(serde_json::json!({"k": 1})),
                Value::BigInt(i64::MAX),
            ],
        )
        .unwrap();

        let row = conn.query_one("SELECT * FROM t", &[]).unwrap().unwrap();
        assert!(row.get_named::<bool>("b").unwrap());
        assert_eq!(row.get_named::<f64>("d").unwrap(), 1.5);
        assert_eq!(row.get_named::<Vec<u8>>("x").unwrap(), vec![1, 2, 3]);
        assert_eq!(row.get_named::<String>("j").unwrap(), r#"{"k":1}"#);
        assert_eq!(row.get_by_name("big"), Some(&Value::BigInt(i64::MAX)));
    }

    #[test]
    fn test_shared_memory_is_visible_across_connections() {
        let config = SqliteConfig::shared_memory("conn_shared_test");
        assert!(config.is_shared_memory());
        let mut a = SqliteConnection::open(&config).unwrap();
        a.execute_raw("CREATE TABLE s (v INTEGER)").unwrap();
        a.execute("INSERT INTO s VALUES (?1)", &[Value::Int(7)]).unwrap();

        let mut b = SqliteConnection::open(&config).unwrap();
        let rows = b.query("SELECT v FROM s", &[]).unwrap();
        assert_eq!(rows[0].get_as::<i32>(0).unwrap(), 7);
        b.close().unwrap();
        a.close().unwrap();
    }

    #[test]
    fn test_close_rolls_back_open_transaction() {
        let mut conn = setup();
        conn.begin().unwrap();
        conn.close().unwrap();
    }

    #[test]
    fn test_close_and_drop_after_statements() {
        let config = SqliteConfig::shared_memory("conn_close_drop_test");
        let mut keeper = SqliteConnection::open(&config).unwrap();
        keeper.execute_raw("CREATE TABLE c (v INTEGER)").unwrap();

        let mut closed = SqliteConnection::open(&config).unwrap();
        closed
            .insert_many("INSERT INTO c VALUES (?1)", &[vec![Value::Int(1)], vec![Value::Int(2)]])
            .unwrap();
        assert_eq!(closed.query("SELECT v FROM c", &[]).unwrap().len(), 2);
        closed.close().unwrap();

        {
            let mut dropped = SqliteConnection::open(&config).unwrap();
            dropped.execute("DELETE FROM c WHERE v = ?1", &[Value::Int(1)]).unwrap();
        }

        let rows = keeper.query("SELECT v FROM c", &[]).unwrap();
        assert_eq!(rows.len(), 1);
        keeper.close().unwrap();
    }
}
