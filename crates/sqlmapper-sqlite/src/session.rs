//! Session provider over SQLite connections.
//!
//! Every session owns a fresh connection to its data source's database and
//! closes it when the session is closed. Shared in-memory data sources keep
//! one extra connection open for the provider's lifetime so the database
//! survives between sessions.

#![allow(clippy::result_large_err)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use sqlmapper_core::{
    Connection, ConnectionError, ConnectionErrorKind, Dialect, Error, Inserted, Result, Row,
    Session, SessionId, SessionProvider, Value,
};

use crate::connection::{SqliteConfig, SqliteConnection};

/// Opens one [`SqliteSession`] per request, keyed by data source.
#[derive(Debug, Default)]
pub struct SqliteSessionProvider {
    sources: HashMap<String, SqliteConfig>,
    /// Connections keeping shared in-memory databases alive
    keepers: Mutex<Vec<SqliteConnection>>,
    opened: AtomicU64,
    closed: AtomicU64,
}

impl SqliteSessionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `config` under the data source key `name`.
    ///
    /// Shared in-memory databases are opened right away and kept open until
    /// the provider is dropped.
    pub fn data_source(mut self, name: impl Into<String>, config: SqliteConfig) -> Result<Self> {
        let name = name.into();
        if config.is_shared_memory() {
            let keeper = SqliteConnection::open(&config)?;
            self.keepers
                .get_mut()
                .map_err(|_| poisoned())?
                .push(keeper);
        }
        tracing::debug!(data_source = %name, path = %config.path, "Registered SQLite data source");
        self.sources.insert(name, config);
        Ok(self)
    }

    /// Run a script (schema setup, seed data) against a data source on a
    /// connection of its own.
    pub fn execute_script(&self, data_source: &str, sql: &str) -> Result<()> {
        let mut conn = SqliteConnection::open(self.config(data_source)?)?;
        conn.execute_raw(sql)?;
        conn.close()
    }

    /// Sessions opened so far.
    pub fn opened_sessions(&self) -> u64 {
        self.opened.load(Ordering::Relaxed)
    }

    /// Sessions closed so far.
    pub fn closed_sessions(&self) -> u64 {
        self.closed.load(Ordering::Relaxed)
    }

    fn config(&self, data_source: &str) -> Result<&SqliteConfig> {
        self.sources.get(data_source).ok_or_else(|| {
            Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::UnknownDataSource,
                message: format!("no SQLite data source named '{data_source}'"),
                source: None,
            })
        })
    }
}

impl SessionProvider for SqliteSessionProvider {
    type Session = SqliteSession;

    fn open_session(&self, data_source: &str) -> Result<SqliteSession> {
        let conn = SqliteConnection::open(self.config(data_source)?)?;
        self.opened.fetch_add(1, Ordering::Relaxed);
        Ok(SqliteSession {
            id: SessionId::next(),
            data_source: data_source.to_string(),
            conn,
        })
    }

    fn close_session(&self, session: SqliteSession) -> Result<()> {
        self.closed.fetch_add(1, Ordering::Relaxed);
        session.conn.close()
    }
}

/// A session holding one SQLite connection.
#[derive(Debug)]
pub struct SqliteSession {
    id: SessionId,
    data_source: String,
    conn: SqliteConnection,
}

impl SqliteSession {
    pub fn connection(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }
}

impl Session for SqliteSession {
    fn session_id(&self) -> SessionId {
        self.id
    }

    fn data_source(&self) -> &str {
        &self.data_source
    }
}

impl Connection for SqliteSession {
    fn dialect(&self) -> Dialect {
        self.conn.dialect()
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.conn.query(sql, params)
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        self.conn.execute(sql, params)
    }

    fn insert(&mut self, sql: &str, params: &[Value]) -> Result<Inserted> {
        self.conn.insert(sql, params)
    }

    fn execute_many(&mut self, sql: &str, param_sets: &[Vec<Value>]) -> Result<Vec<u64>> {
        self.conn.execute_many(sql, param_sets)
    }

    fn insert_many(&mut self, sql: &str, param_sets: &[Vec<Value>]) -> Result<Vec<Inserted>> {
        self.conn.insert_many(sql, param_sets)
    }

    fn begin(&mut self) -> Result<()> {
        self.conn.begin()
    }

    fn commit(&mut self) -> Result<()> {
        self.conn.commit()
    }

    fn rollback(&mut self) -> Result<()> {
        self.conn.rollback()
    }
}

fn poisoned() -> Error {
    Error::Custom("SQLite keeper list lock poisoned".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(name: &str) -> SqliteSessionProvider {
        let provider = SqliteSessionProvider::new()
            .data_source("default", SqliteConfig::shared_memory(name))
            .unwrap();
        provider
            .execute_script("default", "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)")
            .unwrap();
        provider
    }

    #[test]
    fn test_sessions_share_the_database() {
        let provider = provider("session_provider_share");

        let mut first = provider.open_session("default").unwrap();
        first
            .execute("INSERT INTO notes (body) VALUES (?1)", &[Value::Text("hi".into())])
            .unwrap();
        let first_id = first.session_id();
        provider.close_session(first).unwrap();

        let mut second = provider.open_session("default").unwrap();
        assert_ne!(second.session_id(), first_id);
        assert_eq!(second.data_source(), "default");
        let rows = second.query("SELECT body FROM notes", &[]).unwrap();
        assert_eq!(rows.len(), 1);
        provider.close_session(second).unwrap();

        assert_eq!(provider.opened_sessions(), 2);
        assert_eq!(provider.closed_sessions(), 2);
    }

    #[test]
    fn test_unknown_data_source() {
        let provider = provider("session_provider_unknown");
        let err = provider.open_session("archive").unwrap_err();
        match err {
            Error::Connection(c) => assert_eq!(c.kind, ConnectionErrorKind::UnknownDataSource),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(provider.opened_sessions(), 0);
    }

    #[test]
    fn test_session_connection_dialect() {
        let provider = provider("session_provider_dialect");
        let mut session = provider.open_session("default").unwrap();
        assert_eq!(session.dialect(), Dialect::Sqlite);
        assert!(session.connection().path().contains("session_provider_dialect"));
        provider.close_session(session).unwrap();
    }
}
