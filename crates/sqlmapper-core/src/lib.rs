//! Core types and traits for SQLMapper Rust.
//!
//! This crate provides the foundational abstractions shared by the mapper,
//! driver and façade crates:
//!
//! - `Entity` trait and `FieldInfo`/`Field` for table-mapped structs
//! - `TableMetadata` and the `MetadataRegistry` that resolves it per type
//! - `Session`, `SessionProvider` and the `SessionGuard` scope
//! - `Connection` trait for blocking statement execution
//! - `Value`/`Row` for parameters and results

pub mod connection;
pub mod entity;
pub mod error;
pub mod field;
pub mod identifiers;
pub mod metadata;
pub mod row;
pub mod session;
pub mod value;

pub use connection::{Connection, Dialect, Inserted};
pub use entity::{DEFAULT_DATA_SOURCE, Entity};
pub use error::{
    ConfigError, ConnectionError, ConnectionErrorKind, Error, MapperBindError, MetadataError,
    PreconditionError, PreconditionKind, QueryError, QueryErrorKind, Result, TypeError,
};
pub use field::{Field, FieldInfo};
pub use identifiers::{check_column, is_valid_identifier, quote_ident, quote_ident_mysql};
pub use metadata::{MetadataRegistry, SqlMethod, StatementId, TableMetadata};
pub use row::{ColumnInfo, FromValue, Row};
pub use session::{Session, SessionGuard, SessionId, SessionProvider};
pub use value::Value;
