//! SQLMapper Rust - generic CRUD, batch and chain operations over typed
//! table mappers.
//!
//! One [`Db`] serves every registered entity type. Each call resolves the
//! entity's table metadata, opens a session on the entity's data source,
//! binds the entity's mapper to it, runs one operation and closes the
//! session again:
//!
//! - single-entity CRUD: `get_by_id`, `save`, `update_by_id`,
//!   `save_or_update`, `remove_by_id`, and their id-list forms
//! - chunked batches: `save_batch`, `update_batch_by_id`, one session per
//!   chunk
//! - chains: `query`, `lambda_query`, `update`, `lambda_update` build a
//!   wrapper and run it in one expression
//!
//! # Quick Start
//!
//! ```ignore
//! use sqlmapper::prelude::*;
//!
//! #[derive(Entity, Debug, Clone)]
//! #[entity(table = "heroes")]
//! struct Hero {
//!     #[entity(primary_key, auto_increment)]
//!     id: Option<i64>,
//!     name: String,
//!     age: Option<i32>,
//! }
//!
//! let provider = SqliteSessionProvider::new()
//!     .data_source("default", SqliteConfig::file("heroes.db"))?;
//! let db = Db::builder(provider).entity::<Hero>().build()?;
//!
//! let mut hero = Hero { id: None, name: "Spider-Man".into(), age: Some(25) };
//! db.save(&mut hero)?;
//!
//! let adults = db.lambda_query::<Hero>().ge(Hero::AGE, 18).list()?;
//! db.update::<Hero>().eq("name", "Spider-Man").set("age", 26).update()?;
//! db.remove_by_id::<Hero>(hero.id)?;
//! ```
//!
//! # Sessions
//!
//! Sessions come from a [`SessionProvider`]. The `sqlite` feature (on by
//! default) ships [`SqliteSessionProvider`]; other backends implement the
//! trait and register their own mappers with [`DbBuilder::entity_with`].

mod batch;
pub mod binder;
mod chain;
mod check;
pub mod config;
mod crud;
mod db;

pub use binder::{MapperFactory, MapperRegistry};
pub use chain::{QueryChain, UpdateChain};
pub use check::repeat_check;
pub use config::{BATCH_SIZE_ENV, DATA_SOURCE_ENV, DEFAULT_BATCH_SIZE, DbConfig};
pub use db::{Db, DbBuilder};

pub use sqlmapper_core::{
    ColumnInfo, Connection, Dialect, Entity, Error, Field, FieldInfo, FromValue, Inserted,
    MetadataRegistry, PreconditionKind, Result, Row, Session, SessionGuard, SessionId,
    SessionProvider, SqlMethod, StatementId, TableMetadata, Value,
};

pub use sqlmapper_macros::Entity;

pub use sqlmapper_query::{
    Assignments, ColumnRef, Conditions, Criteria, Expr, LambdaQueryWrapper, LambdaUpdateWrapper,
    Mapper, OrderBy, Page, QueryClauses, QueryWrapper, SqlMapper, UpdateCriteria, UpdateWrapper,
};

#[cfg(feature = "sqlite")]
pub use sqlmapper_sqlite::{SqliteConfig, SqliteConnection, SqliteSession, SqliteSessionProvider};

/// Prelude module for convenient imports.
///
/// ```ignore
/// use sqlmapper::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        // Chain and wrapper builder traits
        Assignments,
        Conditions,
        // Façade
        Db,
        DbConfig,
        // Core traits and types (Entity is both the trait and the derive)
        Entity,
        Error,
        Expr,
        LambdaQueryWrapper,
        LambdaUpdateWrapper,
        Mapper,
        Page,
        QueryClauses,
        QueryWrapper,
        Result,
        Row,
        SessionProvider,
        UpdateWrapper,
        Value,
        repeat_check,
    };

    #[cfg(feature = "sqlite")]
    pub use crate::{SqliteConfig, SqliteSessionProvider};
}
