//! Condition wrappers, statement rendering and table mappers for SQLMapper Rust.
//!
//! `sqlmapper-query` is the **statement layer**. It turns entity metadata plus
//! wrapper-built criteria into executable SQL and parameters.
//!
//! # Role In The Architecture
//!
//! - **Wrappers**: `QueryWrapper`/`UpdateWrapper` and their lambda flavours
//!   compile fluent conditions into opaque `Criteria`.
//! - **Expression DSL**: `Expr` renders WHERE clauses with bound parameters.
//! - **Mappers**: the `Mapper` trait is the per-entity statement set the
//!   façade drives; `SqlMapper` implements it over any `Connection`.
//!
//! Most users access these types via the `sqlmapper` facade crate.

pub mod builder;
pub mod clause;
pub mod criteria;
pub mod expr;
pub mod mapper;
pub mod page;
pub mod wrapper;

pub use builder::StatementBuilder;
pub use clause::{Limit, OrderBy, OrderDirection};
pub use criteria::{Criteria, Predicate, UpdateCriteria};
pub use expr::{BinaryOp, Expr};
pub use mapper::{Mapper, SqlMapper};
pub use page::Page;
pub use sqlmapper_core::{Dialect, SqlMethod, StatementId};
pub use wrapper::{
    Assignments, ColumnRef, Conditions, LambdaQueryWrapper, LambdaUpdateWrapper, QueryClauses,
    QueryWrapper, UpdateWrapper,
};
