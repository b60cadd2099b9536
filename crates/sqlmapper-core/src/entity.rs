//! Entity trait for table-mapped structs.
//!
//! The `Entity` trait carries the static mapping an entity type needs to be
//! persisted: table name, primary key column, mapper identifier and data
//! source. It is typically derived using `#[derive(Entity)]` from
//! `sqlmapper-macros`.

use crate::Result;
use crate::field::FieldInfo;
use crate::row::Row;
use crate::value::Value;

/// Data source key used when an entity does not name one.
pub const DEFAULT_DATA_SOURCE: &str = "default";

/// Trait for types that can be mapped to database tables.
///
/// # Example
///
/// ```ignore
/// use sqlmapper::Entity;
///
/// #[derive(Entity)]
/// #[entity(table = "users")]
/// struct User {
///     #[entity(primary_key, auto_increment)]
///     id: Option<i64>,
///     name: String,
///     age: Option<i32>,
/// }
/// ```
pub trait Entity: Sized + Send + Sync + 'static {
    /// The name of the database table.
    const TABLE_NAME: &'static str;

    /// The primary key column name.
    const PRIMARY_KEY: &'static str;

    /// Identifier of the mapper that persists this entity.
    ///
    /// Statement identifiers are namespaced by it (`"users.insert"`).
    const MAPPER: &'static str = Self::TABLE_NAME;

    /// Data source sessions for this entity are opened against.
    const DATA_SOURCE: &'static str = DEFAULT_DATA_SOURCE;

    /// Get field metadata for all columns.
    fn fields() -> &'static [FieldInfo];

    /// Convert this entity to `(column, value)` pairs.
    fn to_row(&self) -> Vec<(&'static str, Value)>;

    /// Construct an entity from a database row.
    #[allow(clippy::result_large_err)]
    fn from_row(row: &Row) -> Result<Self>;

    /// Get the value of the primary key field.
    fn primary_key_value(&self) -> Value;

    /// Store a database-generated key after insert.
    ///
    /// The default ignores it, for entities whose keys are assigned by the
    /// caller.
    fn set_generated_key(&mut self, _id: i64) {}

    /// Whether the primary key holds a value identifying an existing row.
    fn has_primary_key(&self) -> bool {
        !self.primary_key_value().is_unset_key()
    }
}
