//! Field and column definitions.

use std::fmt;
use std::marker::PhantomData;

/// Metadata about an entity field/column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo {
    /// Rust field name
    pub name: &'static str,
    /// Database column name (may differ from field name)
    pub column_name: &'static str,
    /// Whether this field is nullable
    pub nullable: bool,
    /// Whether this is the primary key
    pub primary_key: bool,
    /// Whether the database generates this column's value on insert
    pub auto_increment: bool,
}

impl FieldInfo {
    /// Create a new field info with minimal required data.
    pub const fn new(name: &'static str, column_name: &'static str) -> Self {
        Self {
            name,
            column_name,
            nullable: false,
            primary_key: false,
            auto_increment: false,
        }
    }

    /// Set nullable flag.
    pub const fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    /// Set primary key flag.
    pub const fn primary_key(mut self, value: bool) -> Self {
        self.primary_key = value;
        self
    }

    /// Set auto-increment flag.
    pub const fn auto_increment(mut self, value: bool) -> Self {
        self.auto_increment = value;
        self
    }
}

/// A typed column reference bound to entity `M`.
///
/// `#[derive(Entity)]` emits one associated constant per field
/// (`User::NAME`, `User::AGE`, ...). Lambda wrappers only accept these, so a
/// column of another entity or a misspelled name is a compile error.
pub struct Field<M> {
    column: &'static str,
    _entity: PhantomData<fn() -> M>,
}

impl<M> Field<M> {
    /// Create a column reference. Normally called by generated code.
    pub const fn new(column: &'static str) -> Self {
        Self {
            column,
            _entity: PhantomData,
        }
    }

    /// The database column name.
    pub const fn column(&self) -> &'static str {
        self.column
    }
}

impl<M> Clone for Field<M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M> Copy for Field<M> {}

impl<M> fmt::Debug for Field<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Field").field(&self.column).finish()
    }
}

impl<M> PartialEq for Field<M> {
    fn eq(&self, other: &Self) -> bool {
        self.column == other.column
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Hero;

    #[test]
    fn field_info_builder() {
        let info = FieldInfo::new("id", "hero_id")
            .primary_key(true)
            .auto_increment(true);
        assert_eq!(info.column_name, "hero_id");
        assert!(info.primary_key);
        assert!(info.auto_increment);
        assert!(!info.nullable);
    }

    #[test]
    fn typed_field_is_copy() {
        const NAME: Field<Hero> = Field::new("name");
        let a = NAME;
        let b = a;
        assert_eq!(a, b);
        assert_eq!(b.column(), "name");
        assert_eq!(format!("{a:?}"), "Field(\"name\")");
    }
}
