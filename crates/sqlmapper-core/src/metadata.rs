//! Table metadata and the registry that resolves it per entity type.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::field::FieldInfo;
use crate::identifiers::is_valid_identifier;

/// Statements every mapper understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlMethod {
    Insert,
    UpdateById,
    Update,
    DeleteById,
    DeleteBatchIds,
    Delete,
    SelectById,
    SelectBatchIds,
    SelectList,
    SelectOne,
    SelectCount,
    SelectPage,
    SelectObjs,
    SelectMaps,
}

impl SqlMethod {
    /// Method name used in statement identifiers.
    pub const fn method(self) -> &'static str {
        match self {
            SqlMethod::Insert => "insert",
            SqlMethod::UpdateById => "updateById",
            SqlMethod::Update => "update",
            SqlMethod::DeleteById => "deleteById",
            SqlMethod::DeleteBatchIds => "deleteBatchIds",
            SqlMethod::Delete => "delete",
            SqlMethod::SelectById => "selectById",
            SqlMethod::SelectBatchIds => "selectBatchIds",
            SqlMethod::SelectList => "selectList",
            SqlMethod::SelectOne => "selectOne",
            SqlMethod::SelectCount => "selectCount",
            SqlMethod::SelectPage => "selectPage",
            SqlMethod::SelectObjs => "selectObjs",
            SqlMethod::SelectMaps => "selectMaps",
        }
    }
}

/// Fully qualified statement identifier: `"<mapper_id>.<method>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatementId {
    namespace: String,
    method: SqlMethod,
}

impl StatementId {
    pub fn new(namespace: impl Into<String>, method: SqlMethod) -> Self {
        Self {
            namespace: namespace.into(),
            method,
        }
    }

    /// Mapper identifier part.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn method(&self) -> SqlMethod {
        self.method
    }
}

impl fmt::Display for StatementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.method.method())
    }
}

/// Table mapping of one entity type.
///
/// Built once at registration from the entity's static constants and shared
/// read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMetadata {
    /// Rust type name of the entity
    pub entity_type: &'static str,
    pub type_id: TypeId,
    pub table_name: &'static str,
    pub primary_key: &'static str,
    /// Identifier the mapper binder looks mappers up by
    pub mapper_id: &'static str,
    /// Data source key sessions are opened against
    pub data_source: &'static str,
    pub columns: &'static [FieldInfo],
}

impl TableMetadata {
    /// Build metadata for `M`, validating every identifier.
    #[allow(clippy::result_large_err)]
    pub fn of<M: Entity>() -> Result<Self> {
        let meta = Self {
            entity_type: std::any::type_name::<M>(),
            type_id: TypeId::of::<M>(),
            table_name: M::TABLE_NAME,
            primary_key: M::PRIMARY_KEY,
            mapper_id: M::MAPPER,
            data_source: M::DATA_SOURCE,
            columns: M::fields(),
        };
        meta.validate()?;
        Ok(meta)
    }

    #[allow(clippy::result_large_err)]
    fn validate(&self) -> Result<()> {
        let invalid = |what: &str, name: &str| {
            Error::config(format!(
                "entity {} has invalid {} '{}'",
                self.entity_type, what, name
            ))
        };
        if !is_valid_identifier(self.table_name) {
            return Err(invalid("table name", self.table_name));
        }
        if !is_valid_identifier(self.primary_key) {
            return Err(invalid("primary key", self.primary_key));
        }
        if self.mapper_id.is_empty() {
            return Err(invalid("mapper identifier", self.mapper_id));
        }
        if let Some(field) = self
            .columns
            .iter()
            .find(|f| !is_valid_identifier(f.column_name))
        {
            return Err(invalid("column", field.column_name));
        }
        Ok(())
    }

    /// Statement identifier for `method` in this entity's mapper namespace.
    pub fn statement(&self, method: SqlMethod) -> StatementId {
        StatementId::new(self.mapper_id, method)
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|f| f.column_name)
    }

    /// Field info of the auto-increment column, if the table has one.
    pub fn auto_increment_column(&self) -> Option<&'static FieldInfo> {
        self.columns.iter().find(|f| f.auto_increment)
    }
}

/// Registry of table metadata keyed by entity type.
#[derive(Debug, Default, Clone)]
pub struct MetadataRegistry {
    tables: HashMap<TypeId, Arc<TableMetadata>>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `M`, replacing any earlier registration of the same type.
    #[allow(clippy::result_large_err)]
    pub fn register<M: Entity>(&mut self) -> Result<Arc<TableMetadata>> {
        let meta = Arc::new(TableMetadata::of::<M>()?);
        tracing::debug!(
            entity = meta.entity_type,
            table = meta.table_name,
            mapper = meta.mapper_id,
            "Registered table metadata"
        );
        self.tables.insert(meta.type_id, Arc::clone(&meta));
        Ok(meta)
    }

    /// Metadata for `type_id`, if registered.
    pub fn lookup(&self, type_id: TypeId) -> Option<Arc<TableMetadata>> {
        self.tables.get(&type_id).cloned()
    }

    /// Metadata for `M`; an unregistered type is an error, never a default.
    #[allow(clippy::result_large_err)]
    pub fn resolve<M: Entity>(&self) -> Result<Arc<TableMetadata>> {
        self.lookup(TypeId::of::<M>())
            .ok_or_else(|| Error::metadata_not_found(std::any::type_name::<M>()))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
