//! Single-entity and wrapper operations.
//!
//! Each operation is one [`Db::execute`] call, except `update_by_id`, which
//! first confirms the row exists with a lookup of its own.

use std::any::type_name;
use std::collections::HashMap;

use sqlmapper_core::{Entity, Error, PreconditionKind, Result, SessionProvider, Value};
use sqlmapper_query::{Page, QueryWrapper, UpdateWrapper};

use crate::db::Db;

fn collect_ids<I>(ids: I, operation: &'static str) -> Result<Vec<Value>>
where
    I: IntoIterator,
    I::Item: Into<Value>,
{
    let ids: Vec<Value> = ids.into_iter().map(Into::into).collect();
    if ids.is_empty() {
        return Err(Error::precondition(
            PreconditionKind::EmptyCollection,
            operation,
            "id list cannot be empty",
        ));
    }
    Ok(ids)
}

#[allow(clippy::result_large_err)]
impl<P> Db<P>
where
    P: SessionProvider,
    P::Session: 'static,
{
    /// Fetch one entity by primary key.
    #[tracing::instrument(level = "debug", skip_all, fields(entity = type_name::<M>()))]
    pub fn get_by_id<M: Entity>(&self, id: impl Into<Value>) -> Result<Option<M>> {
        let id = id.into();
        self.execute::<M, _>(|mapper| mapper.select_by_id(&id))
    }

    /// Fetch the entities whose keys are in `ids`. Missing keys are skipped.
    #[tracing::instrument(level = "debug", skip_all, fields(entity = type_name::<M>()))]
    pub fn list_by_ids<M, I>(&self, ids: I) -> Result<Vec<M>>
    where
        M: Entity,
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let ids = collect_ids(ids, "list_by_ids")?;
        self.execute::<M, _>(|mapper| mapper.select_batch_ids(&ids))
    }

    /// Insert one entity; `true` when exactly one row was written.
    ///
    /// A key generated by the database is stored back into `entity`.
    #[tracing::instrument(level = "debug", skip_all, fields(entity = type_name::<M>()))]
    pub fn save<M: Entity>(&self, entity: &mut M) -> Result<bool> {
        let affected = self.execute::<M, _>(|mapper| mapper.insert(entity))?;
        Ok(affected == 1)
    }

    /// Update the non-NULL fields of `entity` by primary key.
    ///
    /// An unset key is an error. A key with no matching row logs a warning
    /// and returns `false` without writing.
    #[tracing::instrument(level = "debug", skip_all, fields(entity = type_name::<M>()))]
    pub fn update_by_id<M: Entity>(&self, entity: &M) -> Result<bool> {
        let id = entity.primary_key_value();
        if id.is_unset_key() {
            return Err(Error::precondition(
                PreconditionKind::MissingPrimaryKey,
                "update_by_id",
                format!("{} has no primary key value", type_name::<M>()),
            ));
        }
        if self.get_by_id::<M>(id.clone())?.is_none() {
            tracing::warn!(entity = type_name::<M>(), id = ?id, "Update target not found");
            return Ok(false);
        }
        let affected = self.execute::<M, _>(|mapper| mapper.update_by_id(entity))?;
        Ok(affected == 1)
    }

    /// Insert when the key is unset, otherwise update by key.
    pub fn save_or_update<M: Entity>(&self, entity: &mut M) -> Result<bool> {
        if entity.has_primary_key() {
            self.update_by_id(entity)
        } else {
            self.save(entity)
        }
    }

    /// Delete one row by key; `true` when exactly one row was removed.
    #[tracing::instrument(level = "debug", skip_all, fields(entity = type_name::<M>()))]
    pub fn remove_by_id<M: Entity>(&self, id: impl Into<Value>) -> Result<bool> {
        let id = id.into();
        let affected = self.execute::<M, _>(|mapper| mapper.delete_by_id(&id))?;
        Ok(affected == 1)
    }

    /// Delete the rows whose keys are in `ids`; `true` when any row was
    /// removed.
    #[tracing::instrument(level = "debug", skip_all, fields(entity = type_name::<M>()))]
    pub fn remove_by_ids<M, I>(&self, ids: I) -> Result<bool>
    where
        M: Entity,
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let ids = collect_ids(ids, "remove_by_ids")?;
        let affected = self.execute::<M, _>(|mapper| mapper.delete_batch_ids(&ids))?;
        Ok(affected > 0)
    }

    /// Entities matching `wrapper`.
    #[tracing::instrument(level = "debug", skip_all, fields(entity = type_name::<M>()))]
    pub fn list<M: Entity, C>(&self, wrapper: &QueryWrapper<M, C>) -> Result<Vec<M>> {
        self.execute::<M, _>(|mapper| mapper.select_list(wrapper.criteria()))
    }

    /// At most one entity matching `wrapper`; several is an error.
    #[tracing::instrument(level = "debug", skip_all, fields(entity = type_name::<M>()))]
    pub fn one<M: Entity, C>(&self, wrapper: &QueryWrapper<M, C>) -> Result<Option<M>> {
        self.execute::<M, _>(|mapper| mapper.select_one(wrapper.criteria()))
    }

    /// Number of rows matching `wrapper`.
    #[tracing::instrument(level = "debug", skip_all, fields(entity = type_name::<M>()))]
    pub fn count<M: Entity, C>(&self, wrapper: &QueryWrapper<M, C>) -> Result<u64> {
        self.execute::<M, _>(|mapper| mapper.select_count(wrapper.criteria()))
    }

    /// Whether any row matches `wrapper`.
    pub fn exists<M: Entity, C>(&self, wrapper: &QueryWrapper<M, C>) -> Result<bool> {
        self.execute::<M, _>(|mapper| mapper.exists(wrapper.criteria()))
    }

    /// Fill `page` with the rows matching `wrapper`.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(entity = type_name::<M>(), current = page.current, size = page.size)
    )]
    pub fn page<M: Entity, C>(
        &self,
        page: Page<M>,
        wrapper: &QueryWrapper<M, C>,
    ) -> Result<Page<M>> {
        self.execute::<M, _>(|mapper| mapper.select_page(page, wrapper.criteria()))
    }

    /// First selected column of each matching row, NULLs dropped, mapped
    /// through `f`.
    #[tracing::instrument(level = "debug", skip_all, fields(entity = type_name::<M>()))]
    pub fn list_objs<M, C, T>(
        &self,
        wrapper: &QueryWrapper<M, C>,
        f: impl FnMut(Value) -> T,
    ) -> Result<Vec<T>>
    where
        M: Entity,
    {
        let values = self.execute::<M, _>(|mapper| mapper.select_objs(wrapper.criteria()))?;
        Ok(values
            .into_iter()
            .filter(|value| !value.is_null())
            .map(f)
            .collect())
    }

    /// Matching rows as column-name maps.
    #[tracing::instrument(level = "debug", skip_all, fields(entity = type_name::<M>()))]
    pub fn list_maps<M: Entity, C>(
        &self,
        wrapper: &QueryWrapper<M, C>,
    ) -> Result<Vec<HashMap<String, Value>>> {
        let rows = self.execute::<M, _>(|mapper| mapper.select_maps(wrapper.criteria()))?;
        Ok(rows.into_iter().map(|row| row.into_map()).collect())
    }

    /// Apply `wrapper`'s assignments, plus the non-NULL fields of `entity`
    /// when given, to every matching row. `true` when any row changed.
    #[tracing::instrument(level = "debug", skip_all, fields(entity = type_name::<M>()))]
    pub fn update_with<M: Entity, C>(
        &self,
        entity: Option<&M>,
        wrapper: &UpdateWrapper<M, C>,
    ) -> Result<bool> {
        let affected =
            self.execute::<M, _>(|mapper| mapper.update(entity, wrapper.update_criteria()))?;
        Ok(affected > 0)
    }

    /// Delete every row matching `wrapper`. `true` when any row was removed.
    #[tracing::instrument(level = "debug", skip_all, fields(entity = type_name::<M>()))]
    pub fn remove_with<M: Entity, C>(&self, wrapper: &QueryWrapper<M, C>) -> Result<bool> {
        let affected = self.execute::<M, _>(|mapper| mapper.delete(wrapper.criteria()))?;
        Ok(affected > 0)
    }
}
