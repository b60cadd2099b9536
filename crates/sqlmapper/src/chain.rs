//! Chain builders: a wrapper bound to a [`Db`] so a query or update can be
//! built and run in one expression.
//!
//! ```rust,ignore
//! let adults = db
//!     .lambda_query::<User>()
//!     .ge(User::AGE, 18)
//!     .order_by_asc(User::NAME)
//!     .list()?;
//!
//! db.update::<User>().eq("name", "old").set("name", "new").update()?;
//! ```

use std::fmt;

use sqlmapper_core::{Entity, Field, Result, SessionProvider, Value};
use sqlmapper_query::{
    Assignments, ColumnRef, Conditions, Criteria, Page, QueryClauses, QueryWrapper,
    UpdateCriteria, UpdateWrapper,
};

use crate::db::Db;

/// Query conditions for `M` bound to a [`Db`].
pub struct QueryChain<'d, P: SessionProvider, M, C = String> {
    db: &'d Db<P>,
    wrapper: QueryWrapper<M, C>,
}

/// Update assignments and conditions for `M` bound to a [`Db`].
pub struct UpdateChain<'d, P: SessionProvider, M, C = String> {
    db: &'d Db<P>,
    wrapper: UpdateWrapper<M, C>,
}

impl<P> Db<P>
where
    P: SessionProvider,
    P::Session: 'static,
{
    /// Query chain with string column names.
    pub fn query<M: Entity>(&self) -> QueryChain<'_, P, M> {
        QueryChain::new(self)
    }

    /// Query chain accepting only `Field<M>` columns.
    pub fn lambda_query<M: Entity>(&self) -> QueryChain<'_, P, M, Field<M>> {
        QueryChain::new(self)
    }

    /// Update chain with string column names.
    pub fn update<M: Entity>(&self) -> UpdateChain<'_, P, M> {
        UpdateChain::new(self)
    }

    /// Update chain accepting only `Field<M>` columns.
    pub fn lambda_update<M: Entity>(&self) -> UpdateChain<'_, P, M, Field<M>> {
        UpdateChain::new(self)
    }
}

#[allow(clippy::result_large_err)]
impl<'d, P, M, C> QueryChain<'d, P, M, C>
where
    P: SessionProvider,
    P::Session: 'static,
    M: Entity,
    C: ColumnRef,
{
    pub fn new(db: &'d Db<P>) -> Self {
        Self {
            db,
            wrapper: QueryWrapper::new(),
        }
    }

    /// The wrapper built so far.
    pub fn wrapper(&self) -> &QueryWrapper<M, C> {
        &self.wrapper
    }

    pub fn into_wrapper(self) -> QueryWrapper<M, C> {
        self.wrapper
    }

    pub fn list(&self) -> Result<Vec<M>> {
        self.db.list(&self.wrapper)
    }

    /// The single matching entity; more than one match is an error.
    pub fn one(&self) -> Result<Option<M>> {
        self.db.one(&self.wrapper)
    }

    /// Same as [`one`](Self::one): zero matches is `None`, more than one
    /// is a `TooManyRows` error.
    pub fn one_opt(&self) -> Result<Option<M>> {
        self.one()
    }

    pub fn count(&self) -> Result<u64> {
        self.db.count(&self.wrapper)
    }

    pub fn exists(&self) -> Result<bool> {
        self.db.exists(&self.wrapper)
    }

    pub fn page(&self, page: Page<M>) -> Result<Page<M>> {
        self.db.page(page, &self.wrapper)
    }

    /// First selected column of each matching row, NULLs dropped.
    pub fn objs<T>(&self, f: impl FnMut(Value) -> T) -> Result<Vec<T>> {
        self.db.list_objs(&self.wrapper, f)
    }

    /// Delete every matching row. `true` when any row was removed.
    pub fn remove(&self) -> Result<bool> {
        self.db.remove_with(&self.wrapper)
    }
}

impl<P: SessionProvider, M, C: ColumnRef> Conditions for QueryChain<'_, P, M, C> {
    type Column = C;

    fn criteria_mut(&mut self) -> &mut Criteria {
        self.wrapper.criteria_mut()
    }
}

impl<P: SessionProvider, M, C: ColumnRef> QueryClauses for QueryChain<'_, P, M, C> {}

impl<P: SessionProvider, M, C> fmt::Debug for QueryChain<'_, P, M, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryChain")
            .field("criteria", self.wrapper.criteria())
            .finish_non_exhaustive()
    }
}

#[allow(clippy::result_large_err)]
impl<'d, P, M, C> UpdateChain<'d, P, M, C>
where
    P: SessionProvider,
    P::Session: 'static,
    M: Entity,
{
    pub fn new(db: &'d Db<P>) -> Self {
        Self {
            db,
            wrapper: UpdateWrapper::new(),
        }
    }

    pub fn wrapper(&self) -> &UpdateWrapper<M, C> {
        &self.wrapper
    }

    pub fn into_wrapper(self) -> UpdateWrapper<M, C> {
        self.wrapper
    }

    /// Apply the assignments to every matching row. `true` when any row
    /// changed.
    pub fn update(&self) -> Result<bool> {
        self.db.update_with(None, &self.wrapper)
    }

    /// Apply the non-NULL fields of `entity` plus the assignments.
    pub fn update_entity(&self, entity: &M) -> Result<bool> {
        self.db.update_with(Some(entity), &self.wrapper)
    }

    /// Delete every matching row. `true` when any row was removed.
    pub fn remove(&self) -> Result<bool> {
        let criteria = self.wrapper.criteria();
        let affected = self.db.execute::<M, _>(|mapper| mapper.delete(criteria))?;
        Ok(affected > 0)
    }
}

impl<P: SessionProvider, M, C: ColumnRef> Conditions for UpdateChain<'_, P, M, C> {
    type Column = C;

    fn criteria_mut(&mut self) -> &mut Criteria {
        self.wrapper.criteria_mut()
    }
}

impl<P: SessionProvider, M, C: ColumnRef> Assignments for UpdateChain<'_, P, M, C> {
    fn update_mut(&mut self) -> &mut UpdateCriteria {
        self.wrapper.update_mut()
    }
}

impl<P: SessionProvider, M, C> fmt::Debug for UpdateChain<'_, P, M, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateChain")
            .field("update", self.wrapper.update_criteria())
            .finish_non_exhaustive()
    }
}
