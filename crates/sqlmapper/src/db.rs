//! The façade entry point.
//!
//! A [`Db`] owns a session provider plus the metadata and mapper registries,
//! and runs every operation through [`Db::execute`]: resolve the entity's
//! table metadata, open a session on its data source, bind a mapper, run the
//! operation, close the session.
//!
//! ```rust,ignore
//! use sqlmapper::prelude::*;
//!
//! let provider = SqliteSessionProvider::new()
//!     .data_source("default", SqliteConfig::file("app.db"))?;
//! let db = Db::builder(provider)
//!     .entity::<User>()
//!     .entity::<Order>()
//!     .build()?;
//!
//! let user = db.get_by_id::<User>(7)?;
//! ```

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use sqlmapper_core::{
    Connection, DEFAULT_DATA_SOURCE, Entity, Error, MetadataRegistry, Result, SessionGuard,
    SessionProvider, TableMetadata,
};
use sqlmapper_query::{Mapper, SqlMapper};

use crate::binder::MapperRegistry;
use crate::config::DbConfig;

/// Registers entities and mappers, then builds a [`Db`].
///
/// Registration errors are deferred and reported by [`DbBuilder::build`].
pub struct DbBuilder<P: SessionProvider> {
    provider: P,
    config: DbConfig,
    metadata: MetadataRegistry,
    mappers: MapperRegistry<P::Session>,
    error: Option<Error>,
}

impl<P> DbBuilder<P>
where
    P: SessionProvider,
    P::Session: 'static,
{
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            config: DbConfig::default(),
            metadata: MetadataRegistry::new(),
            mappers: MapperRegistry::new(),
            error: None,
        }
    }

    #[must_use]
    pub fn config(mut self, config: DbConfig) -> Self {
        self.config = config;
        self
    }

    /// Register `M` with the SQL-generating mapper.
    #[must_use]
    pub fn entity<M: Entity>(self) -> Self
    where
        P::Session: Connection,
    {
        self.entity_with::<M, _>(sql_mapper::<P::Session, M>)
    }

    /// Register `M` with a custom mapper factory.
    #[must_use]
    pub fn entity_with<M, F>(mut self, factory: F) -> Self
    where
        M: Entity,
        F: for<'s> Fn(&'s mut P::Session, Arc<TableMetadata>) -> Box<dyn Mapper<M> + 's>
            + Send
            + Sync
            + 'static,
    {
        if self.error.is_some() {
            return self;
        }
        let meta = match self.metadata.register::<M>() {
            Ok(meta) => meta,
            Err(e) => {
                self.error = Some(e);
                return self;
            }
        };
        let entity = type_name::<M>();
        if let Some(other) = self.mappers.entity_for(meta.mapper_id) {
            if other != entity {
                self.error = Some(Error::config(format!(
                    "mapper '{}' of {entity} is already registered for {other}",
                    meta.mapper_id
                )));
                return self;
            }
        }
        self.mappers.register::<M, F>(meta.mapper_id, factory);
        self
    }

    #[allow(clippy::result_large_err)]
    pub fn build(self) -> Result<Db<P>> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let config = self.config.validate()?;
        tracing::debug!(
            entities = self.metadata.len(),
            batch_size = config.batch_size,
            default_data_source = %config.default_data_source,
            "Built Db"
        );
        Ok(Db {
            provider: self.provider,
            metadata: self.metadata,
            mappers: self.mappers,
            config,
        })
    }
}

impl<P: SessionProvider> fmt::Debug for DbBuilder<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbBuilder")
            .field("config", &self.config)
            .field("entities", &self.metadata.len())
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

fn sql_mapper<S, M>(session: &mut S, meta: Arc<TableMetadata>) -> Box<dyn Mapper<M> + '_>
where
    S: Connection + 'static,
    M: Entity,
{
    Box::new(SqlMapper::new(session, meta))
}

/// Data-access façade over a session provider.
///
/// Every call opens its own session and closes it before returning, so a
/// `Db` can be shared across threads when its provider can.
pub struct Db<P: SessionProvider> {
    provider: P,
    metadata: MetadataRegistry,
    mappers: MapperRegistry<P::Session>,
    config: DbConfig,
}

impl<P> Db<P>
where
    P: SessionProvider,
    P::Session: 'static,
{
    pub fn builder(provider: P) -> DbBuilder<P> {
        DbBuilder::new(provider)
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Table metadata of `M`.
    #[allow(clippy::result_large_err)]
    pub fn metadata<M: Entity>(&self) -> Result<Arc<TableMetadata>> {
        self.metadata.resolve::<M>()
    }

    /// Data source sessions for `meta`'s entity are opened on.
    pub fn data_source_for<'a>(&'a self, meta: &'a TableMetadata) -> &'a str {
        if meta.data_source == DEFAULT_DATA_SOURCE {
            &self.config.default_data_source
        } else {
            meta.data_source
        }
    }

    /// Run `op` against a mapper for `M` on a fresh session.
    ///
    /// The session is closed on every path. When `op` succeeds but the close
    /// fails, the close error is returned; when both fail, the error from
    /// `op` is returned and the close error is logged.
    #[tracing::instrument(level = "trace", skip_all, fields(entity = type_name::<M>()))]
    #[allow(clippy::result_large_err)]
    pub fn execute<M, R>(&self, op: impl FnOnce(&mut dyn Mapper<M>) -> Result<R>) -> Result<R>
    where
        M: Entity,
    {
        let meta = self.metadata.resolve::<M>()?;
        let mut guard = SessionGuard::open(&self.provider, self.data_source_for(&meta))?;
        let result = {
            let session = guard.session_mut()?;
            let mut mapper = self.mappers.bind::<M>(&meta, session)?;
            op(&mut *mapper)
        };
        match result {
            Ok(value) => {
                guard.release()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(close) = guard.release() {
                    tracing::warn!(
                        entity = type_name::<M>(),
                        error = %close,
                        "Failed to close session after failed operation"
                    );
                }
                Err(e)
            }
        }
    }
}

impl<P: SessionProvider> fmt::Debug for Db<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db")
            .field("config", &self.config)
            .field("entities", &self.metadata.len())
            .field("mappers", &self.mappers)
            .finish_non_exhaustive()
    }
}
