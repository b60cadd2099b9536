//! Mapper binding: turning a mapper identifier and an open session into a
//! typed [`Mapper`] for one entity.
//!
//! Factories are registered under the mapper identifier carried by each
//! entity's table metadata. They are stored type-erased, since one registry
//! serves every entity type, and recovered by downcasting at bind time. A
//! bind never caches: each call builds a new mapper borrowing the session it
//! was given.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use sqlmapper_core::{Entity, Error, Result, TableMetadata};
use sqlmapper_query::Mapper;

/// Builds a mapper for `M` over a borrowed session.
pub type MapperFactory<S, M> =
    dyn for<'s> Fn(&'s mut S, Arc<TableMetadata>) -> Box<dyn Mapper<M> + 's> + Send + Sync;

struct Registration<S, M: Entity> {
    factory: Box<MapperFactory<S, M>>,
}

struct Slot {
    entity: &'static str,
    registration: Box<dyn Any + Send + Sync>,
}

/// Mapper factories keyed by mapper identifier, for sessions of type `S`.
pub struct MapperRegistry<S> {
    slots: HashMap<String, Slot>,
    _session: std::marker::PhantomData<fn(&mut S)>,
}

impl<S: 'static> MapperRegistry<S> {
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
            _session: std::marker::PhantomData,
        }
    }

    /// Register `factory` as the mapper for `M` under `mapper_id`.
    ///
    /// A second registration for the same identifier replaces the first.
    pub fn register<M, F>(&mut self, mapper_id: impl Into<String>, factory: F)
    where
        M: Entity,
        F: for<'s> Fn(&'s mut S, Arc<TableMetadata>) -> Box<dyn Mapper<M> + 's>
            + Send
            + Sync
            + 'static,
    {
        let mapper_id = mapper_id.into();
        let entity = std::any::type_name::<M>();
        tracing::debug!(mapper = %mapper_id, entity, "Registered mapper");
        let registration: Registration<S, M> = Registration {
            factory: Box::new(factory),
        };
        self.slots.insert(
            mapper_id,
            Slot {
                entity,
                registration: Box::new(registration),
            },
        );
    }

    pub fn contains(&self, mapper_id: &str) -> bool {
        self.slots.contains_key(mapper_id)
    }

    /// Entity type registered under `mapper_id`.
    pub fn entity_for(&self, mapper_id: &str) -> Option<&'static str> {
        self.slots.get(mapper_id).map(|slot| slot.entity)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Bind a fresh mapper for `M` to `session`.
    #[allow(clippy::result_large_err)]
    pub fn bind<'s, M: Entity>(
        &self,
        meta: &Arc<TableMetadata>,
        session: &'s mut S,
    ) -> Result<Box<dyn Mapper<M> + 's>> {
        let entity = std::any::type_name::<M>();
        let slot = self.slots.get(meta.mapper_id).ok_or_else(|| {
            Error::mapper_bind(entity, meta.mapper_id, "no mapper registered")
        })?;
        let registration = slot
            .registration
            .downcast_ref::<Registration<S, M>>()
            .ok_or_else(|| {
                Error::mapper_bind(
                    entity,
                    meta.mapper_id,
                    format!(
                        "mapper is registered for {} and does not implement Mapper<{entity}>",
                        slot.entity
                    ),
                )
            })?;
        tracing::trace!(mapper = %meta.mapper_id, entity, "Bound mapper");
        Ok((registration.factory)(session, Arc::clone(meta)))
    }
}

impl<S: 'static> Default for MapperRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for MapperRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&str> = self.slots.keys().map(String::as_str).collect();
        ids.sort_unstable();
        f.debug_struct("MapperRegistry").field("mappers", &ids).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlmapper_core::{FieldInfo, Row, StatementId, Value};
    use sqlmapper_query::{Criteria, UpdateCriteria};

    struct Scratch {
        binds: u32,
    }

    struct Widget;
    struct Gadget;

    macro_rules! entity {
        ($ty:ident, $table:literal) => {
            impl Entity for $ty {
                const TABLE_NAME: &'static str = $table;
                const PRIMARY_KEY: &'static str = "id";

                fn fields() -> &'static [FieldInfo] {
                    static FIELDS: &[FieldInfo] = &[FieldInfo::new("id", "id").primary_key(true)];
                    FIELDS
                }

                fn to_row(&self) -> Vec<(&'static str, Value)> {
                    vec![("id", Value::Int(1))]
                }

                fn from_row(_row: &Row) -> Result<Self> {
                    Ok($ty)
                }

                fn primary_key_value(&self) -> Value {
                    Value::Int(1)
                }
            }
        };
    }

    entity!(Widget, "widgets");
    entity!(Gadget, "gadgets");

    struct CountingMapper<'s> {
        session: &'s mut Scratch,
    }

    impl<M: Entity> Mapper<M> for CountingMapper<'_> {
        fn namespace(&self) -> &str {
            M::MAPPER
        }
        fn insert(&mut self, _entity: &mut M) -> Result<u64> {
            self.session.binds += 100;
            Ok(1)
        }
        fn update_by_id(&mut self, _entity: &M) -> Result<u64> {
            Ok(0)
        }
        fn update(&mut self, _entity: Option<&M>, _update: &UpdateCriteria) -> Result<u64> {
            Ok(0)
        }
        fn delete_by_id(&mut self, _id: &Value) -> Result<u64> {
            Ok(0)
        }
        fn delete_batch_ids(&mut self, _ids: &[Value]) -> Result<u64> {
            Ok(0)
        }
        fn delete(&mut self, _criteria: &Criteria) -> Result<u64> {
            Ok(0)
        }
        fn select_by_id(&mut self, _id: &Value) -> Result<Option<M>> {
            Ok(None)
        }
        fn select_batch_ids(&mut self, _ids: &[Value]) -> Result<Vec<M>> {
            Ok(Vec::new())
        }
        fn select_list(&mut self, _criteria: &Criteria) -> Result<Vec<M>> {
            Ok(Vec::new())
        }
        fn select_count(&mut self, _criteria: &Criteria) -> Result<u64> {
            Ok(0)
        }
        fn select_objs(&mut self, _criteria: &Criteria) -> Result<Vec<Value>> {
            Ok(Vec::new())
        }
        fn select_maps(&mut self, _criteria: &Criteria) -> Result<Vec<Row>> {
            Ok(Vec::new())
        }
        fn insert_batch(&mut self, _statement: &StatementId, _entities: &mut [M]) -> Result<u64> {
            Ok(0)
        }
        fn update_batch_by_id(&mut self, _statement: &StatementId, _entities: &[M]) -> Result<u64> {
            Ok(0)
        }
    }

    fn counting<M: Entity>(session: &mut Scratch, _meta: Arc<TableMetadata>) -> Box<dyn Mapper<M> + '_> {
        session.binds += 1;
        Box::new(CountingMapper { session })
    }

    fn meta<M: Entity>() -> Arc<TableMetadata> {
        Arc::new(TableMetadata::of::<M>().unwrap())
    }

    #[test]
    fn test_bind_builds_a_new_mapper_each_time() {
        let mut registry = MapperRegistry::<Scratch>::new();
        registry.register::<Widget, _>(Widget::MAPPER, counting::<Widget>);
        let meta = meta::<Widget>();
        let mut session = Scratch { binds: 0 };

        {
            let mut mapper = registry.bind::<Widget>(&meta, &mut session).unwrap();
            assert_eq!(mapper.insert(&mut Widget).unwrap(), 1);
        }
        registry.bind::<Widget>(&meta, &mut session).unwrap();
        assert_eq!(session.binds, 102);
        assert_eq!(registry.entity_for("widgets"), Some(std::any::type_name::<Widget>()));
    }

    #[test]
    fn test_unknown_mapper_id() {
        let registry = MapperRegistry::<Scratch>::new();
        let mut session = Scratch { binds: 0 };
        let err = registry.bind::<Widget>(&meta::<Widget>(), &mut session).err().unwrap();
        assert!(err.is_mapper_bind());
        assert!(err.to_string().contains("no mapper registered"));
    }

    #[test]
    fn test_mapper_for_other_entity() {
        let mut registry = MapperRegistry::<Scratch>::new();
        // the gadget mapper squats on the widget identifier
        registry.register::<Gadget, _>(Widget::MAPPER, counting::<Gadget>);
        let mut session = Scratch { binds: 0 };
        let err = registry.bind::<Widget>(&meta::<Widget>(), &mut session).err().unwrap();
        assert!(err.is_mapper_bind());
        assert!(err.to_string().contains("does not implement"));
        assert_eq!(session.binds, 0);
    }
}
