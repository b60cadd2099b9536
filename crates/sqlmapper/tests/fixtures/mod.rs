//! Shared test fixtures: a session provider that records every open, close
//! and mapper call, and an in-memory mapper over it.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard};

use sqlmapper::{
    Criteria, Db, DbConfig, Entity, Error, Mapper, Result, Row, Session, SessionId,
    SessionProvider, SqlMethod, StatementId, TableMetadata, UpdateCriteria, Value,
};
use sqlmapper_core::{ConnectionError, ConnectionErrorKind};

#[derive(Entity, Debug, Clone, PartialEq)]
#[entity(table = "users")]
pub struct User {
    #[entity(primary_key, auto_increment)]
    pub id: Option<i64>,
    pub name: String,
    pub age: Option<i32>,
}

impl User {
    pub fn new(name: &str, age: i32) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            age: Some(age),
        }
    }
}

#[derive(Entity, Debug, Clone, PartialEq)]
#[entity(table = "orders", mapper = "OrderMapper")]
pub struct Order {
    #[entity(primary_key, auto_increment)]
    pub id: Option<i64>,
    pub user_id: i64,
    pub total: f64,
}

/// One mapper call as seen by the fake backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub session: SessionId,
    /// Serial of the mapper instance that made the call
    pub mapper: usize,
    pub table: &'static str,
    pub method: &'static str,
    /// Entities or ids the call carried
    pub items: usize,
}

impl Call {
    pub fn is_write(&self) -> bool {
        matches!(
            self.method,
            "insert"
                | "updateById"
                | "update"
                | "deleteById"
                | "deleteBatchIds"
                | "delete"
                | "insertBatch"
                | "updateBatchById"
        )
    }
}

type StoredRow = Vec<(&'static str, Value)>;

#[derive(Debug, Default)]
pub struct Store {
    tables: HashMap<&'static str, BTreeMap<i64, StoredRow>>,
    next_id: i64,
    pub calls: Vec<Call>,
    /// One entry per mapper bind: (serial, session, table)
    pub binds: Vec<(usize, SessionId, &'static str)>,
    pub opened: Vec<(SessionId, String)>,
    pub closed: Vec<SessionId>,
    /// Mapper method that fails when called
    pub fail_method: Option<&'static str>,
    /// 1-based batch call that fails
    pub fail_batch_at: Option<usize>,
    batch_calls: usize,
    pub fail_close: bool,
}

impl Store {
    pub fn rows(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, BTreeMap::len)
    }

    pub fn writes(&self) -> usize {
        self.calls.iter().filter(|c| c.is_write()).count()
    }

    pub fn calls_to(&self, method: &str) -> Vec<Call> {
        self.calls
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    fn insert<M: Entity>(&mut self, table: &'static str, entity: &mut M) {
        let id = match entity.primary_key_value().as_i64() {
            Some(id) if id != 0 => {
                self.next_id = self.next_id.max(id);
                id
            }
            _ => {
                self.next_id += 1;
                entity.set_generated_key(self.next_id);
                self.next_id
            }
        };
        self.tables
            .entry(table)
            .or_default()
            .insert(id, entity.to_row());
    }

    fn merge(&mut self, table: &'static str, id: i64, values: &[(&str, Value)]) -> bool {
        let Some(row) = self.tables.get_mut(table).and_then(|t| t.get_mut(&id)) else {
            return false;
        };
        for (column, value) in values {
            if let Some(slot) = row.iter_mut().find(|(c, _)| c == column) {
                slot.1 = value.clone();
            }
        }
        true
    }
}

/// Session provider recording every session it opens and closes.
#[derive(Debug, Default, Clone)]
pub struct FakeProvider {
    store: Arc<Mutex<Store>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap()
    }
}

impl SessionProvider for FakeProvider {
    type Session = FakeSession;

    fn open_session(&self, data_source: &str) -> Result<FakeSession> {
        let id = SessionId::next();
        self.store().opened.push((id, data_source.to_string()));
        Ok(FakeSession {
            id,
            data_source: data_source.to_string(),
            store: Arc::clone(&self.store),
        })
    }

    fn close_session(&self, session: FakeSession) -> Result<()> {
        let mut store = self.store();
        store.closed.push(session.id);
        if store.fail_close {
            return Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Close,
                message: "injected close failure".to_string(),
                source: None,
            }));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct FakeSession {
    id: SessionId,
    data_source: String,
    store: Arc<Mutex<Store>>,
}

impl Session for FakeSession {
    fn session_id(&self) -> SessionId {
        self.id
    }

    fn data_source(&self) -> &str {
        &self.data_source
    }
}

/// Mapper keeping rows in the fake session's store.
///
/// Criteria with a WHERE clause are not evaluated; such calls fail.
pub struct MemoryMapper<'s, M> {
    session: &'s mut FakeSession,
    meta: Arc<TableMetadata>,
    serial: usize,
    _entity: PhantomData<fn() -> M>,
}

pub fn memory_mapper<M: Entity>(
    session: &mut FakeSession,
    meta: Arc<TableMetadata>,
) -> Box<dyn Mapper<M> + '_> {
    let serial = {
        let mut store = session.store.lock().unwrap();
        let serial = store.binds.len() + 1;
        store.binds.push((serial, session.id, meta.table_name));
        serial
    };
    Box::new(MemoryMapper {
        session,
        meta,
        serial,
        _entity: PhantomData,
    })
}

fn unsupported(criteria: &Criteria) -> Result<()> {
    if criteria.where_expr().is_some() {
        return Err(Error::Custom(
            "memory mapper does not evaluate conditions".to_string(),
        ));
    }
    Ok(())
}

fn to_entity<M: Entity>(row: &StoredRow) -> Result<M> {
    M::from_row(&to_row(row))
}

fn to_row(row: &StoredRow) -> Row {
    Row::new(
        row.iter().map(|(c, _)| (*c).to_string()).collect(),
        row.iter().map(|(_, v)| v.clone()).collect(),
    )
}

impl<M: Entity> MemoryMapper<'_, M> {
    fn record(&mut self, method: &'static str, items: usize) -> Result<MutexGuard<'_, Store>> {
        let mut store = self.session.store.lock().unwrap();
        store.calls.push(Call {
            session: self.session.id,
            mapper: self.serial,
            table: self.meta.table_name,
            method,
            items,
        });
        if store.fail_method == Some(method) {
            return Err(Error::Custom(format!("injected failure in {method}")));
        }
        Ok(store)
    }

    fn rows(store: &Store, table: &str) -> Vec<StoredRow> {
        store
            .tables
            .get(table)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default()
    }

    fn changes(entity: &M) -> Vec<(&'static str, Value)> {
        entity
            .to_row()
            .into_iter()
            .filter(|(column, value)| *column != M::PRIMARY_KEY && !value.is_null())
            .collect()
    }
}

impl<M: Entity> Mapper<M> for MemoryMapper<'_, M> {
    fn namespace(&self) -> &str {
        self.meta.mapper_id
    }

    fn insert(&mut self, entity: &mut M) -> Result<u64> {
        let table = self.meta.table_name;
        let mut store = self.record("insert", 1)?;
        store.insert(table, entity);
        Ok(1)
    }

    fn update_by_id(&mut self, entity: &M) -> Result<u64> {
        let table = self.meta.table_name;
        let mut store = self.record("updateById", 1)?;
        let Some(id) = entity.primary_key_value().as_i64() else {
            return Ok(0);
        };
        Ok(u64::from(store.merge(table, id, &Self::changes(entity))))
    }

    fn update(&mut self, entity: Option<&M>, update: &UpdateCriteria) -> Result<u64> {
        let table = self.meta.table_name;
        let mut store = self.record("update", 0)?;
        unsupported(&update.criteria)?;
        let mut values: Vec<(&str, Value)> = entity.map(Self::changes).unwrap_or_default();
        values.extend(update.assignments.iter().map(|(c, v)| (c.as_str(), v.clone())));
        let ids: Vec<i64> = store
            .tables
            .get(table)
            .map(|t| t.keys().copied().collect())
            .unwrap_or_default();
        for id in &ids {
            store.merge(table, *id, &values);
        }
        Ok(ids.len() as u64)
    }

    fn delete_by_id(&mut self, id: &Value) -> Result<u64> {
        let table = self.meta.table_name;
        let mut store = self.record("deleteById", 1)?;
        let removed = id
            .as_i64()
            .and_then(|id| store.tables.get_mut(table)?.remove(&id));
        Ok(u64::from(removed.is_some()))
    }

    fn delete_batch_ids(&mut self, ids: &[Value]) -> Result<u64> {
        let table = self.meta.table_name;
        let mut store = self.record("deleteBatchIds", ids.len())?;
        let Some(rows) = store.tables.get_mut(table) else {
            return Ok(0);
        };
        let removed = ids
            .iter()
            .filter_map(Value::as_i64)
            .filter(|id| rows.remove(id).is_some())
            .count();
        Ok(removed as u64)
    }

    fn delete(&mut self, criteria: &Criteria) -> Result<u64> {
        let table = self.meta.table_name;
        let mut store = self.record("delete", 0)?;
        unsupported(criteria)?;
        Ok(store.tables.remove(table).map_or(0, |t| t.len() as u64))
    }

    fn select_by_id(&mut self, id: &Value) -> Result<Option<M>> {
        let table = self.meta.table_name;
        let store = self.record("selectById", 1)?;
        id.as_i64()
            .and_then(|id| store.tables.get(table)?.get(&id))
            .map(to_entity::<M>)
            .transpose()
    }

    fn select_batch_ids(&mut self, ids: &[Value]) -> Result<Vec<M>> {
        let table = self.meta.table_name;
        let store = self.record("selectBatchIds", ids.len())?;
        let Some(rows) = store.tables.get(table) else {
            return Ok(Vec::new());
        };
        ids.iter()
            .filter_map(Value::as_i64)
            .filter_map(|id| rows.get(&id))
            .map(to_entity::<M>)
            .collect()
    }

    fn select_list(&mut self, criteria: &Criteria) -> Result<Vec<M>> {
        let table = self.meta.table_name;
        let store = self.record("selectList", 0)?;
        unsupported(criteria)?;
        let limit = criteria.limit.map_or(usize::MAX, |n| n as usize);
        Self::rows(&store, table)
            .iter()
            .take(limit)
            .map(to_entity::<M>)
            .collect()
    }

    fn select_count(&mut self, criteria: &Criteria) -> Result<u64> {
        let table = self.meta.table_name;
        let store = self.record("selectCount", 0)?;
        unsupported(criteria)?;
        Ok(store.rows(table) as u64)
    }

    fn select_objs(&mut self, criteria: &Criteria) -> Result<Vec<Value>> {
        let table = self.meta.table_name;
        let store = self.record("selectObjs", 0)?;
        unsupported(criteria)?;
        let column = criteria.select.first().cloned();
        Ok(Self::rows(&store, table)
            .into_iter()
            .filter_map(|row| match &column {
                Some(column) => row.into_iter().find(|(c, _)| *c == column.as_str()).map(|(_, v)| v),
                None => row.into_iter().next().map(|(_, v)| v),
            })
            .collect())
    }

    fn select_maps(&mut self, criteria: &Criteria) -> Result<Vec<Row>> {
        let table = self.meta.table_name;
        let store = self.record("selectMaps", 0)?;
        unsupported(criteria)?;
        Ok(Self::rows(&store, table).iter().map(to_row).collect())
    }

    fn insert_batch(&mut self, statement: &StatementId, entities: &mut [M]) -> Result<u64> {
        Mapper::<M>::check_statement(self, statement, SqlMethod::Insert)?;
        let table = self.meta.table_name;
        let mut store = self.record("insertBatch", entities.len())?;
        store.batch_calls += 1;
        if store.fail_batch_at == Some(store.batch_calls) {
            return Err(Error::Custom(format!(
                "injected failure in batch {}",
                store.batch_calls
            )));
        }
        for entity in entities.iter_mut() {
            store.insert(table, entity);
        }
        Ok(entities.len() as u64)
    }

    fn update_batch_by_id(&mut self, statement: &StatementId, entities: &[M]) -> Result<u64> {
        Mapper::<M>::check_statement(self, statement, SqlMethod::UpdateById)?;
        let table = self.meta.table_name;
        let mut store = self.record("updateBatchById", entities.len())?;
        store.batch_calls += 1;
        if store.fail_batch_at == Some(store.batch_calls) {
            return Err(Error::Custom(format!(
                "injected failure in batch {}",
                store.batch_calls
            )));
        }
        let mut changed = 0;
        for entity in entities {
            if let Some(id) = entity.primary_key_value().as_i64() {
                changed += u64::from(store.merge(table, id, &Self::changes(entity)));
            }
        }
        Ok(changed)
    }
}

/// A `Db` over a fresh fake provider with `User` and `Order` registered.
pub fn fake_db() -> Db<FakeProvider> {
    fake_db_with(DbConfig::default())
}

pub fn fake_db_with(config: DbConfig) -> Db<FakeProvider> {
    Db::builder(FakeProvider::new())
        .config(config)
        .entity_with::<User, _>(memory_mapper::<User>)
        .entity_with::<Order, _>(memory_mapper::<Order>)
        .build()
        .unwrap()
}
