//! Typed table mappers.
//!
//! [`Mapper`] is the per-entity set of primitive statements the façade
//! drives. [`SqlMapper`] implements it for any [`Connection`] by rendering
//! SQL from the entity's [`TableMetadata`].

use std::collections::HashMap;
use std::sync::Arc;

use crate::builder::StatementBuilder;
use crate::criteria::{Criteria, UpdateCriteria};
use crate::page::Page;
use sqlmapper_core::{
    Connection, Entity, Error, Inserted, QueryErrorKind, Result, Row, SqlMethod, StatementId,
    TableMetadata, Value,
};

/// Primitive persistence operations for entity `M`.
///
/// A mapper is bound to one session and lives no longer than it. Row counts
/// are returned as reported by the backend.
#[allow(clippy::result_large_err)]
pub trait Mapper<M: Entity> {
    /// Mapper identifier that statement ids are namespaced by.
    fn namespace(&self) -> &str;

    /// Insert one entity, storing a generated key back into it.
    ///
    /// Returns the rows the backend reports as inserted.
    fn insert(&mut self, entity: &mut M) -> Result<u64>;

    /// Update the non-NULL fields of one entity by primary key.
    fn update_by_id(&mut self, entity: &M) -> Result<u64>;

    /// Update rows matching the criteria.
    fn update(&mut self, entity: Option<&M>, update: &UpdateCriteria) -> Result<u64>;

    fn delete_by_id(&mut self, id: &Value) -> Result<u64>;

    fn delete_batch_ids(&mut self, ids: &[Value]) -> Result<u64>;

    fn delete(&mut self, criteria: &Criteria) -> Result<u64>;

    fn select_by_id(&mut self, id: &Value) -> Result<Option<M>>;

    fn select_batch_ids(&mut self, ids: &[Value]) -> Result<Vec<M>>;

    fn select_list(&mut self, criteria: &Criteria) -> Result<Vec<M>>;

    fn select_count(&mut self, criteria: &Criteria) -> Result<u64>;

    /// First column of each matching row.
    fn select_objs(&mut self, criteria: &Criteria) -> Result<Vec<Value>>;

    /// Matching rows as raw column/value rows.
    fn select_maps(&mut self, criteria: &Criteria) -> Result<Vec<Row>>;

    /// Run the insert statement `statement` once per entity.
    fn insert_batch(&mut self, statement: &StatementId, entities: &mut [M]) -> Result<u64>;

    /// Run the update-by-id statement `statement` once per entity.
    fn update_batch_by_id(&mut self, statement: &StatementId, entities: &[M]) -> Result<u64>;

    /// At most one matching row; more than one is an error.
    fn select_one(&mut self, criteria: &Criteria) -> Result<Option<M>> {
        let mut rows = self.select_list(criteria)?;
        if rows.len() > 1 {
            return Err(Error::query(
                QueryErrorKind::TooManyRows,
                None,
                format!("expected one result, found {}", rows.len()),
            ));
        }
        Ok(rows.pop())
    }

    fn exists(&mut self, criteria: &Criteria) -> Result<bool> {
        Ok(self.select_count(criteria)? > 0)
    }

    /// Fill `page` with the rows of its window, and the total if requested.
    fn select_page(&mut self, mut page: Page<M>, criteria: &Criteria) -> Result<Page<M>> {
        if page.search_count {
            page.total = self.select_count(criteria)?;
        }
        page.records = if page.size == 0 {
            self.select_list(criteria)?
        } else if page.search_count && page.offset() >= page.total {
            Vec::new()
        } else {
            self.select_list(&criteria.paged(page.size, page.offset()))?
        };
        Ok(page)
    }

    /// Reject statements that belong to another mapper.
    fn check_statement(&self, statement: &StatementId, expected: SqlMethod) -> Result<()> {
        if statement.namespace() == self.namespace() && statement.method() == expected {
            Ok(())
        } else {
            Err(Error::query(
                QueryErrorKind::NotFound,
                None,
                format!(
                    "statement '{}' is not '{}.{}'",
                    statement,
                    self.namespace(),
                    expected.method()
                ),
            ))
        }
    }
}

/// SQL-generating mapper over a borrowed connection.
pub struct SqlMapper<'c, C: Connection + ?Sized> {
    conn: &'c mut C,
    meta: Arc<TableMetadata>,
}

impl<'c, C: Connection + ?Sized> SqlMapper<'c, C> {
    pub fn new(conn: &'c mut C, meta: Arc<TableMetadata>) -> Self {
        Self { conn, meta }
    }

    fn builder(&self) -> StatementBuilder<'_> {
        StatementBuilder::new(&self.meta, self.conn.dialect())
    }

    #[allow(clippy::result_large_err)]
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        tracing::trace!(table = self.meta.table_name, sql = sql, params = params.len(), "query");
        self.conn.query(sql, params)
    }

    #[allow(clippy::result_large_err)]
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        tracing::trace!(table = self.meta.table_name, sql = sql, params = params.len(), "execute");
        self.conn.execute(sql, params)
    }

    #[allow(clippy::result_large_err)]
    fn entities<M: Entity>(rows: &[Row]) -> Result<Vec<M>> {
        rows.iter().map(M::from_row).collect()
    }

    /// Run `f` inside a transaction, rolling back on error.
    #[allow(clippy::result_large_err)]
    fn transaction<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.conn.begin()?;
        match f(self) {
            Ok(value) => {
                self.conn.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.conn.rollback() {
                    tracing::warn!(error = %rollback, "Rollback failed");
                }
                Err(e)
            }
        }
    }
}

impl<M: Entity, C: Connection + ?Sized> Mapper<M> for SqlMapper<'_, C> {
    fn namespace(&self) -> &str {
        self.meta.mapper_id
    }

    fn insert(&mut self, entity: &mut M) -> Result<u64> {
        let (sql, params) = self.builder().insert(&entity.to_row());
        tracing::trace!(table = self.meta.table_name, sql = %sql, "insert");
        let inserted = self.conn.insert(&sql, &params)?;
        if inserted.changes > 0 && !entity.has_primary_key() {
            entity.set_generated_key(inserted.id);
        }
        Ok(inserted.changes)
    }

    fn update_by_id(&mut self, entity: &M) -> Result<u64> {
        let id = entity.primary_key_value();
        let statement = self.builder().update_by_id(&entity.to_row(), &id);
        match statement {
            Some((sql, params)) => self.execute(&sql, &params),
            None => Ok(0),
        }
    }

    fn update(&mut self, entity: Option<&M>, update: &UpdateCriteria) -> Result<u64> {
        let row = entity.map(Entity::to_row);
        let (sql, params) = self.builder().update(row.as_deref(), update)?;
        self.execute(&sql, &params)
    }

    fn delete_by_id(&mut self, id: &Value) -> Result<u64> {
        let (sql, params) = self.builder().delete_by_id(id);
        self.execute(&sql, &params)
    }

    fn delete_batch_ids(&mut self, ids: &[Value]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let (sql, params) = self.builder().delete_batch_ids(ids);
        self.execute(&sql, &params)
    }

    fn delete(&mut self, criteria: &Criteria) -> Result<u64> {
        let (sql, params) = self.builder().delete(criteria)?;
        self.execute(&sql, &params)
    }

    fn select_by_id(&mut self, id: &Value) -> Result<Option<M>> {
        let (sql, params) = self.builder().select_by_id(id);
        let rows = self.query(&sql, &params)?;
        rows.first().map(M::from_row).transpose()
    }

    fn select_batch_ids(&mut self, ids: &[Value]) -> Result<Vec<M>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let (sql, params) = self.builder().select_batch_ids(ids);
        let rows = self.query(&sql, &params)?;
        Self::entities(&rows)
    }

    fn select_list(&mut self, criteria: &Criteria) -> Result<Vec<M>> {
        let (sql, params) = self.builder().select(criteria)?;
        let rows = self.query(&sql, &params)?;
        Self::entities(&rows)
    }

    fn select_count(&mut self, criteria: &Criteria) -> Result<u64> {
        let (sql, params) = self.builder().count(criteria)?;
        let rows = self.query(&sql, &params)?;
        match rows.first() {
            Some(row) => row.get_as::<u64>(0),
            None => Ok(0),
        }
    }

    fn select_objs(&mut self, criteria: &Criteria) -> Result<Vec<Value>> {
        let (sql, params) = self.builder().select(criteria)?;
        let rows = self.query(&sql, &params)?;
        Ok(rows.into_iter().filter_map(Row::into_first).collect())
    }

    fn select_maps(&mut self, criteria: &Criteria) -> Result<Vec<Row>> {
        let (sql, params) = self.builder().select(criteria)?;
        self.query(&sql, &params)
    }

    fn insert_batch(&mut self, statement: &StatementId, entities: &mut [M]) -> Result<u64> {
        <Self as Mapper<M>>::check_statement(self, statement, SqlMethod::Insert)?;
        if entities.is_empty() {
            return Ok(0);
        }

        // Rows whose generated key is unset and rows carrying their own key
        // need different column lists; each group is one prepared statement.
        let rows: Vec<_> = entities.iter().map(Entity::to_row).collect();
        let mut groups: Vec<(Vec<&'static str>, Vec<usize>)> = Vec::new();
        {
            let builder = self.builder();
            for (index, row) in rows.iter().enumerate() {
                let columns = builder.insert_columns(row);
                match groups.iter_mut().find(|(c, _)| *c == columns) {
                    Some((_, members)) => members.push(index),
                    None => groups.push((columns, vec![index])),
                }
            }
        }

        let outcomes = self.transaction(|mapper| {
            let mut outcomes: Vec<Option<Inserted>> = vec![None; rows.len()];
            for (columns, members) in &groups {
                let sql = mapper.builder().insert_sql(columns);
                let param_sets: Vec<_> = members
                    .iter()
                    .map(|&i| StatementBuilder::values_for(columns, &rows[i]))
                    .collect();
                tracing::trace!(
                    statement = %statement,
                    sql = %sql,
                    rows = param_sets.len(),
                    "insert batch"
                );
                let generated = mapper.conn.insert_many(&sql, &param_sets)?;
                for (&i, outcome) in members.iter().zip(generated) {
                    outcomes[i] = Some(outcome);
                }
            }
            Ok(outcomes)
        })?;

        let mut inserted = 0;
        for (entity, outcome) in entities.iter_mut().zip(outcomes) {
            let Some(outcome) = outcome else { continue };
            inserted += outcome.changes;
            if outcome.changes > 0 && !entity.has_primary_key() {
                entity.set_generated_key(outcome.id);
            }
        }
        Ok(inserted)
    }

    fn update_batch_by_id(&mut self, statement: &StatementId, entities: &[M]) -> Result<u64> {
        <Self as Mapper<M>>::check_statement(self, statement, SqlMethod::UpdateById)?;

        // Entities with different NULL fields render different SETs; group
        // by SQL text so each distinct statement is prepared once.
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<Vec<Value>>> = HashMap::new();
        {
            let builder = self.builder();
            for entity in entities {
                let id = entity.primary_key_value();
                if let Some((sql, params)) = builder.update_by_id(&entity.to_row(), &id) {
                    if !groups.contains_key(&sql) {
                        order.push(sql.clone());
                    }
                    groups.entry(sql).or_default().push(params);
                }
            }
        }

        self.transaction(|mapper| {
            let mut affected = 0;
            for sql in &order {
                let param_sets = groups.get(sql).map(Vec::as_slice).unwrap_or_default();
                tracing::trace!(
                    statement = %statement,
                    sql = %sql,
                    rows = param_sets.len(),
                    "update batch"
                );
                affected += mapper.conn.execute_many(sql, param_sets)?.iter().sum::<u64>();
            }
            Ok(affected)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;
    use sqlmapper_core::{Dialect, FieldInfo};

    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        id: Option<i64>,
        body: Option<String>,
    }

    impl Entity for Note {
        const TABLE_NAME: &'static str = "notes";
        const PRIMARY_KEY: &'static str = "id";

        fn fields() -> &'static [FieldInfo] {
            static FIELDS: &[FieldInfo] = &[
                FieldInfo::new("id", "id").primary_key(true).auto_increment(true),
                FieldInfo::new("body", "body").nullable(true),
            ];
            FIELDS
        }

        fn to_row(&self) -> Vec<(&'static str, Value)> {
            vec![("id", self.id.into()), ("body", self.body.clone().into())]
        }

        fn from_row(row: &Row) -> Result<Self> {
            Ok(Self {
                id: row.get_named("id")?,
                body: row.get_named("body")?,
            })
        }

        fn primary_key_value(&self) -> Value {
            self.id.into()
        }

        fn set_generated_key(&mut self, id: i64) {
            self.id = Some(id);
        }
    }

    /// Records statements and answers from canned rows.
    #[derive(Default)]
    struct ScriptedConnection {
        log: Vec<String>,
        rows: Vec<Row>,
        next_id: i64,
        fail_execute: bool,
        /// Inserts report zero changes, like `INSERT OR IGNORE` on a conflict
        ignore_inserts: bool,
    }

    impl ScriptedConnection {
        fn next_insert(&mut self) -> Inserted {
            if self.ignore_inserts {
                return Inserted {
                    changes: 0,
                    id: self.next_id,
                };
            }
            self.next_id += 1;
            Inserted {
                changes: 1,
                id: self.next_id,
            }
        }
    }

    impl Connection for ScriptedConnection {
        fn dialect(&self) -> Dialect {
            Dialect::Sqlite
        }

        fn query(&mut self, sql: &str, _params: &[Value]) -> Result<Vec<Row>> {
            self.log.push(sql.to_string());
            Ok(self.rows.clone())
        }

        fn execute(&mut self, sql: &str, _params: &[Value]) -> Result<u64> {
            self.log.push(sql.to_string());
            if self.fail_execute {
                return Err(Error::query(QueryErrorKind::Database, Some(sql), "boom"));
            }
            Ok(1)
        }

        fn insert(&mut self, sql: &str, _params: &[Value]) -> Result<Inserted> {
            self.log.push(sql.to_string());
            Ok(self.next_insert())
        }

        fn execute_many(&mut self, sql: &str, param_sets: &[Vec<Value>]) -> Result<Vec<u64>> {
            self.log.push(format!("{sql} x{}", param_sets.len()));
            if self.fail_execute {
                return Err(Error::query(QueryErrorKind::Database, Some(sql), "boom"));
            }
            Ok(vec![1; param_sets.len()])
        }

        fn insert_many(&mut self, sql: &str, param_sets: &[Vec<Value>]) -> Result<Vec<Inserted>> {
            self.log.push(format!("{sql} x{}", param_sets.len()));
            Ok(param_sets.iter().map(|_| self.next_insert()).collect())
        }

        fn begin(&mut self) -> Result<()> {
            self.log.push("BEGIN".into());
            Ok(())
        }

        fn commit(&mut self) -> Result<()> {
            self.log.push("COMMIT".into());
            Ok(())
        }

        fn rollback(&mut self) -> Result<()> {
            self.log.push("ROLLBACK".into());
            Ok(())
        }
    }

    fn meta() -> Arc<TableMetadata> {
        Arc::new(TableMetadata::of::<Note>().unwrap())
    }

    fn note_row(id: i64, body: &str) -> Row {
        Row::new(
            vec!["id".into(), "body".into()],
            vec![Value::BigInt(id), Value::Text(body.into())],
        )
    }

    #[test]
    fn test_insert_backfills_key() {
        let mut conn = ScriptedConnection::default();
        let mut mapper = SqlMapper::new(&mut conn, meta());
        let mut note = Note {
            id: None,
            body: Some("hi".into()),
        };
        assert_eq!(Mapper::insert(&mut mapper, &mut note).unwrap(), 1);
        assert_eq!(note.id, Some(1));
        assert_eq!(conn.log, vec!["INSERT INTO \"notes\" (\"body\") VALUES (?1)"]);
    }

    #[test]
    fn test_insert_reports_backend_changes() {
        let mut conn = ScriptedConnection {
            ignore_inserts: true,
            ..ScriptedConnection::default()
        };
        let meta = meta();
        let statement = meta.statement(SqlMethod::Insert);
        let mut mapper = SqlMapper::new(&mut conn, Arc::clone(&meta));
        let mut note = Note {
            id: None,
            body: Some("dup".into()),
        };
        assert_eq!(Mapper::insert(&mut mapper, &mut note).unwrap(), 0);
        assert_eq!(note.id, None);

        let mut notes = vec![note.clone(), note.clone()];
        assert_eq!(mapper.insert_batch(&statement, &mut notes).unwrap(), 0);
        assert!(notes.iter().all(|n| n.id.is_none()));
    }

    #[test]
    fn test_select_one_rejects_multiple_rows() {
        let mut conn = ScriptedConnection {
            rows: vec![note_row(1, "a"), note_row(2, "b")],
            ..ScriptedConnection::default()
        };
        let mut mapper = SqlMapper::new(&mut conn, meta());
        let err = Mapper::<Note>::select_one(&mut mapper, &Criteria::new()).unwrap_err();
        assert!(matches!(
            err,
            Error::Query(ref q) if q.kind == QueryErrorKind::TooManyRows
        ));
    }

    #[test]
    fn test_select_objs_returns_first_column() {
        let mut conn = ScriptedConnection {
            rows: vec![
                Row::new(vec!["body".into()], vec![Value::Text("a".into())]),
                Row::new(vec!["body".into()], vec![Value::Null]),
            ],
            ..ScriptedConnection::default()
        };
        let mut mapper = SqlMapper::new(&mut conn, meta());
        let objs = Mapper::<Note>::select_objs(&mut mapper, &Criteria::new()).unwrap();
        assert_eq!(objs, vec![Value::Text("a".into()), Value::Null]);
    }

    #[test]
    fn test_insert_batch_groups_by_columns() {
        let mut conn = ScriptedConnection::default();
        let meta = meta();
        let statement = meta.statement(SqlMethod::Insert);
        let mut mapper = SqlMapper::new(&mut conn, Arc::clone(&meta));
        let mut notes = vec![
            Note { id: None, body: Some("a".into()) },
            Note { id: Some(50), body: Some("b".into()) },
            Note { id: None, body: Some("c".into()) },
        ];
        let n = mapper.insert_batch(&statement, &mut notes).unwrap();
        assert_eq!(n, 3);
        assert_eq!(notes[0].id, Some(1));
        assert_eq!(notes[1].id, Some(50));
        assert_eq!(notes[2].id, Some(2));
        assert_eq!(
            conn.log,
            vec![
                "BEGIN".to_string(),
                "INSERT INTO \"notes\" (\"body\") VALUES (?1) x2".to_string(),
                "INSERT INTO \"notes\" (\"id\", \"body\") VALUES (?1, ?2) x1".to_string(),
                "COMMIT".to_string(),
            ]
        );
    }

    #[test]
    fn test_update_batch_rolls_back_on_error() {
        let mut conn = ScriptedConnection {
            fail_execute: true,
            ..ScriptedConnection::default()
        };
        let meta = meta();
        let statement = meta.statement(SqlMethod::UpdateById);
        let mut mapper = SqlMapper::new(&mut conn, Arc::clone(&meta));
        let notes = vec![Note { id: Some(1), body: Some("x".into()) }];
        assert!(mapper.update_batch_by_id(&statement, &notes).is_err());
        assert_eq!(conn.log.last().map(String::as_str), Some("ROLLBACK"));
    }

    #[test]
    fn test_foreign_statement_rejected() {
        let mut conn = ScriptedConnection::default();
        let mut mapper = SqlMapper::new(&mut conn, meta());
        let foreign = StatementId::new("users", SqlMethod::Insert);
        let err = Mapper::<Note>::insert_batch(&mut mapper, &foreign, &mut []).unwrap_err();
        assert!(err.to_string().contains("users.insert"));
        let wrong_method = StatementId::new("notes", SqlMethod::Delete);
        assert!(Mapper::<Note>::update_batch_by_id(&mut mapper, &wrong_method, &[]).is_err());
    }

    #[test]
    fn test_page_skips_query_past_end() {
        let mut conn = ScriptedConnection {
            rows: vec![Row::new(vec!["COUNT(*)".into()], vec![Value::BigInt(3)])],
            ..ScriptedConnection::default()
        };
        let mut mapper = SqlMapper::new(&mut conn, meta());
        let mut criteria = Criteria::new();
        criteria.predicate.push(Expr::col("body").is_not_null());
        let page = Mapper::<Note>::select_page(&mut mapper, Page::new(5, 2), &criteria).unwrap();
        assert_eq!(page.total, 3);
        assert!(page.records.is_empty());
        assert_eq!(conn.log.len(), 1);
    }
}
