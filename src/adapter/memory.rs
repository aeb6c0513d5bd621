//! In-process storage adapter.
//!
//! Records live in an ordered in-memory table guarded by a `RwLock`. Used as
//! the fallback backend when no external driver is configured, and as the
//! store behind tenant connections opened by `MemoryConnectionFactory`.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::adapter::{FindQuery, StorageAdapter};
use crate::document::{Document, get_path, set_path, unset_path};
use crate::error::{DbError, DbResult};

const NATIVE_ID: &str = "_id";

/// Memory-backed [`StorageAdapter`].
#[derive(Default)]
pub struct MemoryAdapter {
    records: RwLock<Vec<Value>>,
    connected: AtomicBool,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(AtomicOrdering::SeqCst)
    }

    fn read(&self, operation: &str) -> DbResult<RwLockReadGuard<'_, Vec<Value>>> {
        self.records
            .read()
            .map_err(|e| DbError::adapter(operation, anyhow::anyhow!(e.to_string())))
    }

    fn write(&self, operation: &str) -> DbResult<RwLockWriteGuard<'_, Vec<Value>>> {
        self.records
            .write()
            .map_err(|e| DbError::adapter(operation, anyhow::anyhow!(e.to_string())))
    }

    fn prepare_insert(records: &[Value], entity: Document) -> DbResult<Value> {
        let mut record = Value::Object(entity);
        let id = match record.get(NATIVE_ID) {
            Some(id) if !id.is_null() => id.clone(),
            _ => {
                let id = Value::String(Uuid::new_v4().to_string());
                set_path(&mut record, NATIVE_ID, id.clone());
                id
            }
        };

        if records.iter().any(|r| r.get(NATIVE_ID) == Some(&id)) {
            return Err(DbError::adapter(
                "insert",
                anyhow::anyhow!("duplicate key {}", id),
            ));
        }
        Ok(record)
    }
}

fn matches_query(record: &Value, query: &Map<String, Value>) -> bool {
    query
        .iter()
        .all(|(path, expected)| get_path(record, path) == Some(expected))
}

fn matches_search(record: &Value, term: &str, fields: &[String]) -> bool {
    let contains = |value: &Value| match value {
        Value::String(s) => s.to_lowercase().contains(term),
        Value::Number(n) => n.to_string().contains(term),
        _ => false,
    };

    if fields.is_empty() {
        record
            .as_object()
            .is_some_and(|map| map.values().any(&contains))
    } else {
        fields
            .iter()
            .any(|field| get_path(record, field).is_some_and(&contains))
    }
}

fn matches(record: &Value, query: &FindQuery) -> bool {
    if !matches_query(record, &query.query) {
        return false;
    }
    match query.search.as_deref().map(str::trim) {
        Some(term) if !term.is_empty() => {
            matches_search(record, &term.to_lowercase(), &query.search_fields)
        }
        _ => true,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

fn sort_records(records: &mut [Value], sort: &[String]) {
    if sort.is_empty() {
        return;
    }
    records.sort_by(|a, b| {
        for key in sort {
            let (field, descending) = match key.strip_prefix('-') {
                Some(field) => (field, true),
                None => (key.as_str(), false),
            };
            let ordering = compare_values(get_path(a, field), get_path(b, field));
            let ordering = if descending { ordering.reverse() } else { ordering };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn apply_changes(record: &mut Value, changes: &Value) -> DbResult<()> {
    let Value::Object(changes) = changes else {
        return Err(DbError::invalid_params("update changes must be an object"));
    };

    let mut set = |path: &str, value: &Value| {
        if path != NATIVE_ID {
            set_path(record, path, value.clone());
        }
    };

    if changes.keys().any(|key| key.starts_with('$')) {
        if let Some(Value::Object(fields)) = changes.get("$set") {
            fields.iter().for_each(|(path, value)| set(path, value));
        }
        if let Some(Value::Object(fields)) = changes.get("$unset") {
            for path in fields.keys().filter(|path| *path != NATIVE_ID) {
                unset_path(record, path);
            }
        }
    } else {
        changes.iter().for_each(|(path, value)| set(path, value));
    }
    Ok(())
}

#[async_trait]
impl StorageAdapter for MemoryAdapter {
    fn native_id_field(&self) -> &str {
        NATIVE_ID
    }

    async fn connect(&self) -> DbResult<()> {
        self.connected.store(true, AtomicOrdering::SeqCst);
        tracing::debug!("Memory adapter connected");
        Ok(())
    }

    async fn disconnect(&self) -> DbResult<()> {
        self.connected.store(false, AtomicOrdering::SeqCst);
        tracing::debug!("Memory adapter disconnected");
        Ok(())
    }

    async fn find(&self, query: &FindQuery) -> DbResult<Vec<Value>> {
        let mut found: Vec<Value> = self
            .read("find")?
            .iter()
            .filter(|record| matches(record, query))
            .cloned()
            .collect();

        sort_records(&mut found, &query.sort);

        let offset = usize::try_from(query.offset.unwrap_or(0)).unwrap_or(usize::MAX);
        let limit = query
            .limit
            .and_then(|l| usize::try_from(l).ok())
            .unwrap_or(usize::MAX);
        Ok(found.into_iter().skip(offset).take(limit).collect())
    }

    async fn find_one(&self, query: &Map<String, Value>) -> DbResult<Option<Value>> {
        Ok(self
            .read("find_one")?
            .iter()
            .find(|record| matches_query(record, query))
            .cloned())
    }

    async fn find_by_id(&self, id: &Value) -> DbResult<Option<Value>> {
        Ok(self
            .read("find_by_id")?
            .iter()
            .find(|record| record.get(NATIVE_ID) == Some(id))
            .cloned())
    }

    async fn find_by_ids(&self, ids: &[Value]) -> DbResult<Vec<Value>> {
        let records = self.read("find_by_ids")?;
        Ok(ids
            .iter()
            .filter_map(|id| {
                records
                    .iter()
                    .find(|record| record.get(NATIVE_ID) == Some(id))
                    .cloned()
            })
            .collect())
    }

    async fn count(&self, query: &FindQuery) -> DbResult<u64> {
        let query = query.without_paging();
        Ok(self
            .read("count")?
            .iter()
            .filter(|record| matches(record, &query))
            .count() as u64)
    }

    async fn insert(&self, entity: Document) -> DbResult<Value> {
        let mut records = self.write("insert")?;
        let record = Self::prepare_insert(&records, entity)?;
        records.push(record.clone());
        Ok(record)
    }

    async fn insert_many(&self, entities: Vec<Document>) -> DbResult<Vec<Value>> {
        let mut records = self.write("insert_many")?;
        let mut inserted = Vec::with_capacity(entities.len());
        for entity in entities {
            let record = Self::prepare_insert(&records, entity)?;
            records.push(record.clone());
            inserted.push(record);
        }
        Ok(inserted)
    }

    async fn update_many(&self, query: &Map<String, Value>, changes: &Value) -> DbResult<u64> {
        let mut records = self.write("update_many")?;
        let mut updated = 0;
        for record in records.iter_mut().filter(|r| matches_query(r, query)) {
            apply_changes(record, changes)?;
            updated += 1;
        }
        Ok(updated)
    }

    async fn update_by_id(&self, id: &Value, changes: &Value) -> DbResult<Option<Value>> {
        let mut records = self.write("update_by_id")?;
        match records.iter_mut().find(|r| r.get(NATIVE_ID) == Some(id)) {
            Some(record) => {
                apply_changes(record, changes)?;
                Ok(Some(record.clone()))
            }
            None => Ok(None),
        }
    }

    async fn remove_many(&self, query: &Map<String, Value>) -> DbResult<u64> {
        let mut records = self.write("remove_many")?;
        let before = records.len();
        records.retain(|record| !matches_query(record, query));
        Ok((before - records.len()) as u64)
    }

    async fn remove_by_id(&self, id: &Value) -> DbResult<Option<Value>> {
        let mut records = self.write("remove_by_id")?;
        let position = records.iter().position(|r| r.get(NATIVE_ID) == Some(id));
        Ok(position.map(|index| records.remove(index)))
    }

    async fn clear(&self) -> DbResult<u64> {
        let mut records = self.write("clear")?;
        let removed = records.len() as u64;
        records.clear();
        Ok(removed)
    }
}
