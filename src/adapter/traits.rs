//! StorageAdapter trait definition.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::document::{Document, from_storage_form, to_storage_form};
use crate::error::DbResult;

/// Query accepted by [`StorageAdapter::find`] and [`StorageAdapter::count`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindQuery {
    /// Equality conditions keyed by dotted path
    pub query: Map<String, Value>,
    /// Full-text search term
    pub search: Option<String>,
    /// Fields searched; all string fields when empty
    pub search_fields: Vec<String>,
    /// Sort keys, `-field` for descending
    pub sort: Vec<String>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

impl FindQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, query: Map<String, Value>) -> Self {
        self.query = query;
        self
    }

    pub fn with_search(mut self, search: impl Into<String>, fields: Vec<String>) -> Self {
        self.search = Some(search.into());
        self.search_fields = fields;
        self
    }

    pub fn with_sort(mut self, sort: Vec<String>) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_page(mut self, offset: Option<u64>, limit: Option<u64>) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }

    /// Same conditions without sorting or paging, as used for counting.
    pub fn without_paging(&self) -> Self {
        Self {
            query: self.query.clone(),
            search: self.search.clone(),
            search_fields: self.search_fields.clone(),
            sort: Vec::new(),
            offset: None,
            limit: None,
        }
    }
}

/// Storage driver contract.
///
/// Records cross this boundary in storage form, carrying the native identity
/// attribute named by [`StorageAdapter::native_id_field`]. Update `changes`
/// are either a partial document or `{"$set": {...}, "$unset": {...}}`.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Name of the identity attribute in stored records.
    fn native_id_field(&self) -> &str {
        "_id"
    }

    async fn connect(&self) -> DbResult<()>;

    async fn disconnect(&self) -> DbResult<()>;

    async fn find(&self, query: &FindQuery) -> DbResult<Vec<Value>>;

    async fn find_one(&self, query: &Map<String, Value>) -> DbResult<Option<Value>>;

    async fn find_by_id(&self, id: &Value) -> DbResult<Option<Value>>;

    /// Records for the given ids, in id order; unknown ids are skipped.
    async fn find_by_ids(&self, ids: &[Value]) -> DbResult<Vec<Value>>;

    async fn count(&self, query: &FindQuery) -> DbResult<u64>;

    async fn insert(&self, entity: Document) -> DbResult<Value>;

    async fn insert_many(&self, entities: Vec<Document>) -> DbResult<Vec<Value>>;

    async fn update_many(&self, query: &Map<String, Value>, changes: &Value) -> DbResult<u64>;

    async fn update_by_id(&self, id: &Value, changes: &Value) -> DbResult<Option<Value>>;

    async fn remove_many(&self, query: &Map<String, Value>) -> DbResult<u64>;

    async fn remove_by_id(&self, id: &Value) -> DbResult<Option<Value>>;

    /// Remove every record, returning how many were removed.
    async fn clear(&self) -> DbResult<u64>;

    /// Convert a raw record into a plain document.
    ///
    /// Non-object records convert to an empty document.
    fn entity_to_object(&self, entity: Value) -> Document {
        match entity {
            Value::Object(map) => map,
            _ => Document::new(),
        }
    }

    fn before_save_transform_id(&self, entity: &Document, id_field: &str) -> Document {
        to_storage_form(entity, id_field, self.native_id_field())
    }

    fn after_retrieve_transform_id(&self, mut entity: Document, id_field: &str) -> Document {
        from_storage_form(&mut entity, id_field, self.native_id_field());
        entity
    }
}
