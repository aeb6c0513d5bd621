//! Storage records to API documents.
//!
//! Order of steps for every document: identity rename, id encoding,
//! population, field projection, exclusion.

use std::mem;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::adapter::StorageAdapter;
use crate::broker::Context;
use crate::document::{IdCodec, PassthroughIdCodec, authorize, exclude, project};
use crate::error::DbResult;
use crate::populate::PopulationEngine;

/// Caller options that shape the output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformParams {
    pub populate: Option<Vec<String>>,
    pub fields: Option<Vec<String>>,
    pub exclude_fields: Option<Vec<String>>,
}

impl TransformParams {
    pub fn with_populate(mut self, populate: Vec<String>) -> Self {
        self.populate = Some(populate);
        self
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn with_exclude_fields(mut self, exclude_fields: Vec<String>) -> Self {
        self.exclude_fields = Some(exclude_fields);
        self
    }
}

pub struct TransformationPipeline {
    adapter: Arc<dyn StorageAdapter>,
    codec: Arc<dyn IdCodec>,
    engine: PopulationEngine,
    id_field: String,
    /// Server allow-list; `None` allows every field
    fields: Option<Vec<String>>,
    /// Always removed from the output
    exclude_fields: Vec<String>,
}

impl TransformationPipeline {
    pub fn new(adapter: Arc<dyn StorageAdapter>, id_field: impl Into<String>) -> Self {
        Self {
            adapter,
            codec: Arc::new(PassthroughIdCodec),
            engine: PopulationEngine::default(),
            id_field: id_field.into(),
            fields: None,
            exclude_fields: Vec::new(),
        }
    }

    pub fn with_codec(mut self, codec: Arc<dyn IdCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_engine(mut self, engine: PopulationEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_fields(mut self, fields: Option<Vec<String>>) -> Self {
        self.fields = fields.filter(|f| !f.is_empty());
        self
    }

    pub fn with_exclude_fields(mut self, exclude_fields: Vec<String>) -> Self {
        self.exclude_fields = exclude_fields;
        self
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    pub fn engine(&self) -> &PopulationEngine {
        &self.engine
    }

    pub fn encode_id(&self, id: Value) -> Value {
        self.codec.encode(id)
    }

    pub fn decode_id(&self, id: Value) -> Value {
        self.codec.decode(id)
    }

    /// Transform one document or an array of documents.
    ///
    /// The output has the shape of the input; scalars are returned untouched.
    pub async fn transform(
        &self,
        ctx: &Context,
        params: &TransformParams,
        docs: Value,
    ) -> DbResult<Value> {
        let (mut list, single) = match docs {
            Value::Array(list) => (list, false),
            Value::Object(_) => (vec![docs], true),
            other => return Ok(other),
        };

        for doc in list.iter_mut() {
            *doc = self.to_service_form(mem::take(doc));
        }

        if let Some(populate) = params.populate.as_deref().filter(|p| !p.is_empty()) {
            self.engine.populate_list(ctx, &mut list, populate).await?;
        }

        if let Some(fields) = self.effective_fields(params) {
            for doc in list.iter_mut() {
                *doc = if fields.is_empty() {
                    Value::Object(Map::new())
                } else {
                    project(doc, &fields)
                };
            }
        }

        let excluded = self.excluded_fields(params);
        if !excluded.is_empty() {
            for doc in list.iter_mut() {
                *doc = exclude(doc, &excluded);
            }
        }

        Ok(if single {
            list.pop().unwrap_or(Value::Null)
        } else {
            Value::Array(list)
        })
    }

    /// Rename the native identity and encode it, without any other step.
    pub fn to_service_form(&self, record: Value) -> Value {
        let entity = self.adapter.entity_to_object(record);
        let mut entity = self
            .adapter
            .after_retrieve_transform_id(entity, &self.id_field);
        if let Some(id) = entity.get_mut(&self.id_field) {
            *id = self.codec.encode(mem::take(id));
        }
        Value::Object(entity)
    }

    /// Fields to keep, or `None` to keep everything.
    ///
    /// Caller fields are filtered through the allow-list; an empty result
    /// means nothing the caller asked for is visible.
    fn effective_fields(&self, params: &TransformParams) -> Option<Vec<String>> {
        match params.fields.as_deref().filter(|f| !f.is_empty()) {
            Some(requested) => Some(authorize(requested, self.fields.as_deref())),
            None => self.fields.clone(),
        }
    }

    fn excluded_fields(&self, params: &TransformParams) -> Vec<String> {
        let mut excluded = self.exclude_fields.clone();
        for path in params.exclude_fields.iter().flatten() {
            if !excluded.contains(path) {
                excluded.push(path.clone());
            }
        }
        excluded
    }
}

impl std::fmt::Debug for TransformationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformationPipeline")
            .field("id_field", &self.id_field)
            .field("fields", &self.fields)
            .field("exclude_fields", &self.exclude_fields)
            .field("engine", &self.engine)
            .finish()
    }
}
