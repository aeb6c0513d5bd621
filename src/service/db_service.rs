//! Data service exposing CRUD actions over a storage adapter.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{debug, error, info, warn};
use validator::Validate;

use crate::adapter::{FindQuery, MemoryAdapter, StorageAdapter};
use crate::broker::{Context, LocalBroker};
use crate::cache::CacheManager;
use crate::config::{AdapterKind, ServiceSettings, Settings};
use crate::connection::{
    Connection, ConnectionFactory, ConnectionOptions, ConnectionRegistry, MemoryConnectionFactory,
};
use crate::document::{Document, IdCodec, PassthroughIdCodec, id_key};
use crate::error::{DbError, DbResult};
use crate::populate::{PopulationEngine, RelationRule, Relations};
use crate::service::hooks::{EntityChange, EntityListener};
use crate::service::params::{
    CountParams, FindParams, GetParams, InsertParams, ListParams, RemoveParams, UpdateParams,
};
use crate::service::validators::EntityValidator;
use crate::transform::{TransformParams, TransformationPipeline};

/// Action names registered on a broker as `<service>.<action>`.
pub const ACTIONS: [&str; 8] = [
    "find", "count", "list", "create", "insert", "get", "update", "remove",
];

/// A data service: typed CRUD actions, population, caching and connections.
///
/// Every action takes the call [`Context`] first; results are documents in
/// service form, shaped by the [`TransformationPipeline`].
pub struct DbService {
    settings: ServiceSettings,
    adapter: Arc<dyn StorageAdapter>,
    pipeline: TransformationPipeline,
    registry: ConnectionRegistry,
    cache: CacheManager,
    validator: Option<Arc<dyn EntityValidator>>,
    listener: Option<Arc<dyn EntityListener>>,
}

/// Builder for [`DbService`].
pub struct DbServiceBuilder {
    settings: ServiceSettings,
    adapter: Option<Arc<dyn StorageAdapter>>,
    factory: Option<Arc<dyn ConnectionFactory>>,
    cache: Option<CacheManager>,
    codec: Option<Arc<dyn IdCodec>>,
    validator: Option<Arc<dyn EntityValidator>>,
    listener: Option<Arc<dyn EntityListener>>,
    relations: Vec<(String, RelationRule)>,
}

impl DbServiceBuilder {
    pub fn new(settings: ServiceSettings) -> Self {
        Self {
            settings,
            adapter: None,
            factory: None,
            cache: None,
            codec: None,
            validator: None,
            listener: None,
            relations: Vec::new(),
        }
    }

    /// Storage backend; defaults to a fresh [`MemoryAdapter`].
    pub fn adapter(mut self, adapter: Arc<dyn StorageAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Factory for named connections; defaults to [`MemoryConnectionFactory`].
    pub fn connection_factory(mut self, factory: Arc<dyn ConnectionFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn cache(mut self, cache: CacheManager) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn codec(mut self, codec: Arc<dyn IdCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn validator(mut self, validator: impl EntityValidator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn listener(mut self, listener: Arc<dyn EntityListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Declare a relation in code, overriding a configured one of the same name.
    pub fn relation(mut self, name: impl Into<String>, rule: RelationRule) -> Self {
        self.relations.push((name.into(), rule));
        self
    }

    pub fn build(self) -> DbResult<DbService> {
        self.settings.validate()?;

        let adapter: Arc<dyn StorageAdapter> = match self.adapter {
            Some(adapter) => adapter,
            None => Arc::new(MemoryAdapter::new()),
        };
        let factory: Arc<dyn ConnectionFactory> = match self.factory {
            Some(factory) => factory,
            None => Arc::new(MemoryConnectionFactory),
        };
        let codec: Arc<dyn IdCodec> = match self.codec {
            Some(codec) => codec,
            None => Arc::new(PassthroughIdCodec),
        };
        let cache = match self.cache {
            Some(cache) => cache,
            None => CacheManager::disabled(&self.settings.name),
        };

        let mut relations = Relations::from_config(&self.settings.populates);
        for (name, rule) in self.relations {
            relations.insert(name, rule);
        }

        let pipeline = TransformationPipeline::new(Arc::clone(&adapter), &self.settings.id_field)
            .with_codec(codec)
            .with_engine(PopulationEngine::new(relations))
            .with_fields(self.settings.fields.clone())
            .with_exclude_fields(self.settings.exclude_fields.clone());

        debug!(
            service = %self.settings.name,
            relations = ?pipeline.engine().relations().names(),
            "Service built"
        );

        Ok(DbService {
            settings: self.settings,
            adapter,
            pipeline,
            registry: ConnectionRegistry::new(factory),
            cache,
            validator: self.validator,
            listener: self.listener,
        })
    }
}

impl DbService {
    pub fn builder(settings: ServiceSettings) -> DbServiceBuilder {
        DbServiceBuilder::new(settings)
    }

    /// Service wired from loaded settings.
    pub fn from_settings(settings: &Settings) -> DbResult<Self> {
        let adapter: Arc<dyn StorageAdapter> = match settings.adapter.kind {
            AdapterKind::Memory => Arc::new(MemoryAdapter::new()),
        };
        let cache = CacheManager::new(settings.cache.clone(), &settings.service.name)?;

        Self::builder(settings.service.clone())
            .adapter(adapter)
            .cache(cache)
            .build()
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    pub fn adapter(&self) -> &Arc<dyn StorageAdapter> {
        &self.adapter
    }

    pub fn pipeline(&self) -> &TransformationPipeline {
        &self.pipeline
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    // ========================================================================
    // Actions
    // ========================================================================

    pub async fn find(&self, ctx: &Context, params: FindParams) -> DbResult<Value> {
        self.cached(ctx, "find", &params, || async {
            let limit = match (params.limit, self.settings.max_limit) {
                (Some(limit), Some(max)) => Some(limit.min(max)),
                (limit, _) => limit,
            };
            let query = self
                .find_query(
                    params.query.clone(),
                    params.search.clone(),
                    params.search_fields.clone(),
                    params.sort.clone(),
                )
                .with_page(params.offset, limit);

            let docs = self.adapter.find(&query).await?;
            self.pipeline
                .transform(ctx, &params.transform_params(), Value::Array(docs))
                .await
        })
        .await
    }

    pub async fn count(&self, ctx: &Context, params: CountParams) -> DbResult<Value> {
        self.cached(ctx, "count", &params, || async {
            let query = self.find_query(
                params.query.clone(),
                params.search.clone(),
                params.search_fields.clone(),
                None,
            );
            let total = self.adapter.count(&query).await?;
            Ok(json!(total))
        })
        .await
    }

    /// One page of documents plus paging totals.
    pub async fn list(&self, ctx: &Context, params: ListParams) -> DbResult<Value> {
        params
            .validate()
            .map_err(|e| DbError::invalid_params(e.to_string()))?;

        self.cached(ctx, "list", &params, || async {
            let page = params.page.unwrap_or(1);
            let page_size = params
                .page_size
                .unwrap_or(self.settings.page_size)
                .min(self.settings.max_page_size);

            let query = self.find_query(
                params.query.clone(),
                params.search.clone(),
                params.search_fields.clone(),
                params.sort.clone(),
            );
            let offset = (page - 1).checked_mul(page_size).ok_or_else(|| {
                DbError::invalid_params(format!("page {page} is out of range for page size {page_size}"))
            })?;
            let page_query = query.clone().with_page(Some(offset), Some(page_size));

            let rows = async {
                let docs = self.adapter.find(&page_query).await?;
                self.pipeline
                    .transform(ctx, &params.transform_params(), Value::Array(docs))
                    .await
            };
            let (rows, total) = try_join(rows, self.adapter.count(&query)).await?;

            Ok(json!({
                "rows": rows,
                "total": total,
                "page": page,
                "pageSize": page_size,
                "totalPages": total.div_ceil(page_size),
            }))
        })
        .await
    }

    pub async fn create(&self, ctx: &Context, entity: Value) -> DbResult<Value> {
        let record = self.prepare_entity(entity)?;
        let stored = self.adapter.insert(record).await?;

        let json = self
            .pipeline
            .transform(ctx, &TransformParams::default(), stored)
            .await?;
        self.entity_changed(EntityChange::Created, &json, ctx).await?;
        Ok(json)
    }

    /// Insert `entity`, or every element of `entities`.
    pub async fn insert(&self, ctx: &Context, params: InsertParams) -> DbResult<Value> {
        match (params.entities, params.entity) {
            (Some(entities), _) => {
                let records = entities
                    .into_iter()
                    .map(|entity| self.prepare_entity(entity))
                    .collect::<DbResult<Vec<Document>>>()?;
                let stored = self.adapter.insert_many(records).await?;

                let json = self
                    .pipeline
                    .transform(ctx, &TransformParams::default(), Value::Array(stored))
                    .await?;
                self.entity_changed(EntityChange::Created, &json, ctx).await?;
                Ok(json)
            }
            (None, Some(entity)) => self.create(ctx, entity).await,
            (None, None) => Err(DbError::invalid_params(
                "Either `entity` or `entities` is required",
            )),
        }
    }

    /// Documents by identity.
    ///
    /// A single id answers with one document and fails when it is unknown;
    /// an array answers in id order, skipping unknown ids. With `mapping`
    /// the answer is an object keyed by encoded identity.
    pub async fn get(&self, ctx: &Context, params: GetParams) -> DbResult<Value> {
        self.cached(ctx, "get", &params, || async {
            let (ids, single) = match &params.id {
                Value::Array(ids) => (ids.clone(), false),
                id => (vec![id.clone()], true),
            };
            let native_ids: Vec<Value> = ids
                .into_iter()
                .map(|id| self.pipeline.decode_id(id))
                .collect();

            let docs = self.adapter.find_by_ids(&native_ids).await?;
            if single && docs.is_empty() {
                return Err(DbError::entity_not_found(params.id.clone()));
            }

            let keys: Vec<String> = docs
                .iter()
                .map(|doc| self.encoded_key(doc))
                .collect();

            let transformed = self
                .pipeline
                .transform(ctx, &params.transform_params(), Value::Array(docs))
                .await?;
            let mut docs = match transformed {
                Value::Array(docs) => docs,
                other => return Ok(other),
            };

            if params.mapping {
                let mapping: Map<String, Value> = keys.into_iter().zip(docs).collect();
                Ok(Value::Object(mapping))
            } else if single {
                Ok(docs.pop().unwrap_or(Value::Null))
            } else {
                Ok(Value::Array(docs))
            }
        })
        .await
    }

    /// Apply changes to one document with `$set` semantics.
    ///
    /// Changes already written with operators (`$set`, `$unset`) pass through.
    pub async fn update(&self, ctx: &Context, params: UpdateParams) -> DbResult<Value> {
        let id = self.pipeline.decode_id(params.id.clone());

        let mut changes = params.changes;
        changes.shift_remove(self.pipeline.id_field());
        let changes = if changes.keys().any(|key| key.starts_with('$')) {
            Value::Object(changes)
        } else {
            json!({ "$set": changes })
        };

        let updated = self
            .adapter
            .update_by_id(&id, &changes)
            .await?
            .ok_or_else(|| DbError::entity_not_found(params.id))?;

        let json = self
            .pipeline
            .transform(ctx, &TransformParams::default(), updated)
            .await?;
        self.entity_changed(EntityChange::Updated, &json, ctx).await?;
        Ok(json)
    }

    pub async fn remove(&self, ctx: &Context, params: RemoveParams) -> DbResult<Value> {
        let id = self.pipeline.decode_id(params.id.clone());

        let removed = self
            .adapter
            .remove_by_id(&id)
            .await?
            .ok_or_else(|| DbError::entity_not_found(params.id))?;

        let json = self
            .pipeline
            .transform(ctx, &TransformParams::default(), removed)
            .await?;
        self.entity_changed(EntityChange::Removed, &json, ctx).await?;
        Ok(json)
    }

    /// Dispatch an action by its short name with raw JSON params.
    pub async fn call_action(&self, ctx: &Context, action: &str, params: Value) -> DbResult<Value> {
        let params = match params {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };

        match action {
            "find" => self.find(ctx, parse_params(params)?).await,
            "count" => self.count(ctx, parse_params(params)?).await,
            "list" => self.list(ctx, parse_params(params)?).await,
            "create" => self.create(ctx, params).await,
            "insert" => self.insert(ctx, parse_params(params)?).await,
            "get" => self.get(ctx, parse_params(params)?).await,
            "update" => self.update(ctx, parse_params(params)?).await,
            "remove" => self.remove(ctx, parse_params(params)?).await,
            _ => Err(DbError::ActionNotFound {
                action: format!("{}.{}", self.settings.name, action),
            }),
        }
    }

    /// Register every action on `broker` as `<service>.<action>`.
    pub fn register_actions(self: &Arc<Self>, broker: &LocalBroker) {
        for action in ACTIONS {
            let service = Arc::clone(self);
            broker.register(
                format!("{}.{}", self.settings.name, action),
                move |ctx: Context, params: Value| {
                    let service = Arc::clone(&service);
                    async move { service.call_action(&ctx, action, params).await }
                },
            );
        }
        debug!(service = %self.settings.name, "Actions registered");
    }

    // ========================================================================
    // Change notification and caching
    // ========================================================================

    /// Clear cached results and notify the listener.
    pub async fn entity_changed(
        &self,
        change: EntityChange,
        payload: &Value,
        ctx: &Context,
    ) -> DbResult<()> {
        debug!(service = %self.settings.name, %change, "Entity changed");
        self.cache.clear().await?;

        if let Some(listener) = &self.listener {
            listener.entity_changed(change, payload, ctx).await;
        }
        Ok(())
    }

    pub async fn clear_cache(&self) -> DbResult<()> {
        self.cache.clear().await.map_err(DbError::from)
    }

    async fn cached<P, F, Fut>(
        &self,
        ctx: &Context,
        action: &str,
        params: &P,
        compute: F,
    ) -> DbResult<Value>
    where
        P: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = DbResult<Value>>,
    {
        if !self.cache.is_enabled() {
            return compute().await;
        }

        let key = self.cache_key(ctx, action, params)?;
        match self.cache.get(&key).await {
            Ok(Some(hit)) => {
                debug!(key = %key, "Cache hit");
                return Ok(hit);
            }
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "Cache read failed"),
        }

        let value = compute().await?;
        if let Err(e) = self.cache.set(&key, value.clone()).await {
            warn!(key = %key, error = %e, "Cache write failed");
        }
        Ok(value)
    }

    /// `<service>.<action>:<params>`.
    ///
    /// With `cache_keys` configured only those params take part; a key
    /// starting with `#` reads the context meta instead.
    fn cache_key<P: Serialize>(&self, ctx: &Context, action: &str, params: &P) -> DbResult<String> {
        let params = serde_json::to_value(params)?;

        let keyed = if self.settings.cache_keys.is_empty() {
            params
        } else {
            let parts: Map<String, Value> = self
                .settings
                .cache_keys
                .iter()
                .map(|key| {
                    let value = match key.strip_prefix('#') {
                        Some(meta_key) => ctx.meta().get(meta_key),
                        None => params.get(key),
                    };
                    (key.clone(), value.cloned().unwrap_or(Value::Null))
                })
                .collect();
            Value::Object(parts)
        };

        Ok(format!("{}.{}:{}", self.settings.name, action, keyed))
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Connect the adapter, retrying `connect_retries` times.
    pub async fn connect(&self) -> DbResult<()> {
        let attempts = self.settings.connect_retries + 1;
        let interval = Duration::from_millis(self.settings.retry_interval_ms);

        let mut attempt = 1;
        loop {
            match self.adapter.connect().await {
                Ok(()) => {
                    info!(service = %self.settings.name, attempt, "Adapter connected");
                    return Ok(());
                }
                Err(e) if attempt < attempts => {
                    warn!(
                        service = %self.settings.name,
                        attempt,
                        error = %e,
                        "Adapter connection failed, retrying in {:?}",
                        interval
                    );
                    tokio::time::sleep(interval).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(service = %self.settings.name, attempts, error = %e, "Adapter connection failed");
                    return Err(e);
                }
            }
        }
    }

    /// Close every named connection, then disconnect the adapter.
    pub async fn disconnect(&self) -> DbResult<()> {
        for result in self.registry.close_all().await {
            if let Err(e) = result {
                warn!(service = %self.settings.name, error = %e, "Connection close failed");
            }
        }

        self.adapter.disconnect().await?;
        info!(service = %self.settings.name, "Adapter disconnected");
        Ok(())
    }

    /// Register and initialize a named connection.
    pub async fn open_connection(&self, options: ConnectionOptions) -> DbResult<Arc<dyn Connection>> {
        let connection = self.registry.create(options)?;
        connection.initialize().await?;
        Ok(connection)
    }

    pub fn connection(&self, name: &str) -> DbResult<Arc<dyn Connection>> {
        self.registry.get(name)
    }

    pub async fn close_connection(&self, name: &str) -> DbResult<bool> {
        self.registry.close(name).await
    }

    pub async fn close_connections<S: AsRef<str>>(&self, names: &[S]) -> Vec<DbResult<bool>> {
        self.registry.close_many(names).await
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Validate an entity and convert it to storage form.
    fn prepare_entity(&self, entity: Value) -> DbResult<Document> {
        if let Some(validator) = &self.validator {
            validator
                .validate(&entity)
                .map_err(|errors| DbError::Validation {
                    entity: self.settings.name.clone(),
                    errors,
                })?;
        }

        let Value::Object(mut entity) = entity else {
            return Err(DbError::invalid_params("Entity must be an object"));
        };
        if let Some(id) = entity.get_mut(self.pipeline.id_field()) {
            *id = self.pipeline.decode_id(std::mem::take(id));
        }

        Ok(self
            .adapter
            .before_save_transform_id(&entity, self.pipeline.id_field()))
    }

    /// Storage query with the identity field translated to its native form.
    fn find_query(
        &self,
        query: Option<Map<String, Value>>,
        search: Option<String>,
        search_fields: Option<Vec<String>>,
        sort: Option<Vec<String>>,
    ) -> FindQuery {
        let id_field = self.pipeline.id_field();
        let native = self.adapter.native_id_field();

        let mut query = query.unwrap_or_default();
        if let Some(id) = query.get_mut(id_field) {
            *id = self.pipeline.decode_id(std::mem::take(id));
        }
        let query = self.adapter.before_save_transform_id(&query, id_field);

        let sort = sort
            .unwrap_or_default()
            .into_iter()
            .map(|key| {
                if key == id_field {
                    native.to_string()
                } else if key.strip_prefix('-') == Some(id_field) {
                    format!("-{}", native)
                } else {
                    key
                }
            })
            .collect();

        let mut find = FindQuery::new().with_query(query).with_sort(sort);
        if let Some(search) = search.filter(|s| !s.trim().is_empty()) {
            find = find.with_search(search, search_fields.unwrap_or_default());
        }
        find
    }

    fn encoded_key(&self, record: &Value) -> String {
        record
            .get(self.adapter.native_id_field())
            .cloned()
            .map(|id| id_key(&self.pipeline.encode_id(id)))
            .unwrap_or_default()
    }
}

fn parse_params<P: DeserializeOwned>(params: Value) -> DbResult<P> {
    serde_json::from_value(params).map_err(|e| DbError::invalid_params(e.to_string()))
}

impl std::fmt::Debug for DbService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbService")
            .field("settings", &self.settings)
            .field("pipeline", &self.pipeline)
            .field("registry", &self.registry)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
