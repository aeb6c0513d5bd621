//! Tests for the service module

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::adapter::{FindQuery, MemoryAdapter, StorageAdapter};
use crate::broker::{Context, LocalBroker};
use crate::cache::{CacheConfig, CacheManager};
use crate::config::ServiceSettings;
use crate::connection::ConnectionOptions;
use crate::document::{Document, IdCodec};
use crate::error::{DbError, DbResult, ValidationFieldError};
use crate::service::*;

fn ctx() -> Context {
    Context::new(Arc::new(LocalBroker::new()))
}

fn posts() -> DbService {
    DbService::builder(ServiceSettings::named("posts")).build().unwrap()
}

async fn seed(service: &DbService, ctx: &Context) {
    service
        .insert(
            ctx,
            InsertParams {
                entities: Some(vec![
                    json!({"id": 1, "title": "Rust ownership", "votes": 10, "author": 7}),
                    json!({"id": 2, "title": "Async in practice", "votes": 3, "author": 8}),
                    json!({"id": 3, "title": "rust macros", "votes": 7, "author": 7}),
                    json!({"id": 4, "title": "Borrowing", "votes": 1, "author": 9}),
                    json!({"id": 5, "title": "Traits", "votes": 5, "author": 8}),
                ]),
                entity: None,
            },
        )
        .await
        .unwrap();
}

fn ids(docs: &Value) -> Vec<i64> {
    docs.as_array()
        .unwrap()
        .iter()
        .map(|doc| doc["id"].as_i64().unwrap())
        .collect()
}

mod action_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_get() {
        let service = posts();
        let ctx = ctx();

        let created = service
            .create(&ctx, json!({"id": 1, "title": "first"}))
            .await
            .unwrap();
        assert_eq!(created, json!({"id": 1, "title": "first"}));

        let stored = service.adapter().find_by_id(&json!(1)).await.unwrap();
        assert_eq!(stored, Some(json!({"_id": 1, "title": "first"})));

        let fetched = service.get(&ctx, GetParams::new(1)).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_create_generates_id() {
        let service = posts();
        let created = service
            .create(&ctx(), json!({"title": "no id"}))
            .await
            .unwrap();
        assert!(created["id"].as_str().is_some_and(|id| !id.is_empty()));
        assert!(created.get("_id").is_none());
    }

    #[tokio::test]
    async fn test_get_unknown_single_id() {
        let service = posts();
        let err = service.get(&ctx(), GetParams::new(99)).await.unwrap_err();
        assert!(matches!(err, DbError::EntityNotFound { id } if id == json!(99)));
    }

    #[tokio::test]
    async fn test_get_many_keeps_id_order() {
        let service = posts();
        let ctx = ctx();
        seed(&service, &ctx).await;

        let docs = service
            .get(&ctx, GetParams::new(json!([3, 1, 42])))
            .await
            .unwrap();
        assert_eq!(ids(&docs), vec![3, 1]);

        let none = service.get(&ctx, GetParams::new(json!([42]))).await.unwrap();
        assert_eq!(none, json!([]));
    }

    #[tokio::test]
    async fn test_get_mapping() {
        let service = posts();
        let ctx = ctx();
        seed(&service, &ctx).await;

        let params: GetParams = serde_json::from_value(json!({
            "id": [2, 3],
            "mapping": true,
            "fields": "title",
        }))
        .unwrap();
        let mapping = service.get(&ctx, params).await.unwrap();
        assert_eq!(
            mapping,
            json!({
                "2": {"title": "Async in practice"},
                "3": {"title": "rust macros"},
            })
        );
    }

    #[tokio::test]
    async fn test_find_with_sanitized_params() {
        let service = posts();
        let ctx = ctx();
        seed(&service, &ctx).await;

        let docs = service
            .call_action(
                &ctx,
                "find",
                json!({"sort": "-votes", "limit": "2", "offset": "1", "fields": "id title"}),
            )
            .await
            .unwrap();
        assert_eq!(
            docs,
            json!([{"id": 3, "title": "rust macros"}, {"id": 5, "title": "Traits"}])
        );
    }

    #[tokio::test]
    async fn test_find_by_identity_field() {
        let service = posts();
        let ctx = ctx();
        seed(&service, &ctx).await;

        let params: FindParams = serde_json::from_value(json!({"query": {"id": 2}})).unwrap();
        let docs = service.find(&ctx, params).await.unwrap();
        assert_eq!(ids(&docs), vec![2]);

        let params: FindParams = serde_json::from_value(json!({"sort": "-id"})).unwrap();
        let docs = service.find(&ctx, params).await.unwrap();
        assert_eq!(ids(&docs), vec![5, 4, 3, 2, 1]);
    }

    #[tokio::test]
    async fn test_find_search_and_max_limit() {
        let service = DbService::builder(ServiceSettings {
            max_limit: Some(1),
            ..ServiceSettings::named("posts")
        })
        .build()
        .unwrap();
        let ctx = ctx();
        seed(&service, &ctx).await;

        let params: FindParams = serde_json::from_value(json!({
            "search": "RUST",
            "searchFields": "title",
            "sort": "votes",
        }))
        .unwrap();
        let docs = service.find(&ctx, params.clone()).await.unwrap();
        assert_eq!(ids(&docs), vec![3, 1]);

        let capped = FindParams {
            limit: Some(10),
            ..params
        };
        let docs = service.find(&ctx, capped).await.unwrap();
        assert_eq!(ids(&docs), vec![3]);
    }

    #[tokio::test]
    async fn test_count_ignores_paging() {
        let service = posts();
        let ctx = ctx();
        seed(&service, &ctx).await;

        let count = service
            .call_action(&ctx, "count", json!({"query": {"author": 7}, "limit": 1}))
            .await
            .unwrap();
        assert_eq!(count, json!(2));

        let count = service.count(&ctx, CountParams::default()).await.unwrap();
        assert_eq!(count, json!(5));
    }

    #[tokio::test]
    async fn test_list_pages() {
        let service = posts();
        let ctx = ctx();
        seed(&service, &ctx).await;

        let page = service
            .call_action(&ctx, "list", json!({"page": 3, "pageSize": "2", "sort": "id"}))
            .await
            .unwrap();
        assert_eq!(page["total"], json!(5));
        assert_eq!(page["page"], json!(3));
        assert_eq!(page["pageSize"], json!(2));
        assert_eq!(page["totalPages"], json!(3));
        assert_eq!(ids(&page["rows"]), vec![5]);

        let page = service.list(&ctx, ListParams::default()).await.unwrap();
        assert_eq!(page["pageSize"], json!(10));
        assert_eq!(page["totalPages"], json!(1));
        assert_eq!(page["rows"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_list_caps_page_size() {
        let service = DbService::builder(ServiceSettings {
            page_size: 2,
            max_page_size: 3,
            ..ServiceSettings::named("posts")
        })
        .build()
        .unwrap();
        let ctx = ctx();
        seed(&service, &ctx).await;

        let page = service.list(&ctx, ListParams::default()).await.unwrap();
        assert_eq!(page["pageSize"], json!(2));
        assert_eq!(page["totalPages"], json!(3));

        let params = ListParams {
            page_size: Some(50),
            ..Default::default()
        };
        let page = service.list(&ctx, params).await.unwrap();
        assert_eq!(page["pageSize"], json!(3));
        assert_eq!(page["totalPages"], json!(2));
    }

    #[tokio::test]
    async fn test_list_rejects_page_zero() {
        let service = posts();
        let err = service
            .call_action(&ctx(), "list", json!({"page": 0}))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidParams { .. }));
    }

    #[tokio::test]
    async fn test_list_page_past_the_end_is_empty() {
        let service = posts();
        let ctx = ctx();
        seed(&service, &ctx).await;

        let page = service
            .call_action(&ctx, "list", json!({"page": 7, "pageSize": 2}))
            .await
            .unwrap();
        assert_eq!(page["rows"], json!([]));
        assert_eq!(page["total"], json!(5));
        assert_eq!(page["page"], json!(7));
        assert_eq!(page["totalPages"], json!(3));
    }

    #[tokio::test]
    async fn test_list_empty_collection_has_no_pages() {
        let service = posts();
        let page = service.list(&ctx(), ListParams::default()).await.unwrap();

        assert_eq!(page["rows"], json!([]));
        assert_eq!(page["total"], json!(0));
        assert_eq!(page["page"], json!(1));
        assert_eq!(page["totalPages"], json!(0));
    }

    #[tokio::test]
    async fn test_list_rejects_offset_overflow() {
        let service = posts();
        let ctx = ctx();
        seed(&service, &ctx).await;

        let err = service
            .call_action(
                &ctx,
                "list",
                json!({"page": 1_000_000_000_000_000_000u64, "pageSize": 100}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidParams { .. }));

        let page = service
            .call_action(&ctx, "list", json!({"page": u64::MAX, "pageSize": 1}))
            .await
            .unwrap();
        assert_eq!(page["rows"], json!([]));
    }

    #[tokio::test]
    async fn test_update_sets_fields() {
        let service = posts();
        let ctx = ctx();
        seed(&service, &ctx).await;

        let updated = service
            .call_action(
                &ctx,
                "update",
                json!({"id": 2, "title": "Async, revised", "meta.lang": "en"}),
            )
            .await
            .unwrap();
        assert_eq!(
            updated,
            json!({"id": 2, "title": "Async, revised", "votes": 3, "author": 8, "meta": {"lang": "en"}})
        );

        let err = service
            .call_action(&ctx, "update", json!({"id": 42, "title": "x"}))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_update_accepts_operators() {
        let service = posts();
        let ctx = ctx();
        seed(&service, &ctx).await;

        let params: UpdateParams =
            serde_json::from_value(json!({"id": 1, "$unset": {"author": 1}})).unwrap();
        let updated = service.update(&ctx, params).await.unwrap();
        assert_eq!(updated, json!({"id": 1, "title": "Rust ownership", "votes": 10}));
    }

    #[tokio::test]
    async fn test_remove() {
        let service = posts();
        let ctx = ctx();
        seed(&service, &ctx).await;

        let removed = service
            .remove(&ctx, RemoveParams { id: json!(4) })
            .await
            .unwrap();
        assert_eq!(removed["title"], json!("Borrowing"));
        assert_eq!(service.count(&ctx, CountParams::default()).await.unwrap(), json!(4));

        let err = service
            .remove(&ctx, RemoveParams { id: json!(4) })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::EntityNotFound { .. }));
    }

    #[tokio::test]
    async fn test_insert_requires_entity() {
        let service = posts();
        let ctx = ctx();

        let one = service
            .call_action(&ctx, "insert", json!({"entity": {"id": 1}}))
            .await
            .unwrap();
        assert_eq!(one, json!({"id": 1}));

        let err = service.call_action(&ctx, "insert", json!({})).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidParams { .. }));

        let err = service.create(&ctx, json!([1, 2])).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidParams { .. }));
    }

    #[tokio::test]
    async fn test_unknown_action_and_bad_params() {
        let service = posts();
        let ctx = ctx();

        let err = service.call_action(&ctx, "drop", Value::Null).await.unwrap_err();
        assert!(matches!(err, DbError::ActionNotFound { action } if action == "posts.drop"));

        let err = service
            .call_action(&ctx, "get", json!({"mapping": true}))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidParams { .. }));

        // null params behave as an empty object
        let docs = service.call_action(&ctx, "find", Value::Null).await.unwrap();
        assert_eq!(docs, json!([]));
    }
}

mod shaping_tests {
    use super::*;

    struct PrefixCodec;

    impl IdCodec for PrefixCodec {
        fn encode(&self, id: Value) -> Value {
            Value::String(format!("post-{}", id))
        }

        fn decode(&self, id: Value) -> Value {
            let decoded = id
                .as_str()
                .and_then(|s| s.strip_prefix("post-"))
                .and_then(|s| s.parse::<i64>().ok());
            decoded.map(Value::from).unwrap_or(id)
        }
    }

    #[tokio::test]
    async fn test_codec_round_trips_through_actions() {
        let service = DbService::builder(ServiceSettings::named("posts"))
            .codec(Arc::new(PrefixCodec))
            .build()
            .unwrap();
        let ctx = ctx();

        let created = service
            .create(&ctx, json!({"id": 1, "title": "t"}))
            .await
            .unwrap();
        assert_eq!(created["id"], json!("post-1"));
        assert!(service.adapter().find_by_id(&json!(1)).await.unwrap().is_some());

        let params: GetParams =
            serde_json::from_value(json!({"id": ["post-1"], "mapping": true})).unwrap();
        let mapping = service.get(&ctx, params).await.unwrap();
        assert_eq!(mapping, json!({"post-1": {"id": "post-1", "title": "t"}}));

        let params: FindParams =
            serde_json::from_value(json!({"query": {"id": "post-1"}})).unwrap();
        assert_eq!(service.find(&ctx, params).await.unwrap(), json!([created]));
    }

    #[tokio::test]
    async fn test_custom_identity_field_and_exclusions() {
        let service = DbService::builder(ServiceSettings {
            id_field: "uuid".to_string(),
            exclude_fields: vec!["password".to_string()],
            ..ServiceSettings::named("users")
        })
        .build()
        .unwrap();
        let ctx = ctx();

        let created = service
            .create(&ctx, json!({"uuid": "u1", "name": "Ada", "password": "secret"}))
            .await
            .unwrap();
        assert_eq!(created, json!({"uuid": "u1", "name": "Ada"}));

        let stored = service.adapter().find_by_id(&json!("u1")).await.unwrap().unwrap();
        assert_eq!(stored["password"], json!("secret"));
    }

    #[tokio::test]
    async fn test_default_fields_allow_list() {
        let service = DbService::builder(ServiceSettings {
            fields: Some(vec!["id".to_string(), "title".to_string()]),
            ..ServiceSettings::named("posts")
        })
        .build()
        .unwrap();
        let ctx = ctx();
        seed(&service, &ctx).await;

        let doc = service.get(&ctx, GetParams::new(1)).await.unwrap();
        assert_eq!(doc, json!({"id": 1, "title": "Rust ownership"}));

        let params: GetParams =
            serde_json::from_value(json!({"id": 1, "fields": ["votes", "title"]})).unwrap();
        let doc = service.get(&ctx, params).await.unwrap();
        assert_eq!(doc, json!({"title": "Rust ownership"}));
    }
}

mod write_hook_tests {
    use super::*;

    #[derive(Default)]
    struct RecordingListener {
        changes: Mutex<Vec<(EntityChange, Value)>>,
    }

    #[async_trait]
    impl EntityListener for RecordingListener {
        async fn entity_changed(&self, change: EntityChange, payload: &Value, _ctx: &Context) {
            self.changes.lock().unwrap().push((change, payload.clone()));
        }
    }

    #[tokio::test]
    async fn test_validation_blocks_writes() {
        let service = DbService::builder(ServiceSettings::named("posts"))
            .validator(RequiredFieldsValidator::new(["title"]))
            .build()
            .unwrap();
        let ctx = ctx();

        let err = service.create(&ctx, json!({"id": 1})).await.unwrap_err();
        match err {
            DbError::Validation { entity, errors } => {
                assert_eq!(entity, "posts");
                assert_eq!(errors, vec![ValidationFieldError::new("title", "is required")]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }

        let params = InsertParams {
            entities: Some(vec![json!({"id": 1, "title": "ok"}), json!({"id": 2})]),
            entity: None,
        };
        assert!(service.insert(&ctx, params).await.is_err());
        assert_eq!(service.count(&ctx, CountParams::default()).await.unwrap(), json!(0));
    }

    #[tokio::test]
    async fn test_listener_sees_every_write() {
        let listener = Arc::new(RecordingListener::default());
        let service = DbService::builder(ServiceSettings::named("posts"))
            .listener(listener.clone())
            .build()
            .unwrap();
        let ctx = ctx();

        service.create(&ctx, json!({"id": 1, "title": "a"})).await.unwrap();
        service
            .update(
                &ctx,
                serde_json::from_value(json!({"id": 1, "title": "b"})).unwrap(),
            )
            .await
            .unwrap();
        service.remove(&ctx, RemoveParams { id: json!(1) }).await.unwrap();

        let changes = listener.changes.lock().unwrap();
        let kinds: Vec<EntityChange> = changes.iter().map(|(kind, _)| *kind).collect();
        assert_eq!(
            kinds,
            vec![EntityChange::Created, EntityChange::Updated, EntityChange::Removed]
        );
        assert_eq!(changes[1].1, json!({"id": 1, "title": "b"}));
    }

    #[tokio::test]
    async fn test_cache_is_cleared_on_change() {
        let cache = CacheManager::new(
            CacheConfig {
                enabled: true,
                ..Default::default()
            },
            "posts",
        )
        .unwrap();
        let service = DbService::builder(ServiceSettings::named("posts"))
            .cache(cache)
            .build()
            .unwrap();
        let ctx = ctx();
        service.create(&ctx, json!({"id": 1})).await.unwrap();

        let count = || service.count(&ctx, CountParams::default());
        assert_eq!(count().await.unwrap(), json!(1));

        // bypassing the service leaves the cached answer in place
        let mut record = Document::new();
        record.insert("_id".to_string(), json!(2));
        service.adapter().insert(record).await.unwrap();
        assert_eq!(count().await.unwrap(), json!(1));

        service.create(&ctx, json!({"id": 3})).await.unwrap();
        assert_eq!(count().await.unwrap(), json!(3));
    }
}

mod lifecycle_tests {
    use super::*;

    /// Memory adapter whose first `failures` connection attempts fail.
    struct FlakyAdapter {
        inner: MemoryAdapter,
        failures: AtomicU32,
        attempts: AtomicU32,
    }

    impl FlakyAdapter {
        fn new(failures: u32) -> Self {
            Self {
                inner: MemoryAdapter::new(),
                failures: AtomicU32::new(failures),
                attempts: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl StorageAdapter for FlakyAdapter {
        async fn connect(&self) -> DbResult<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(DbError::adapter("connect", anyhow::anyhow!("connection refused")));
            }
            self.inner.connect().await
        }

        async fn disconnect(&self) -> DbResult<()> {
            self.inner.disconnect().await
        }

        async fn find(&self, query: &FindQuery) -> DbResult<Vec<Value>> {
            self.inner.find(query).await
        }

        async fn find_one(&self, query: &Map<String, Value>) -> DbResult<Option<Value>> {
            self.inner.find_one(query).await
        }

        async fn find_by_id(&self, id: &Value) -> DbResult<Option<Value>> {
            self.inner.find_by_id(id).await
        }

        async fn find_by_ids(&self, ids: &[Value]) -> DbResult<Vec<Value>> {
            self.inner.find_by_ids(ids).await
        }

        async fn count(&self, query: &FindQuery) -> DbResult<u64> {
            self.inner.count(query).await
        }

        async fn insert(&self, entity: Document) -> DbResult<Value> {
            self.inner.insert(entity).await
        }

        async fn insert_many(&self, entities: Vec<Document>) -> DbResult<Vec<Value>> {
            self.inner.insert_many(entities).await
        }

        async fn update_many(&self, query: &Map<String, Value>, changes: &Value) -> DbResult<u64> {
            self.inner.update_many(query, changes).await
        }

        async fn update_by_id(&self, id: &Value, changes: &Value) -> DbResult<Option<Value>> {
            self.inner.update_by_id(id, changes).await
        }

        async fn remove_many(&self, query: &Map<String, Value>) -> DbResult<u64> {
            self.inner.remove_many(query).await
        }

        async fn remove_by_id(&self, id: &Value) -> DbResult<Option<Value>> {
            self.inner.remove_by_id(id).await
        }

        async fn clear(&self) -> DbResult<u64> {
            self.inner.clear().await
        }
    }

    fn flaky_service(adapter: Arc<FlakyAdapter>, retries: u32) -> DbService {
        DbService::builder(ServiceSettings {
            connect_retries: retries,
            retry_interval_ms: 1,
            ..ServiceSettings::named("posts")
        })
        .adapter(adapter)
        .build()
        .unwrap()
    }

    #[tokio::test]
    async fn test_connect_retries_until_success() {
        let adapter = Arc::new(FlakyAdapter::new(2));
        let service = flaky_service(adapter.clone(), 3);

        service.connect().await.unwrap();
        assert_eq!(adapter.attempts.load(Ordering::SeqCst), 3);
        assert!(adapter.inner.is_connected());
    }

    #[tokio::test]
    async fn test_connect_gives_up() {
        let adapter = Arc::new(FlakyAdapter::new(5));
        let service = flaky_service(adapter.clone(), 2);

        let err = service.connect().await.unwrap_err();
        assert!(matches!(err, DbError::Adapter { .. }));
        assert_eq!(adapter.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_named_connections() {
        let service = posts();

        let tenant = service
            .open_connection(ConnectionOptions::named("tenant-a"))
            .await
            .unwrap();
        assert!(tenant.is_initialized());
        assert_eq!(service.connection("tenant-a").unwrap().name(), "tenant-a");

        let err = service
            .open_connection(ConnectionOptions::named("tenant-a"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DbError::AlreadyActiveConnection { .. }));

        let results = service.close_connections(&["tenant-a", "tenant-b"]).await;
        assert!(matches!(results[0], Ok(true)));
        assert!(matches!(results[1], Err(DbError::ConnectionNotFound { .. })));
        assert!(!tenant.is_initialized());
        assert!(service.registry().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_closes_everything() {
        let adapter = Arc::new(FlakyAdapter::new(0));
        let service = flaky_service(adapter.clone(), 0);
        service.connect().await.unwrap();

        service.open_connection(ConnectionOptions::named("a")).await.unwrap();
        service.open_connection(ConnectionOptions::named("b")).await.unwrap();
        assert_eq!(service.registry().len(), 2);

        service.disconnect().await.unwrap();
        assert!(service.registry().is_empty());
        assert!(!adapter.inner.is_connected());
    }

    #[tokio::test]
    async fn test_register_actions() {
        let broker = Arc::new(LocalBroker::new());
        let service = Arc::new(posts());
        broker.register_service(&service);

        let names = broker.action_names();
        assert_eq!(names.len(), ACTIONS.len());
        assert!(names.contains(&"posts.get".to_string()));

        let ctx = Context::new(broker);
        ctx.call("posts.create", json!({"id": 1, "title": "via broker"}))
            .await
            .unwrap();
        let doc = ctx.call("posts.get", json!({"id": 1})).await.unwrap();
        assert_eq!(doc["title"], json!("via broker"));
    }
}
