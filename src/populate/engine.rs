//! Batched relation resolution.

use std::collections::HashSet;

use futures::future::try_join_all;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::broker::Context;
use crate::document::{get_path, id_key, is_falsy, set_path};
use crate::error::DbResult;
use crate::populate::rule::{RelationRule, Relations, RuleDispatch};

/// Requested paths falling under one declared relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupedRequest<'a> {
    pub relation: &'a str,
    pub paths: Vec<&'a str>,
}

/// Resolves declared relations on documents.
///
/// Each relation is resolved with a single call for the whole document set,
/// all relations concurrently. Deeper paths (`author.profile`) are forwarded
/// to the target action as its own `populate` list, so depth is handled by
/// the peer running this same algorithm. There is no depth limit: relation
/// graphs containing cycles recurse for as long as callers keep asking.
#[derive(Debug, Clone, Default)]
pub struct PopulationEngine {
    relations: Relations,
}

impl PopulationEngine {
    pub fn new(relations: Relations) -> Self {
        Self { relations }
    }

    pub fn relations(&self) -> &Relations {
        &self.relations
    }

    /// Populate a single document or an array of documents.
    ///
    /// The result keeps the shape of the input. Values that are neither an
    /// object nor an array are returned untouched.
    pub async fn populate(&self, ctx: &Context, docs: Value, requested: &[String]) -> DbResult<Value> {
        if self.relations.is_empty() || requested.is_empty() {
            return Ok(docs);
        }

        match docs {
            Value::Array(mut list) => {
                self.populate_list(ctx, &mut list, requested).await?;
                Ok(Value::Array(list))
            }
            Value::Object(_) => {
                let mut list = vec![docs];
                self.populate_list(ctx, &mut list, requested).await?;
                Ok(list.pop().unwrap_or(Value::Null))
            }
            other => Ok(other),
        }
    }

    /// Populate documents in place.
    pub async fn populate_list(
        &self,
        ctx: &Context,
        docs: &mut [Value],
        requested: &[String],
    ) -> DbResult<()> {
        let grouped = self.group_requested(requested);
        if grouped.is_empty() {
            return Ok(());
        }

        let mut actions = Vec::new();
        let mut handlers = Vec::new();
        for group in &grouped {
            let Some(rule) = self.relations.get(group.relation) else {
                continue;
            };
            match &rule.dispatch {
                RuleDispatch::Action { action, .. } => actions.push((group, rule, action.as_str())),
                RuleDispatch::Handler(handler) => handlers.push((group, rule, handler)),
            }
        }

        let resolutions = {
            let view: &[Value] = docs;
            try_join_all(
                actions
                    .iter()
                    .map(|&(group, rule, action)| resolve_action(ctx, group, rule, action, view)),
            )
            .await?
        };
        for (field, mapping) in resolutions.into_iter().flatten() {
            merge_mapping(docs, field, &mapping);
        }

        // handlers need the documents mutably, so they run after the action merge;
        // every relation writes its own field
        for (group, rule, handler) in handlers {
            let ids = collect_ids(docs, &rule.field);
            debug!(relation = group.relation, ids = ids.len(), "Populating via handler");
            handler.resolve(&ids, docs, rule, ctx).await?;
        }
        Ok(())
    }

    /// Group requested paths by the declared relation they address.
    ///
    /// A path belongs to a relation when it equals its name or starts with
    /// `name.`; paths matching no relation are dropped.
    pub fn group_requested<'a>(&'a self, requested: &'a [String]) -> Vec<GroupedRequest<'a>> {
        self.relations
            .iter()
            .filter_map(|(name, _)| {
                let paths: Vec<&str> = requested
                    .iter()
                    .map(String::as_str)
                    .filter(|path| is_under_relation(path, name))
                    .collect();
                (!paths.is_empty()).then_some(GroupedRequest {
                    relation: name,
                    paths,
                })
            })
            .collect()
    }
}

/// Run the single remote call of an action relation.
///
/// Yields the relation field and the id mapping to merge, or `None` when
/// there was nothing to resolve.
async fn resolve_action<'a>(
    ctx: &Context,
    group: &GroupedRequest<'_>,
    rule: &'a RelationRule,
    action: &str,
    docs: &[Value],
) -> DbResult<Option<(&'a str, Map<String, Value>)>> {
    let ids = collect_ids(docs, &rule.field);
    if ids.is_empty() {
        return Ok(None);
    }

    let params = action_params(group, rule, ids);
    debug!(relation = group.relation, action = %action, "Populating via action");

    match ctx.call(action, params).await? {
        Value::Object(mapping) => Ok(Some((rule.field.as_str(), mapping))),
        other => {
            warn!(
                relation = group.relation,
                action = %action,
                response = %other,
                "Population response is not a mapping, relation left unresolved"
            );
            Ok(None)
        }
    }
}

fn is_under_relation(path: &str, relation: &str) -> bool {
    path == relation
        || path
            .strip_prefix(relation)
            .is_some_and(|rest| rest.starts_with('.'))
}

/// Collect the keys stored at `field` across documents.
///
/// Arrays are flattened one level, falsy keys dropped and duplicates removed,
/// keeping first-seen order.
pub fn collect_ids(docs: &[Value], field: &str) -> Vec<Value> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();

    let mut push = |id: &Value| {
        if !is_falsy(id) && seen.insert(id.to_string()) {
            ids.push(id.clone());
        }
    };

    for doc in docs {
        match get_path(doc, field) {
            Some(Value::Array(keys)) => keys.iter().for_each(&mut push),
            Some(key) => push(key),
            None => {}
        }
    }
    ids
}

/// Build the parameters of the single call made for one relation.
fn action_params(group: &GroupedRequest<'_>, rule: &RelationRule, ids: Vec<Value>) -> Value {
    let RuleDispatch::Action {
        params: static_params,
        populate: static_populate,
        ..
    } = &rule.dispatch
    else {
        return Value::Null;
    };

    let mut populate: Vec<Value> = group
        .paths
        .iter()
        .filter_map(|path| path.strip_prefix(group.relation))
        .filter_map(|rest| rest.strip_prefix('.'))
        .filter(|rest| !rest.is_empty())
        .map(Value::from)
        .collect();
    populate.extend(static_populate.iter().cloned().map(Value::from));

    let mut params = Map::new();
    params.insert("id".to_string(), Value::Array(ids));
    params.insert("mapping".to_string(), Value::Bool(true));
    if !populate.is_empty() {
        params.insert("populate".to_string(), Value::Array(populate));
    }
    for (key, value) in static_params {
        params.insert(key.clone(), value.clone());
    }
    Value::Object(params)
}

/// Replace the keys at `field` with their resolved sub-documents.
///
/// Key arrays become arrays of the resolved documents, in key order, with
/// unresolved keys dropped. A single unresolved key is left as it was.
fn merge_mapping(docs: &mut [Value], field: &str, mapping: &Map<String, Value>) {
    for doc in docs.iter_mut() {
        let resolved = match get_path(doc, field) {
            Some(Value::Array(keys)) => Some(Value::Array(
                keys.iter()
                    .filter_map(|key| mapping.get(&id_key(key)).cloned())
                    .collect(),
            )),
            Some(key) => mapping.get(&id_key(key)).cloned(),
            None => None,
        };

        if let Some(resolved) = resolved {
            set_path(doc, field, resolved);
        }
    }
}
