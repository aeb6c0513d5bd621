//! Relation rules: how one named relation on a document is resolved.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::broker::Context;
use crate::error::DbResult;

/// Locally supplied resolver for a relation.
///
/// Receives the deduplicated keys and the documents themselves, and writes
/// whatever it resolves straight into `docs`. The engine merges nothing on
/// its behalf.
#[async_trait]
pub trait PopulateHandler: Send + Sync {
    async fn resolve(
        &self,
        ids: &[Value],
        docs: &mut [Value],
        rule: &RelationRule,
        ctx: &Context,
    ) -> DbResult<()>;
}

/// Dispatch target of a relation, fixed when the relation is declared.
#[derive(Clone)]
pub enum RuleDispatch {
    /// Remote action called once per relation with the collected ids
    Action {
        action: String,
        params: Map<String, Value>,
        populate: Vec<String>,
    },
    /// Local resolver
    Handler(Arc<dyn PopulateHandler>),
}

impl std::fmt::Debug for RuleDispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleDispatch::Action {
                action,
                params,
                populate,
            } => f
                .debug_struct("Action")
                .field("action", action)
                .field("params", params)
                .field("populate", populate)
                .finish(),
            RuleDispatch::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

/// A declared relation.
#[derive(Debug, Clone)]
pub struct RelationRule {
    /// Dotted path of the key (or key array) on the document
    pub field: String,
    pub dispatch: RuleDispatch,
}

impl RelationRule {
    /// Action rule reading its keys from `field`.
    pub fn action(field: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            dispatch: RuleDispatch::Action {
                action: action.into(),
                params: Map::new(),
                populate: Vec::new(),
            },
        }
    }

    /// Handler rule reading its keys from `field`.
    pub fn handler(field: impl Into<String>, handler: impl PopulateHandler + 'static) -> Self {
        Self {
            field: field.into(),
            dispatch: RuleDispatch::Handler(Arc::new(handler)),
        }
    }

    /// Static parameters merged over the generated call parameters.
    ///
    /// Ignored for handler rules.
    pub fn with_params(mut self, extra: Map<String, Value>) -> Self {
        if let RuleDispatch::Action { params, .. } = &mut self.dispatch {
            *params = extra;
        }
        self
    }

    /// Nested relations always requested from the target action.
    ///
    /// Ignored for handler rules.
    pub fn with_populate(mut self, nested: Vec<String>) -> Self {
        if let RuleDispatch::Action { populate, .. } = &mut self.dispatch {
            *populate = nested;
        }
        self
    }
}

/// Relation rule as written in configuration files.
///
/// ```toml
/// [service.populates]
/// author = "users.get"
///
/// [service.populates.comments]
/// action = "comments.get"
/// field = "commentIds"
/// populate = ["author"]
/// params = { fields = ["text", "author"] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationRuleConfig {
    Action(String),
    Detailed {
        action: String,
        #[serde(default)]
        field: Option<String>,
        #[serde(default)]
        params: Map<String, Value>,
        #[serde(default)]
        populate: Vec<String>,
    },
}

impl RelationRuleConfig {
    /// Resolve into a rule for the relation `name`.
    pub fn into_rule(self, name: &str) -> RelationRule {
        match self {
            RelationRuleConfig::Action(action) => RelationRule::action(name, action),
            RelationRuleConfig::Detailed {
                action,
                field,
                params,
                populate,
            } => RelationRule::action(field.unwrap_or_else(|| name.to_string()), action)
                .with_params(params)
                .with_populate(populate),
        }
    }

    pub fn action(&self) -> &str {
        match self {
            RelationRuleConfig::Action(action) => action,
            RelationRuleConfig::Detailed { action, .. } => action,
        }
    }
}

/// Declared relations of a service, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Relations {
    rules: Vec<(String, RelationRule)>,
}

impl Relations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from configuration entries.
    pub fn from_config(config: &BTreeMap<String, RelationRuleConfig>) -> Self {
        let mut relations = Self::new();
        for (name, rule) in config {
            relations.insert(name.clone(), rule.clone().into_rule(name));
        }
        relations
    }

    /// Declare a relation, replacing an earlier rule with the same name.
    pub fn insert(&mut self, name: impl Into<String>, rule: RelationRule) {
        let name = name.into();
        match self.rules.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = rule,
            None => self.rules.push((name, rule)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&RelationRule> {
        self.rules
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, rule)| rule)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RelationRule)> {
        self.rules.iter().map(|(name, rule)| (name.as_str(), rule))
    }

    pub fn names(&self) -> Vec<&str> {
        self.rules.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
