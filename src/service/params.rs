//! Typed action parameters.
//!
//! Callers send loosely typed JSON: lists may arrive as arrays or as space or
//! comma separated strings, numbers as numeric strings and queries as JSON
//! text. Deserialization normalizes all of these.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use crate::transform::TransformParams;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindParams {
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub populate: Option<Vec<String>>,

    #[serde(default, deserialize_with = "lenient::string_list")]
    pub fields: Option<Vec<String>>,

    #[serde(default, deserialize_with = "lenient::string_list")]
    pub exclude_fields: Option<Vec<String>>,

    #[serde(default, deserialize_with = "lenient::string_list")]
    pub sort: Option<Vec<String>>,

    #[serde(default, deserialize_with = "lenient::number")]
    pub limit: Option<u64>,

    #[serde(default, deserialize_with = "lenient::number")]
    pub offset: Option<u64>,

    #[serde(default)]
    pub search: Option<String>,

    #[serde(default, deserialize_with = "lenient::string_list")]
    pub search_fields: Option<Vec<String>>,

    #[serde(default, deserialize_with = "lenient::object")]
    pub query: Option<Map<String, Value>>,
}

/// `limit`, `offset` and shaping options are accepted and ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountParams {
    #[serde(default)]
    pub search: Option<String>,

    #[serde(default, deserialize_with = "lenient::string_list")]
    pub search_fields: Option<Vec<String>>,

    #[serde(default, deserialize_with = "lenient::object")]
    pub query: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub populate: Option<Vec<String>>,

    #[serde(default, deserialize_with = "lenient::string_list")]
    pub fields: Option<Vec<String>>,

    #[serde(default, deserialize_with = "lenient::string_list")]
    pub exclude_fields: Option<Vec<String>>,

    #[serde(default, deserialize_with = "lenient::string_list")]
    pub sort: Option<Vec<String>>,

    #[serde(default, deserialize_with = "lenient::number")]
    #[validate(range(min = 1, message = "Page must be at least 1"))]
    pub page: Option<u64>,

    #[serde(default, deserialize_with = "lenient::number")]
    #[validate(range(min = 1, message = "Page size must be at least 1"))]
    pub page_size: Option<u64>,

    #[serde(default)]
    pub search: Option<String>,

    #[serde(default, deserialize_with = "lenient::string_list")]
    pub search_fields: Option<Vec<String>>,

    #[serde(default, deserialize_with = "lenient::object")]
    pub query: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetParams {
    /// One identity value or an array of them
    pub id: Value,

    /// Answer with an id to document object instead of an array
    #[serde(default)]
    pub mapping: bool,

    #[serde(default, deserialize_with = "lenient::string_list")]
    pub populate: Option<Vec<String>>,

    #[serde(default, deserialize_with = "lenient::string_list")]
    pub fields: Option<Vec<String>>,

    #[serde(default, deserialize_with = "lenient::string_list")]
    pub exclude_fields: Option<Vec<String>>,
}

impl GetParams {
    pub fn new(id: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            mapping: false,
            populate: None,
            fields: None,
            exclude_fields: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertParams {
    #[serde(default)]
    pub entity: Option<Value>,

    #[serde(default)]
    pub entities: Option<Vec<Value>>,
}

/// `id` plus the changes, sent side by side: `{"id": 1, "title": "new"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateParams {
    pub id: Value,

    #[serde(flatten)]
    pub changes: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveParams {
    pub id: Value,
}

impl FindParams {
    pub fn transform_params(&self) -> TransformParams {
        TransformParams {
            populate: self.populate.clone(),
            fields: self.fields.clone(),
            exclude_fields: self.exclude_fields.clone(),
        }
    }
}

impl ListParams {
    pub fn transform_params(&self) -> TransformParams {
        TransformParams {
            populate: self.populate.clone(),
            fields: self.fields.clone(),
            exclude_fields: self.exclude_fields.clone(),
        }
    }
}

impl GetParams {
    pub fn transform_params(&self) -> TransformParams {
        TransformParams {
            populate: self.populate.clone(),
            fields: self.fields.clone(),
            exclude_fields: self.exclude_fields.clone(),
        }
    }
}

mod lenient {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use serde_json::{Map, Value};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringList {
        Text(String),
        List(Vec<String>),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Number {
        Unsigned(u64),
        Signed(i64),
        Float(f64),
        Text(String),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Object {
        Map(Map<String, Value>),
        Text(String),
    }

    /// Array or separated string; an empty result is `None`.
    pub fn string_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let items: Vec<String> = match Option::<StringList>::deserialize(deserializer)? {
            None => return Ok(None),
            Some(StringList::Text(text)) => text
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect(),
            Some(StringList::List(list)) => list
                .into_iter()
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect(),
        };
        Ok((!items.is_empty()).then_some(items))
    }

    /// Non-negative integer or its decimal text.
    pub fn number<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Number>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Number::Unsigned(n)) => Ok(Some(n)),
            Some(Number::Signed(n)) => Err(D::Error::custom(format!(
                "expected a non-negative integer, got {}",
                n
            ))),
            Some(Number::Float(n)) if n.fract() == 0.0 && n >= 0.0 => Ok(Some(n as u64)),
            Some(Number::Float(n)) => Err(D::Error::custom(format!(
                "expected a non-negative integer, got {}",
                n
            ))),
            Some(Number::Text(text)) if text.trim().is_empty() => Ok(None),
            Some(Number::Text(text)) => text.trim().parse::<u64>().map(Some).map_err(|_| {
                D::Error::custom(format!("expected a non-negative integer, got '{}'", text))
            }),
        }
    }

    /// Object or its JSON text.
    pub fn object<'de, D>(deserializer: D) -> Result<Option<Map<String, Value>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Object>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Object::Map(map)) => Ok(Some(map)),
            Some(Object::Text(text)) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(map)) => Ok(Some(map)),
                _ => Err(D::Error::custom(format!(
                    "expected a JSON object, got '{}'",
                    text
                ))),
            },
        }
    }
}
