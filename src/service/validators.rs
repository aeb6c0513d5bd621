//! Entity validation run before every write.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde_json::Value;
use validator::{Validate, ValidationErrors};

use crate::document::get_path;
use crate::error::ValidationFieldError;

/// Checks an entity before it is stored.
pub trait EntityValidator: Send + Sync {
    fn validate(&self, entity: &Value) -> Result<(), Vec<ValidationFieldError>>;
}

impl<F> EntityValidator for F
where
    F: Fn(&Value) -> Result<(), Vec<ValidationFieldError>> + Send + Sync,
{
    fn validate(&self, entity: &Value) -> Result<(), Vec<ValidationFieldError>> {
        self(entity)
    }
}

/// Requires each listed path to hold a non-null value.
#[derive(Debug, Clone, Default)]
pub struct RequiredFieldsValidator {
    fields: Vec<String>,
}

impl RequiredFieldsValidator {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

impl EntityValidator for RequiredFieldsValidator {
    fn validate(&self, entity: &Value) -> Result<(), Vec<ValidationFieldError>> {
        let errors: Vec<ValidationFieldError> = self
            .fields
            .iter()
            .filter(|field| match get_path(entity, field) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(_) => false,
            })
            .map(|field| ValidationFieldError::new(field.as_str(), "is required"))
            .collect();

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Validates entities by deserializing them into a `validator` model.
///
/// ```ignore
/// #[derive(Deserialize, Validate)]
/// struct NewPost {
///     #[validate(length(min = 1, max = 200))]
///     title: String,
/// }
///
/// let validator = SchemaValidator::<NewPost>::new();
/// ```
pub struct SchemaValidator<T> {
    _model: PhantomData<fn() -> T>,
}

impl<T> SchemaValidator<T> {
    pub fn new() -> Self {
        Self {
            _model: PhantomData,
        }
    }
}

impl<T> Default for SchemaValidator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EntityValidator for SchemaValidator<T>
where
    T: DeserializeOwned + Validate,
{
    fn validate(&self, entity: &Value) -> Result<(), Vec<ValidationFieldError>> {
        let model: T = serde_json::from_value(entity.clone())
            .map_err(|e| vec![ValidationFieldError::new("entity", e.to_string())])?;

        model.validate().map_err(|errors| field_errors(&errors))
    }
}

fn field_errors(errors: &ValidationErrors) -> Vec<ValidationFieldError> {
    let mut result: Vec<ValidationFieldError> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| {
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| error.code.to_string());
                ValidationFieldError::new(field.to_string(), message)
            })
        })
        .collect();
    result.sort_by(|a, b| a.field.cmp(&b.field));
    result
}
