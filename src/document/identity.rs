//! Identity field renaming between storage form and service form.

use serde_json::Value;

use crate::document::Document;

/// Returns a clone of `doc` with the service identity moved onto the native key.
///
/// When `id_field` equals `native_field`, or the document carries no value
/// under `id_field`, the clone is returned unmodified.
pub fn to_storage_form(doc: &Document, id_field: &str, native_field: &str) -> Document {
    let mut entity = doc.clone();
    if id_field != native_field {
        if let Some(id) = entity.shift_remove(id_field) {
            entity.insert(native_field.to_string(), id);
        }
    }
    entity
}

/// Moves the native identity onto `id_field`, in place.
pub fn from_storage_form(doc: &mut Document, id_field: &str, native_field: &str) {
    if id_field == native_field {
        return;
    }
    if let Some(id) = doc.shift_remove(native_field) {
        doc.insert(id_field.to_string(), id);
    }
}

/// Encodes identity values on the way out and decodes them on the way in.
///
/// Implementations layer opaque-id schemes (hashids, prefixed ids) over the
/// stored identity without touching the rename logic.
pub trait IdCodec: Send + Sync {
    fn encode(&self, id: Value) -> Value {
        id
    }

    fn decode(&self, id: Value) -> Value {
        id
    }
}

/// Default codec: identity values pass through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughIdCodec;

impl IdCodec for PassthroughIdCodec {}
