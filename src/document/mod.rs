//! Document model and the primitives used to reshape documents.
//!
//! - [`path`]: dotted-path get/set/unset over JSON trees
//! - [`identity`]: native identity attribute ↔ service identity field
//! - [`projection`]: field inclusion, authorization and exclusion

pub mod identity;
pub mod path;
pub mod projection;

use serde_json::{Map, Value};

pub use identity::{IdCodec, PassthroughIdCodec, from_storage_form, to_storage_form};
pub use path::{get_path, is_falsy, set_path, unset_path};
pub use projection::{authorize, exclude, project};

/// One stored record as an ordered field map.
pub type Document = Map<String, Value>;

/// Stable textual key for an identity value.
///
/// Strings map to themselves, every other value to its JSON text, so `1` and
/// `"1"` share the key used by mapping responses.
pub fn id_key(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
