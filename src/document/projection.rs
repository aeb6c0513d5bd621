//! Field inclusion, authorization and exclusion over documents.

use serde_json::{Map, Value};

use crate::document::path::{get_path, set_path, unset_path};

/// Keeps only the listed dotted paths of `doc`.
///
/// Paths that resolve to nothing are skipped; no placeholder keys are
/// created. An empty path list returns the document unchanged.
pub fn project(doc: &Value, paths: &[String]) -> Value {
    if paths.is_empty() {
        return doc.clone();
    }

    let mut projected = Value::Object(Map::new());
    for path in paths {
        if let Some(value) = get_path(doc, path) {
            set_path(&mut projected, path, value.clone());
        }
    }
    projected
}

/// Intersects the requested paths with the server-side allow-list.
///
/// Without an allow-list every requested path passes. With one, a requested
/// path is kept when it is listed itself or when one of its ancestors is
/// listed; a requested path that is an ancestor of listed entries expands to
/// those entries. Anything else is dropped.
pub fn authorize(requested: &[String], allow_list: Option<&[String]>) -> Vec<String> {
    let Some(allowed) = allow_list.filter(|list| !list.is_empty()) else {
        return requested.to_vec();
    };

    let mut authorized: Vec<String> = Vec::new();
    let mut push = |path: &str| {
        if !authorized.iter().any(|p| p == path) {
            authorized.push(path.to_string());
        }
    };

    for path in requested {
        if allowed.contains(path) {
            push(path.as_str());
            continue;
        }

        if has_allowed_ancestor(path, allowed) {
            push(path.as_str());
            continue;
        }

        let prefix = format!("{}.", path);
        for entry in allowed.iter().filter(|entry| entry.starts_with(&prefix)) {
            push(entry.as_str());
        }
    }

    authorized
}

fn has_allowed_ancestor(path: &str, allowed: &[String]) -> bool {
    let mut current = path;
    while let Some((parent, _)) = current.rsplit_once('.') {
        if allowed.iter().any(|entry| entry == parent) {
            return true;
        }
        current = parent;
    }
    false
}

/// Returns a deep copy of `doc` with every listed path removed.
pub fn exclude(doc: &Value, paths: &[String]) -> Value {
    let mut result = doc.clone();
    for path in paths {
        unset_path(&mut result, path);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn paths(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn sample() -> Value {
        json!({
            "id": 1,
            "title": "Hello",
            "author": {"name": "Ann", "email": "ann@example.com"},
            "votes": 0,
            "deleted": null
        })
    }

    #[test]
    fn test_project_keeps_listed_paths() {
        let projected = project(&sample(), &paths(&["title", "author.name", "missing", "deleted"]));
        assert_eq!(
            projected,
            json!({"title": "Hello", "author": {"name": "Ann"}, "deleted": null})
        );
    }

    #[test]
    fn test_project_empty_list_is_identity() {
        assert_eq!(project(&sample(), &[]), sample());
    }

    #[test]
    fn test_authorize_without_allow_list() {
        let requested = paths(&["a", "b.c"]);
        assert_eq!(authorize(&requested, None), requested);

        let empty: Vec<String> = Vec::new();
        assert_eq!(authorize(&requested, Some(empty.as_slice())), requested);
    }

    #[test]
    fn test_authorize_descendant_of_allowed_prefix() {
        let allowed = paths(&["a", "b"]);
        assert_eq!(
            authorize(&paths(&["a", "b.c"]), Some(allowed.as_slice())),
            paths(&["a", "b.c"])
        );
    }

    #[test]
    fn test_authorize_expands_to_allowed_descendants() {
        let allowed = paths(&["id", "author.name", "author.avatar", "title"]);
        assert_eq!(
            authorize(&paths(&["author", "title"]), Some(allowed.as_slice())),
            paths(&["author.name", "author.avatar", "title"])
        );
    }

    #[test]
    fn test_authorize_drops_unauthorized_and_duplicates() {
        let allowed = paths(&["title", "author"]);
        assert_eq!(
            authorize(
                &paths(&["password", "title", "author.name", "title", "author.name"]),
                Some(allowed.as_slice())
            ),
            paths(&["title", "author.name"])
        );
    }

    #[test]
    fn test_unauthorized_fields_never_projected() {
        let allowed = paths(&["title"]);
        let fields = authorize(&paths(&["title", "author"]), Some(allowed.as_slice()));
        let projected = project(&sample(), &fields);
        assert_eq!(projected, json!({"title": "Hello"}));
    }

    #[test]
    fn test_exclude() {
        let result = exclude(&sample(), &paths(&["author.email", "votes", "nope.deep"]));
        assert_eq!(
            result,
            json!({"id": 1, "title": "Hello", "author": {"name": "Ann"}, "deleted": null})
        );
    }

    fn arb_doc() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i32>().prop_map(Value::from),
            "[a-z]{0,6}".prop_map(Value::from),
        ];
        let nested = prop::collection::btree_map("[a-c]", leaf.clone(), 0..3)
            .prop_map(|m| Value::Object(m.into_iter().collect()));
        prop::collection::btree_map("[a-e]", prop_oneof![leaf, nested], 0..5)
            .prop_map(|m| Value::Object(m.into_iter().collect()))
    }

    fn arb_paths() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-e](\\.[a-c])?", 0..5)
    }

    proptest! {
        #[test]
        fn prop_exclude_is_idempotent(doc in arb_doc(), paths in arb_paths()) {
            let once = exclude(&doc, &paths);
            let twice = exclude(&once, &paths);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_project_contains_exactly_resolvable_paths(doc in arb_doc(), paths in arb_paths()) {
            prop_assume!(!paths.is_empty());
            let projected = project(&doc, &paths);

            for path in &paths {
                match get_path(&doc, path) {
                    Some(value) => prop_assert_eq!(get_path(&projected, path), Some(value)),
                    None => prop_assert!(get_path(&projected, path).is_none()),
                }
            }

            if let Value::Object(map) = &projected {
                for key in map.keys() {
                    let prefix = format!("{key}.");
                    let covered = paths.iter().any(|p| p == key || p.starts_with(&prefix));
                    prop_assert!(covered, "unrequested key {} in projection", key);
                }
            }
        }
    }
}
