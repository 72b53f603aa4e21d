//! Small stateless helpers shared across reconcilers.

use serde_json::{Map, Value};

/// Normalize a mount path to the server's on-disk convention: no leading
/// slash, exactly one trailing slash.
///
/// ```
/// # use sealkeeper_reconcile::util::normalize;
/// assert_eq!(normalize("kubernetes"), "kubernetes/");
/// assert_eq!(normalize("/kubernetes/"), "kubernetes/");
/// assert_eq!(normalize("a/b/"), "a/b/");
/// ```
#[must_use]
pub fn normalize(path: &str) -> String {
    format!("{}/", path.trim_matches('/'))
}

/// Recursively walk a JSON value and rebuild every object with string keys.
///
/// `serde_json::Value` objects are always string-keyed already, so against
/// this crate's actual input — `config.rs`'s free-form fields are typed
/// `serde_json::Value`/`Map<String, Value>`, and `document.rs` deserializes
/// YAML/JSON straight into that typed `Config`, never through a generic
/// `serde_yaml::Value` stage — this function never encounters a non-string
/// key to coerce. It is a defensive pass matching the hazard a
/// generic-mapping-keyed parse stage would expose (a `serde_yaml::Value`
/// map can have a bool/number/sequence key where a `serde_json::Value` map
/// cannot), kept at the jwt/oidc and secret-engine sub-config call sites in
/// case such a stage is introduced later, not because one exists today.
#[must_use]
pub fn coerce_string_keyed(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k, coerce_string_keyed(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(coerce_string_keyed).collect()),
        other => other,
    }
}

/// Overlay `outer` onto `base`, with keys present in `outer` winning.
///
/// Used to implement the secret-engine backward-compatibility rule where
/// `engine.options` overlays `engine.config.options`.
#[must_use]
pub fn overlay(base: Option<Value>, outer: Option<Value>) -> Option<Value> {
    match (base, outer) {
        (None, None) => None,
        (Some(b), None) => Some(b),
        (None, Some(o)) => Some(o),
        (Some(Value::Object(mut base_map)), Some(Value::Object(outer_map))) => {
            for (k, v) in outer_map {
                base_map.insert(k, v);
            }
            Some(Value::Object(base_map))
        }
        (_, Some(o)) => Some(o),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_adds_trailing_slash() {
        assert_eq!(normalize("kubernetes"), "kubernetes/");
    }

    #[test]
    fn normalize_strips_existing_slashes_then_adds_one() {
        assert_eq!(normalize("/kubernetes/"), "kubernetes/");
        assert_eq!(normalize("kubernetes/"), "kubernetes/");
        assert_eq!(normalize("//kubernetes//"), "kubernetes/");
    }

    #[test]
    fn normalize_preserves_internal_slashes() {
        assert_eq!(normalize("a/b"), "a/b/");
    }

    #[test]
    fn coerce_recurses_into_nested_objects_and_arrays() {
        let value = json!({
            "bound_claims": { "aud": ["a", "b"] },
            "nested": [{ "k": 1 }],
        });
        assert_eq!(coerce_string_keyed(value.clone()), value);
    }

    #[test]
    fn overlay_outer_wins_on_conflicting_keys() {
        let base = Some(json!({ "a": 1, "b": 2 }));
        let outer = Some(json!({ "b": 99, "c": 3 }));
        let merged = overlay(base, outer).unwrap();
        assert_eq!(merged, json!({ "a": 1, "b": 99, "c": 3 }));
    }

    #[test]
    fn overlay_with_only_base_returns_base() {
        let base = Some(json!({ "a": 1 }));
        assert_eq!(overlay(base.clone(), None), base);
    }

    #[test]
    fn overlay_with_neither_returns_none() {
        assert_eq!(overlay(None, None), None);
    }
}
