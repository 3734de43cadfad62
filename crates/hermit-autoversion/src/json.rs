//! Dot-path evaluation over JSON documents.
//!
//! Manifests address values with paths like `tag_name`,
//! `assets.0.sha256` or `build.number`. A path segment is an object key
//! or an array index; a path landing on an array collects its string
//! elements.

use serde_json::Value;

/// Navigate to the value at a dot path.
#[must_use]
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Collect the candidate strings at a dot path: a string yields itself,
/// an array yields its string elements, and other scalars render as JSON.
#[must_use]
pub fn values_at(value: &Value, path: &str) -> Vec<String> {
    match lookup(value, path) {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Some(Value::Null) | None => vec![],
        Some(other) => vec![other.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_and_array_paths() {
        let doc = json!({
            "tag_name": "v1.2.3",
            "build": {"number": "20250117"},
            "assets": [{"sha256": "abc"}, {"sha256": "def"}],
        });
        assert_eq!(values_at(&doc, "tag_name"), ["v1.2.3"]);
        assert_eq!(values_at(&doc, "build.number"), ["20250117"]);
        assert_eq!(values_at(&doc, "assets.0.sha256"), ["abc"]);
        assert_eq!(values_at(&doc, "assets.1.sha256"), ["def"]);
        assert!(values_at(&doc, "missing.path").is_empty());
    }

    #[test]
    fn arrays_collect_elements() {
        let doc = json!({"versions": ["1.0", "1.1", "2.0"]});
        assert_eq!(values_at(&doc, "versions"), ["1.0", "1.1", "2.0"]);
    }
}
