//! Nested views over flat dotted keys.

use serde_json::{Map, Value};

use crate::error::{Result, StoreError};

/// Insert `value` at the dotted `path` below `root`, creating objects as needed.
///
/// A path that would put a value where nested entries live (or the other way
/// round) is reported as inconsistent.
pub(crate) fn insert_nested(root: &mut Map<String, Value>, path: &str, value: Value) -> Result<()> {
    let segments: Vec<&str> = path.split('.').collect();
    let (last, parents) = match segments.split_last() {
        Some(split) => split,
        None => return Ok(()),
    };

    let mut current = root;
    for (i, segment) in parents.iter().enumerate() {
        let next = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        current = match next {
            Value::Object(map) => map,
            _ => return Err(StoreError::InconsistentData(segments[..=i].join("."))),
        };
    }

    if matches!(current.get(*last), Some(Value::Object(_))) {
        return Err(StoreError::InconsistentData(path.to_string()));
    }
    current.insert(last.to_string(), value);
    Ok(())
}

/// Build a nested object from `(suffix, value)` pairs.
pub(crate) fn nest<'a, I>(entries: I) -> Result<Value>
where
    I: IntoIterator<Item = (&'a str, Value)>,
{
    let mut root = Map::new();
    for (path, value) in entries {
        insert_nested(&mut root, path, value)?;
    }
    Ok(Value::Object(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_nest_suffixes() {
        let nested = nest(vec![
            ("a.b", json!(1)),
            ("a.c", json!(2)),
            ("d", json!(3)),
        ])
        .unwrap();
        assert_eq!(nested, json!({"a": {"b": 1, "c": 2}, "d": 3}));
    }

    #[test]
    fn test_value_then_nested_is_inconsistent() {
        let err = nest(vec![("a", json!(1)), ("a.b", json!(2))]).unwrap_err();
        assert_eq!(err, StoreError::InconsistentData("a".to_string()));
    }

    #[test]
    fn test_nested_then_value_is_inconsistent() {
        let err = nest(vec![("a.b.c", json!(1)), ("a.b", json!(2))]).unwrap_err();
        assert_eq!(err, StoreError::InconsistentData("a.b".to_string()));
    }

    #[test]
    fn test_empty() {
        assert_eq!(nest(Vec::new()).unwrap(), json!({}));
    }
}
