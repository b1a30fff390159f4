//! Writing values at caret paths inside JSON documents

use serde_json::{Map, Value};

use crate::tree::path::parse_path;

/// Set `value` at a dotted caret path such as `contact[0].name`
///
/// Missing objects along the way are created. An index may replace an
/// existing list item or append one directly after the last.
///
/// # Errors
///
/// Returns a reason when the path is empty, uses a non-numeric bracket,
/// indexes past the end of a list, or crosses a value that is not an object.
pub fn set_at(root: &mut Value, path: &str, value: Value) -> Result<(), String> {
    let parts = parse_path(path);
    if parts.is_empty() {
        return Err("path is empty".to_string());
    }

    let last = parts.len() - 1;
    let mut current = root;
    let mut value = Some(value);

    for (i, part) in parts.iter().enumerate() {
        let index = match part.brackets.as_slice() {
            [] => None,
            [bracket] => Some(
                bracket
                    .parse::<usize>()
                    .map_err(|_| format!("[{}] is not an array index", bracket))?,
            ),
            _ => return Err(format!("{} has more than one index", part.base)),
        };

        let object = current
            .as_object_mut()
            .ok_or_else(|| format!("cannot descend into {} of a non-object", part.base))?;

        let slot = match index {
            None => {
                if i == last {
                    object.insert(part.base.clone(), value.take().unwrap_or(Value::Null));
                    return Ok(());
                }
                object
                    .entry(part.base.clone())
                    .or_insert_with(|| Value::Object(Map::new()))
            }
            Some(n) => {
                let len = match object.get(&part.base) {
                    Some(Value::Array(items)) => items.len(),
                    Some(_) => return Err(format!("{} is not a list", part.base)),
                    None => 0,
                };
                if n > len {
                    return Err(format!(
                        "{}[{}] is past the end of a list of {}",
                        part.base, n, len
                    ));
                }
                let array = object
                    .entry(part.base.clone())
                    .or_insert_with(|| Value::Array(Vec::new()));
                let items = array
                    .as_array_mut()
                    .ok_or_else(|| format!("{} is not a list", part.base))?;
                if n == items.len() {
                    items.push(Value::Object(Map::new()));
                }
                if i == last {
                    items[n] = value.take().unwrap_or(Value::Null);
                    return Ok(());
                }
                &mut items[n]
            }
        };
        current = slot;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_top_level() {
        let mut doc = json!({ "status": "draft" });
        set_at(&mut doc, "status", json!("active")).unwrap();
        assert_eq!(doc["status"], "active");
    }

    #[test]
    fn test_set_indexed_appends_entries() {
        let mut doc = json!({});
        set_at(&mut doc, "contact[0].name", json!("Ann")).unwrap();
        set_at(&mut doc, "contact[1].name", json!("Bob")).unwrap();
        set_at(&mut doc, "contact[0].name", json!("Cy")).unwrap();
        assert_eq!(doc["contact"].as_array().unwrap().len(), 2);
        assert_eq!(doc["contact"][0]["name"], "Cy");
        assert_eq!(doc["contact"][1]["name"], "Bob");
    }

    #[test]
    fn test_index_past_end_rejected() {
        let mut doc = json!({ "contact": [{ "name": "Ann" }] });
        let err = set_at(&mut doc, "contact[4000000000].name", json!("Bob")).unwrap_err();
        assert!(err.contains("past the end"));
        assert_eq!(doc["contact"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_index_past_end_of_missing_list_leaves_document() {
        let mut doc = json!({});
        assert!(set_at(&mut doc, "contact[2].name", json!("Bob")).is_err());
        assert_eq!(doc, json!({}));
    }

    #[test]
    fn test_slice_name_bracket_rejected() {
        let mut doc = json!({});
        let err = set_at(&mut doc, "extension[foo].valueString", json!("x")).unwrap_err();
        assert!(err.contains("not an array index"));
    }

    #[test]
    fn test_cannot_descend_into_scalar() {
        let mut doc = json!({ "status": "draft" });
        assert!(set_at(&mut doc, "status.code", json!("x")).is_err());
    }
}
