//
// edit/render.rs
//
// Rendering of values as manifest text
//

use serde_json::Value;

/// Render `value` for a position whose line is indented by `indent`.
///
/// Scalars render as literal tokens. Non-empty arrays and objects open on the
/// current line, put one member per line at `indent + unit` and close at
/// `indent`.
pub fn render_value(value: &Value, indent: &str, unit: &str) -> String {
    match value {
        Value::Array(items) if !items.is_empty() => {
            let inner = format!("{}{}", indent, unit);
            let members: Vec<String> = items
                .iter()
                .map(|item| format!("{}{}", inner, render_value(item, &inner, unit)))
                .collect();
            format!("[\n{}\n{}]", members.join(",\n"), indent)
        }
        Value::Object(map) if !map.is_empty() => {
            let inner = format!("{}{}", indent, unit);
            let members: Vec<String> = map
                .iter()
                .map(|(key, item)| {
                    format!("{}{}: {}", inner, render_key(key), render_value(item, &inner, unit))
                })
                .collect();
            format!("{{\n{}\n{}}}", members.join(",\n"), indent)
        }
        _ => value.to_string(),
    }
}

/// Render a member name as a quoted string
pub fn render_key(key: &str) -> String {
    Value::String(key.to_string()).to_string()
}

/// Render `"first": ...` where every further segment opens a nested object
/// and the last one holds `value`.
///
/// # Arguments
/// * `segments` - Missing member names, outermost first; must not be empty
/// * `value` - Value of the innermost member
/// * `indent` - Indentation of the line the member starts on
/// * `unit` - One indentation step
pub fn render_member_chain(segments: &[String], value: &Value, indent: &str, unit: &str) -> Option<String> {
    let (first, rest) = segments.split_first()?;
    let rendered = match rest.split_first() {
        None => render_value(value, indent, unit),
        Some(_) => {
            let inner = format!("{}{}", indent, unit);
            let nested = render_member_chain(rest, value, &inner, unit)?;
            format!("{{\n{}{}\n{}}}", inner, nested, indent)
        }
    };
    Some(format!("{}: {}", render_key(first), rendered))
}

/// Single-line variant of [`render_member_chain`] for inline objects
pub fn render_member_chain_inline(segments: &[String], value: &Value) -> Option<String> {
    let (first, rest) = segments.split_first()?;
    let rendered = if rest.is_empty() {
        value.to_string()
    } else {
        format!("{{{}}}", render_member_chain_inline(rest, value)?)
    };
    Some(format!("{}: {}", render_key(first), rendered))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn segments(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_scalars_are_tokens() {
        assert_eq!(render_value(&json!(true), "", "  "), "true");
        assert_eq!(render_value(&json!("a\"b"), "", "  "), r#""a\"b""#);
        assert_eq!(render_value(&json!(1.5), "", "  "), "1.5");
        assert_eq!(render_value(&json!({}), "", "  "), "{}");
    }

    #[test]
    fn test_structured_values_are_indented() {
        let rendered = render_value(&json!({"name": "Inline", "rows": [1, 2]}), "  ", "  ");
        assert_eq!(
            rendered,
            "{\n    \"name\": \"Inline\",\n    \"rows\": [\n      1,\n      2\n    ]\n  }"
        );
    }

    #[test]
    fn test_member_chain() {
        let chain = render_member_chain(&segments(&["a", "b"]), &json!(true), "  ", "  ").unwrap();
        assert_eq!(chain, "\"a\": {\n    \"b\": true\n  }");
        assert!(render_member_chain(&[], &json!(true), "", "  ").is_none());
        assert_eq!(
            render_member_chain_inline(&segments(&["a", "b"]), &json!(1)).unwrap(),
            "\"a\": {\"b\": 1}"
        );
    }
}
