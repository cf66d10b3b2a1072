//
// edit/mod.rs
//
// Text-edit engine: exact byte-range edits against manifest text
//

pub mod locate;
pub mod render;

use serde::Serialize;
use serde_json::Value;

use crate::config::AnalysisConfig;
use crate::syntax::{JsonKind, JsonNode, JsonProperty, TextRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditOperation {
    Insert,
    Update,
    Delete,
}

/// Node an edit applies to
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EditTarget<'a> {
    /// Existing object that receives missing members (insert)
    Object(&'a JsonNode),
    /// Existing member (update and delete)
    Property(&'a JsonProperty),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextEditRequest<'a> {
    pub target: EditTarget<'a>,
    pub operation: EditOperation,
    pub value: Option<Value>,
    /// Members to create below the target object, outermost first
    pub missing_path_segments: Vec<String>,
}

/// Replace `range` of the original text with `replacement_text`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextEdit {
    pub range: TextRange,
    pub replacement_text: String,
}

impl TextEdit {
    pub fn new(range: TextRange, replacement_text: impl Into<String>) -> Self {
        Self {
            range,
            replacement_text: replacement_text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditOptions {
    /// Indent width used when the document has no indented line
    pub default_indent: usize,
}

impl Default for EditOptions {
    fn default() -> Self {
        Self { default_indent: 4 }
    }
}

impl From<&AnalysisConfig> for EditOptions {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            default_indent: config.default_indent,
        }
    }
}

// ============================================================================
// Compute
// ============================================================================

/// Compute the edits that carry out `request` on `text`.
///
/// # Arguments
/// * `text` - Document text `root` was parsed from
/// * `root` - Root of the document tree; used to find enclosing objects
/// * `request` - Target node, operation and payload
/// * `options` - Formatting fallbacks
///
/// # Returns
/// Edits sorted by start offset and non-overlapping. An empty list means the
/// request does not fit the node it targets and nothing can be changed safely.
pub fn compute_edit(
    text: &str,
    root: &JsonNode,
    request: &TextEditRequest<'_>,
    options: &EditOptions,
) -> Vec<TextEdit> {
    let edits = match (request.operation, request.target) {
        (EditOperation::Update, EditTarget::Property(property)) => {
            update(text, property, request.value.as_ref(), options)
        }
        (EditOperation::Insert, EditTarget::Object(object)) => insert(
            text,
            object,
            &request.missing_path_segments,
            request.value.as_ref(),
            options,
        ),
        (EditOperation::Delete, EditTarget::Property(property)) => delete(text, root, property),
        (operation, _) => {
            log::debug!("{:?} does not apply to the requested node", operation);
            None
        }
    };
    let mut edits = edits.unwrap_or_default();
    edits.sort_by_key(|edit| (edit.range.start, edit.range.end));
    edits
}

fn update(
    text: &str,
    property: &JsonProperty,
    value: Option<&Value>,
    options: &EditOptions,
) -> Option<Vec<TextEdit>> {
    let current = property.value.as_ref()?;
    let value = value?;
    let unit = locate::detect_indent_unit(text, options.default_indent);
    let indent = locate::line_indent(text, property.range.start);
    let rendered = render::render_value(value, indent, &unit);
    Some(vec![TextEdit::new(
        current.range,
        locate::with_line_ending(rendered, locate::line_ending(text)),
    )])
}

fn insert(
    text: &str,
    object: &JsonNode,
    segments: &[String],
    value: Option<&Value>,
    options: &EditOptions,
) -> Option<Vec<TextEdit>> {
    let JsonKind::Object(members) = &object.kind else {
        log::debug!("Insert target is not an object");
        return None;
    };
    let value = value?;
    let open = object.range.start + 1;
    let close = object.range.end.checked_sub(1)?;
    let eol = locate::line_ending(text);

    if members.is_empty() {
        let unit = locate::detect_indent_unit(text, options.default_indent);
        let parent_indent = locate::line_indent(text, object.range.start);
        let member_indent = format!("{}{}", parent_indent, unit);
        let chain = render::render_member_chain(segments, value, &member_indent, &unit)?;
        // Comments inside the braces stay after the new member
        let edit = if locate::is_blank(text, open, close) {
            let replacement = format!("\n{}{}\n{}", member_indent, chain, parent_indent);
            TextEdit::new(TextRange::new(open, close), locate::with_line_ending(replacement, eol))
        } else {
            let replacement = format!("\n{}{}", member_indent, chain);
            TextEdit::new(TextRange::empty(open), locate::with_line_ending(replacement, eol))
        };
        return Some(vec![edit]);
    }

    if locate::is_single_line(text, object.range.start, object.range.end) {
        let chain = render::render_member_chain_inline(segments, value)?;
        return Some(vec![TextEdit::new(
            TextRange::empty(open),
            format!("{}, ", chain),
        )]);
    }

    let unit = locate::detect_indent_unit(text, options.default_indent);
    let first = &members[0];
    let member_indent = if locate::starts_line(text, first.range.start) {
        locate::line_indent(text, first.range.start).to_string()
    } else {
        format!("{}{}", locate::line_indent(text, object.range.start), unit)
    };
    let chain = render::render_member_chain(segments, value, &member_indent, &unit)?;
    Some(vec![TextEdit::new(
        TextRange::empty(open),
        locate::with_line_ending(format!("\n{}{},", member_indent, chain), eol),
    )])
}

fn delete(text: &str, root: &JsonNode, property: &JsonProperty) -> Option<Vec<TextEdit>> {
    property.value.as_ref()?;
    let (object, index) = root.find_enclosing_object(property.range)?;
    let members = object.as_object()?;
    let is_last = index + 1 == members.len();
    let inline = locate::is_single_line(text, object.range.start, object.range.end);

    if is_last && index > 0 {
        return delete_last(text, &members[index - 1], property);
    }

    let range = match (inline, is_last) {
        // Only member
        (true, true) => property.range,
        (false, true) => whole_line(text, property.range),
        // Followed by a sibling: take the delimiter after the property
        (_, false) => {
            let comma = locate::next_delimiter(text, property.range.end, ',')?;
            let after = locate::skip_blanks(text, comma + 1);
            match locate::skip_newline(text, after) {
                Some(end) if !inline && locate::starts_line(text, property.range.start) => {
                    TextRange::new(locate::line_start(text, property.range.start), end)
                }
                _ => TextRange::new(property.range.start, after),
            }
        }
    };
    Some(vec![TextEdit::new(range, "")])
}

/// Delete the last member of an object: the delimiter after `previous` and
/// the property with the line break or blanks in front of it. Anything else
/// between the two, such as comments, stays.
fn delete_last(text: &str, previous: &JsonProperty, property: &JsonProperty) -> Option<Vec<TextEdit>> {
    let comma = locate::next_delimiter(text, previous.range.end, ',')?;
    let start = if locate::starts_line(text, property.range.start) {
        locate::line_break_before(text, property.range.start)
    } else {
        locate::blanks_before(text, property.range.start)
    }
    .max(comma + 1);

    if start == comma + 1 {
        return Some(vec![TextEdit::new(TextRange::new(comma, property.range.end), "")]);
    }
    Some(vec![
        TextEdit::new(TextRange::new(comma, comma + 1), ""),
        TextEdit::new(TextRange::new(start, property.range.end), ""),
    ])
}

/// `range` widened to its whole line when nothing else shares the line
fn whole_line(text: &str, range: TextRange) -> TextRange {
    if !locate::starts_line(text, range.start) {
        return range;
    }
    let start = locate::line_start(text, range.start);
    let after = locate::skip_blanks(text, range.end);
    match locate::skip_newline(text, after) {
        Some(end) => TextRange::new(start, end),
        None => TextRange::new(start, range.end),
    }
}

// ============================================================================
// Planning and applying
// ============================================================================

/// Build and compute the request for a member path.
///
/// Walks `path` from `root` through existing objects. A path that exists
/// becomes an update (or delete); a path that stops early becomes an insert
/// of the missing segments into the deepest existing object.
pub fn plan_edit(
    text: &str,
    root: &JsonNode,
    path: &[String],
    operation: EditOperation,
    value: Option<Value>,
    options: &EditOptions,
) -> Vec<TextEdit> {
    let mut node = root;
    for (depth, segment) in path.iter().enumerate() {
        let Some(property) = node.property(segment) else {
            if operation == EditOperation::Delete {
                return Vec::new();
            }
            let request = TextEditRequest {
                target: EditTarget::Object(node),
                operation: EditOperation::Insert,
                value,
                missing_path_segments: path[depth..].to_vec(),
            };
            return compute_edit(text, root, &request, options);
        };
        if depth + 1 == path.len() {
            let request = TextEditRequest {
                target: EditTarget::Property(property),
                operation: match operation {
                    EditOperation::Delete => EditOperation::Delete,
                    EditOperation::Insert | EditOperation::Update => EditOperation::Update,
                },
                value,
                missing_path_segments: Vec::new(),
            };
            return compute_edit(text, root, &request, options);
        }
        match property.value.as_ref() {
            Some(child) if child.is_object() => node = child,
            _ => {
                log::debug!("Cannot descend into non-object member '{}'", segment);
                return Vec::new();
            }
        }
    }
    Vec::new()
}

/// Apply sorted, non-overlapping edits to `text`.
///
/// Edits that overlap an earlier one or fall outside the text are skipped.
pub fn apply_edits(text: &str, edits: &[TextEdit]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for edit in edits {
        let (start, end) = (edit.range.start, edit.range.end);
        if start < cursor || end < start || text.get(cursor..start).is_none() || text.get(start..end).is_none() {
            log::warn!("Skipping edit at {}..{}", start, end);
            continue;
        }
        out.push_str(&text[cursor..start]);
        out.push_str(&edit.replacement_text);
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_json;
    use serde_json::json;

    fn segments(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn planned(text: &str, path: &[&str], operation: EditOperation, value: Option<Value>) -> String {
        let root = parse_json(text).unwrap();
        let edits = plan_edit(text, &root, &segments(path), operation, value, &EditOptions::default());
        apply_edits(text, &edits)
    }

    fn reparsed(text: &str) -> Value {
        parse_json(text).expect("edited text parses").to_value()
    }

    #[test]
    fn test_update_replaces_only_value() {
        let text = r#"{"x": false}"#;
        let root = parse_json(text).unwrap();
        let request = TextEditRequest {
            target: EditTarget::Property(root.property("x").unwrap()),
            operation: EditOperation::Update,
            value: Some(json!(true)),
            missing_path_segments: Vec::new(),
        };
        let edits = compute_edit(text, &root, &request, &EditOptions::default());
        assert_eq!(edits.len(), 1);
        assert_eq!(&text[edits[0].range.start..edits[0].range.end], "false");
        assert_eq!(edits[0].replacement_text, "true");
    }

    #[test]
    fn test_update_structured_value_uses_document_indent() {
        let text = "{\n  \"a\": {\n    \"b\": 1\n  }\n}";
        let out = planned(text, &["a", "b"], EditOperation::Update, Some(json!({"c": 2})));
        assert_eq!(out, "{\n  \"a\": {\n    \"b\": {\n      \"c\": 2\n    }\n  }\n}");
    }

    #[test]
    fn test_insert_into_empty_object() {
        let out = planned(r#"{"a":{}}"#, &["a", "b"], EditOperation::Insert, Some(json!(true)));
        assert_eq!(reparsed(&out), json!({"a": {"b": true}}));
    }

    #[test]
    fn test_insert_nested_segments_multiline() {
        let text = "{\n    \"a\": 1\n}";
        let out = planned(text, &["b", "c"], EditOperation::Insert, Some(json!("x")));
        assert_eq!(out, "{\n    \"b\": {\n        \"c\": \"x\"\n    },\n    \"a\": 1\n}");
    }

    #[test]
    fn test_insert_inline_adds_separator() {
        let out = planned(r#"{"a": 1}"#, &["b"], EditOperation::Insert, Some(json!(2)));
        assert_eq!(out, r#"{"b": 2, "a": 1}"#);
    }

    #[test]
    fn test_insert_requires_object() {
        let text = r#"{"a": [1]}"#;
        let root = parse_json(text).unwrap();
        let request = TextEditRequest {
            target: EditTarget::Object(root.get("a").unwrap()),
            operation: EditOperation::Insert,
            value: Some(json!(true)),
            missing_path_segments: segments(&["b"]),
        };
        assert!(compute_edit(text, &root, &request, &EditOptions::default()).is_empty());
    }

    #[test]
    fn test_delete_last_inline() {
        let out = planned(r#"{"a":1,"b":2}"#, &["b"], EditOperation::Delete, None);
        assert_eq!(out, r#"{"a":1}"#);
    }

    #[test]
    fn test_delete_middle_inline() {
        let out = planned(r#"{"a":1,"b":2,"c":3}"#, &["b"], EditOperation::Delete, None);
        assert_eq!(out, r#"{"a":1,"c":3}"#);
    }

    #[test]
    fn test_delete_lines() {
        let text = "{\n    \"a\": 1,\n    \"b\": {\n        \"x\": true\n    },\n    \"c\": 3\n}";
        assert_eq!(
            planned(text, &["b"], EditOperation::Delete, None),
            "{\n    \"a\": 1,\n    \"c\": 3\n}"
        );
        assert_eq!(
            planned(text, &["c"], EditOperation::Delete, None),
            "{\n    \"a\": 1,\n    \"b\": {\n        \"x\": true\n    }\n}"
        );
        assert_eq!(
            planned("{\n    \"a\": 1\n}", &["a"], EditOperation::Delete, None),
            "{\n}"
        );
    }

    #[test]
    fn test_delete_keeps_sibling_on_same_line() {
        let text = "{\n    \"a\": 1, \"b\": 2,\n    \"c\": 3\n}";
        assert_eq!(
            planned(text, &["a"], EditOperation::Delete, None),
            "{\n    \"b\": 2,\n    \"c\": 3\n}"
        );
    }

    #[test]
    fn test_delete_last_keeps_comments() {
        let text = "{\n    \"a\": 1, // keep\n    \"b\": 2\n}";
        let out = planned(text, &["b"], EditOperation::Delete, None);
        assert_eq!(out, "{\n    \"a\": 1 // keep\n}");
        assert_eq!(reparsed(&out), json!({"a": 1}));

        let text = "{\n    \"a\": 1,\n    /* note */\n    \"b\": 2\n}";
        let out = planned(text, &["b"], EditOperation::Delete, None);
        assert_eq!(out, "{\n    \"a\": 1\n    /* note */\n}");
    }

    #[test]
    fn test_insert_keeps_comment_in_empty_object() {
        let text = "{\n    \"a\": { /* note */ }\n}";
        let out = planned(text, &["a", "x"], EditOperation::Insert, Some(json!(1)));
        assert!(out.contains("/* note */"));
        assert_eq!(reparsed(&out), json!({"a": {"x": 1}}));
    }

    #[test]
    fn test_crlf_documents_keep_line_endings() {
        let text = "{\r\n    \"b\": true\r\n}";
        let out = planned(text, &["a"], EditOperation::Insert, Some(json!(1)));
        assert_eq!(out, "{\r\n    \"a\": 1,\r\n    \"b\": true\r\n}");

        let out = planned(text, &["b"], EditOperation::Update, Some(json!({"c": 2})));
        assert_eq!(out, "{\r\n    \"b\": {\r\n        \"c\": 2\r\n    }\r\n}");
        assert!(!out.replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn test_delete_missing_path_is_empty() {
        let text = r#"{"a":1}"#;
        let root = parse_json(text).unwrap();
        let edits = plan_edit(
            text,
            &root,
            &segments(&["b"]),
            EditOperation::Delete,
            None,
            &EditOptions::default(),
        );
        assert!(edits.is_empty());
    }

    #[test]
    fn test_operation_target_mismatch_is_empty() {
        let text = r#"{"a":1}"#;
        let root = parse_json(text).unwrap();
        let request = TextEditRequest {
            target: EditTarget::Object(&root),
            operation: EditOperation::Delete,
            value: None,
            missing_path_segments: Vec::new(),
        };
        assert!(compute_edit(text, &root, &request, &EditOptions::default()).is_empty());
    }

    #[test]
    fn test_apply_skips_overlapping_edits() {
        let edits = vec![
            TextEdit::new(TextRange::new(0, 2), "x"),
            TextEdit::new(TextRange::new(1, 3), "y"),
        ];
        assert_eq!(apply_edits("abcd", &edits), "xcd");
    }
}
