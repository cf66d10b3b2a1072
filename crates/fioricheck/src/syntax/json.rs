//
// syntax/json.rs
//
// Owned JSON syntax tree with byte ranges, built from tree-sitter-json
//

use serde_json::{Map, Number, Value};
use tree_sitter::Node;

use super::TextRange;
use crate::error::AnalysisError;
use crate::parser_pool;

/// A JSON value together with the byte range it occupies in the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonNode {
    pub range: TextRange,
    pub kind: JsonKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JsonKind {
    Object(Vec<JsonProperty>),
    Array(Vec<JsonNode>),
    String(String),
    Number(Number),
    Bool(bool),
    Null,
}

/// A `"key": value` member of an object.
///
/// `range` spans from the opening quote of the key to the end of the value.
/// `value` is `None` only for error-tolerant trees built by hand; trees from
/// [`parse_json`] always carry a value.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonProperty {
    pub range: TextRange,
    pub key: String,
    pub key_range: TextRange,
    pub value: Option<JsonNode>,
}

/// Parse JSON text into an owned [`JsonNode`] tree.
///
/// Any ERROR or MISSING node in the tree-sitter parse makes the whole document
/// malformed; callers decide whether that drops an application or a service.
pub fn parse_json(text: &str) -> Result<JsonNode, AnalysisError> {
    let tree = parser_pool::with_json_parser(|parser| parser.parse(text, None)).ok_or_else(
        || AnalysisError::MalformedJson {
            offset: 0,
            message: "parser produced no tree".to_string(),
        },
    )?;
    let root = tree.root_node();
    if root.has_error() {
        let offset = first_error_offset(root).unwrap_or(0);
        return Err(AnalysisError::MalformedJson {
            offset,
            message: "syntax error".to_string(),
        });
    }

    let mut cursor = root.walk();
    let values: Vec<Node> = root
        .named_children(&mut cursor)
        .filter(|n| n.kind() != "comment")
        .collect();
    match values.as_slice() {
        [single] => convert_value(*single, text),
        [] => Err(AnalysisError::MalformedJson {
            offset: 0,
            message: "empty document".to_string(),
        }),
        [_, second, ..] => Err(AnalysisError::MalformedJson {
            offset: second.start_byte(),
            message: "multiple top-level values".to_string(),
        }),
    }
}

fn first_error_offset(node: Node) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_byte());
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error_offset)
}

fn convert_value(node: Node, text: &str) -> Result<JsonNode, AnalysisError> {
    let range = TextRange::new(node.start_byte(), node.end_byte());
    let kind = match node.kind() {
        "object" => {
            let mut cursor = node.walk();
            let pairs: Vec<Node> = node
                .named_children(&mut cursor)
                .filter(|n| n.kind() == "pair")
                .collect();
            let properties = pairs
                .into_iter()
                .map(|pair| convert_pair(pair, text))
                .collect::<Result<Vec<_>, _>>()?;
            JsonKind::Object(properties)
        }
        "array" => {
            let mut cursor = node.walk();
            let items: Vec<Node> = node
                .named_children(&mut cursor)
                .filter(|n| n.kind() != "comment")
                .collect();
            let items = items
                .into_iter()
                .map(|item| convert_value(item, text))
                .collect::<Result<Vec<_>, _>>()?;
            JsonKind::Array(items)
        }
        "string" => JsonKind::String(decode_string(&text[range.start..range.end])),
        "number" => match serde_json::from_str::<Value>(&text[range.start..range.end]) {
            Ok(Value::Number(number)) => JsonKind::Number(number),
            _ => {
                return Err(AnalysisError::MalformedJson {
                    offset: range.start,
                    message: "invalid number literal".to_string(),
                })
            }
        },
        "true" => JsonKind::Bool(true),
        "false" => JsonKind::Bool(false),
        "null" => JsonKind::Null,
        other => {
            return Err(AnalysisError::MalformedJson {
                offset: range.start,
                message: format!("unexpected node '{}'", other),
            })
        }
    };
    Ok(JsonNode { range, kind })
}

fn convert_pair(pair: Node, text: &str) -> Result<JsonProperty, AnalysisError> {
    let key_node = pair
        .child_by_field_name("key")
        .ok_or_else(|| AnalysisError::MalformedJson {
            offset: pair.start_byte(),
            message: "property without key".to_string(),
        })?;
    let key_range = TextRange::new(key_node.start_byte(), key_node.end_byte());
    let raw_key = &text[key_range.start..key_range.end];
    let key = if key_node.kind() == "string" {
        decode_string(raw_key)
    } else {
        raw_key.to_string()
    };
    let value = pair
        .child_by_field_name("value")
        .map(|value| convert_value(value, text))
        .transpose()?;
    Ok(JsonProperty {
        range: TextRange::new(pair.start_byte(), pair.end_byte()),
        key,
        key_range,
        value,
    })
}

/// Decode a quoted JSON string literal, falling back to the raw contents when
/// the escapes are not valid JSON.
fn decode_string(raw: &str) -> String {
    serde_json::from_str::<String>(raw).unwrap_or_else(|_| raw.trim_matches('"').to_string())
}

impl JsonNode {
    pub fn as_object(&self) -> Option<&[JsonProperty]> {
        match &self.kind {
            JsonKind::Object(properties) => Some(properties),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[JsonNode]> {
        match &self.kind {
            JsonKind::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            JsonKind::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.kind {
            JsonKind::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self.kind, JsonKind::Object(_))
    }

    /// Member lookup. Duplicate keys resolve to the last occurrence, matching
    /// how the runtime reads the document.
    pub fn property(&self, key: &str) -> Option<&JsonProperty> {
        self.as_object()?.iter().rev().find(|p| p.key == key)
    }

    pub fn get(&self, key: &str) -> Option<&JsonNode> {
        self.property(key)?.value.as_ref()
    }

    /// Follow a path of member names (array elements by decimal index).
    pub fn at_path<S: AsRef<str>>(&self, path: &[S]) -> Option<&JsonNode> {
        path.iter().try_fold(self, |node, segment| {
            let segment = segment.as_ref();
            match &node.kind {
                JsonKind::Object(_) => node.get(segment),
                JsonKind::Array(items) => items.get(segment.parse::<usize>().ok()?),
                _ => None,
            }
        })
    }

    /// Like [`at_path`](Self::at_path) but returns the member holding the final value.
    pub fn property_at_path<S: AsRef<str>>(&self, path: &[S]) -> Option<&JsonProperty> {
        let (last, parents) = path.split_last()?;
        self.at_path(parents)?.property(last.as_ref())
    }

    /// String value at `path`, if present and a string.
    pub fn str_at<S: AsRef<str>>(&self, path: &[S]) -> Option<&str> {
        self.at_path(path)?.as_str()
    }

    /// Locate the object that directly contains the member spanning `range`,
    /// together with the member's index among its siblings.
    pub fn find_enclosing_object(&self, range: TextRange) -> Option<(&JsonNode, usize)> {
        if !self.range.contains_range(&range) {
            return None;
        }
        match &self.kind {
            JsonKind::Object(properties) => {
                if let Some(index) = properties.iter().position(|p| p.range == range) {
                    return Some((self, index));
                }
                properties
                    .iter()
                    .filter_map(|p| p.value.as_ref())
                    .find_map(|value| value.find_enclosing_object(range))
            }
            JsonKind::Array(items) => items
                .iter()
                .find_map(|item| item.find_enclosing_object(range)),
            _ => None,
        }
    }

    /// Convert to a plain `serde_json::Value`, dropping ranges.
    pub fn to_value(&self) -> Value {
        match &self.kind {
            JsonKind::Object(properties) => {
                let mut map = Map::new();
                for property in properties {
                    let value = property
                        .value
                        .as_ref()
                        .map(JsonNode::to_value)
                        .unwrap_or(Value::Null);
                    map.insert(property.key.clone(), value);
                }
                Value::Object(map)
            }
            JsonKind::Array(items) => Value::Array(items.iter().map(JsonNode::to_value).collect()),
            JsonKind::String(s) => Value::String(s.clone()),
            JsonKind::Number(n) => Value::Number(n.clone()),
            JsonKind::Bool(b) => Value::Bool(*b),
            JsonKind::Null => Value::Null,
        }
    }
}
