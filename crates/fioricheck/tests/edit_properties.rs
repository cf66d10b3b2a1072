//! Property tests for the text-edit engine.
//!
//! Generated objects are rendered compactly and pretty-printed; every planned
//! edit must be sorted, non-overlapping and leave text that parses to the
//! expected value.
//!
//! Run with: `cargo test -p fioricheck --test edit_properties`

use std::collections::BTreeMap;

use fioricheck::edit::{apply_edits, plan_edit, EditOperation, EditOptions, TextEdit};
use fioricheck::syntax::parse_json;
use fioricheck::test_utils::fixtures;
use proptest::prelude::*;
use serde_json::{json, Map, Value};

// ============================================================================
// Strategies
// ============================================================================

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|n| json!(n)),
        "[a-zA-Z0-9 ]{0,8}".prop_map(Value::String),
        Just(Value::Null),
    ]
}

fn member_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        3 => leaf(),
        1 => prop::collection::btree_map("[a-z]{1,6}", leaf(), 0..4).prop_map(object),
        1 => prop::collection::vec(leaf(), 0..3).prop_map(Value::Array),
    ]
}

fn object(members: BTreeMap<String, Value>) -> Value {
    Value::Object(members.into_iter().collect::<Map<String, Value>>())
}

/// A non-empty object, rendered either compact or pretty-printed
fn document() -> impl Strategy<Value = (Value, String)> {
    (
        prop::collection::btree_map("[a-z]{1,6}", member_value(), 1..6).prop_map(object),
        any::<bool>(),
    )
        .prop_map(|(value, pretty)| {
            let text = if pretty {
                serde_json::to_string_pretty(&value).unwrap()
            } else {
                serde_json::to_string(&value).unwrap()
            };
            (value, text)
        })
}

// ============================================================================
// Helpers
// ============================================================================

fn edit(text: &str, path: &[String], operation: EditOperation, value: Option<Value>) -> (Vec<TextEdit>, String) {
    let root = parse_json(text).unwrap();
    let edits = plan_edit(text, &root, path, operation, value, &EditOptions::default());
    let out = apply_edits(text, &edits);
    (edits, out)
}

fn reparse(text: &str) -> Value {
    parse_json(text)
        .unwrap_or_else(|e| panic!("edited text does not parse ({}):\n{}", e, text))
        .to_value()
}

fn assert_sorted(edits: &[TextEdit]) {
    for pair in edits.windows(2) {
        assert!(pair[0].range.end <= pair[1].range.start, "edits overlap: {:?}", pair);
    }
}

fn key_at(value: &Value, index: usize) -> String {
    let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
    keys[index % keys.len()].clone()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_delete_keeps_document_valid((value, text) in document(), pick in any::<usize>()) {
        let key = key_at(&value, pick);
        let (edits, out) = edit(&text, &[key.clone()], EditOperation::Delete, None);
        prop_assert!(!edits.is_empty());
        assert_sorted(&edits);

        let mut expected = value.clone();
        expected.as_object_mut().unwrap().remove(&key);
        prop_assert_eq!(reparse(&out), expected);
    }

    #[test]
    fn prop_update_replaces_value((value, text) in document(), pick in any::<usize>(), new in member_value()) {
        let key = key_at(&value, pick);
        let (edits, out) = edit(&text, &[key.clone()], EditOperation::Update, Some(new.clone()));
        prop_assert_eq!(edits.len(), 1);

        let mut expected = value.clone();
        expected[key.as_str()] = new;
        prop_assert_eq!(reparse(&out), expected);
    }

    #[test]
    fn prop_insert_adds_missing_path((value, text) in document(), new in leaf()) {
        let path = vec!["new-member".to_string(), "nested".to_string()];
        let (edits, out) = edit(&text, &path, EditOperation::Insert, Some(new.clone()));
        assert_sorted(&edits);

        let mut expected = value.clone();
        expected["new-member"] = json!({ "nested": new });
        prop_assert_eq!(reparse(&out), expected);
    }

    #[test]
    fn prop_nested_delete_keeps_document_valid((value, text) in document(), pick in any::<usize>()) {
        let key = key_at(&value, pick);
        let Some(inner) = value[key.as_str()].as_object().filter(|m| !m.is_empty()) else {
            return Ok(());
        };
        let inner_key = inner.keys().next().unwrap().clone();
        let (_, out) = edit(&text, &[key.clone(), inner_key.clone()], EditOperation::Delete, None);

        let mut expected = value.clone();
        expected[key.as_str()].as_object_mut().unwrap().remove(&inner_key);
        prop_assert_eq!(reparse(&out), expected);
    }
}

// ============================================================================
// Manifest edits
// ============================================================================

#[test]
fn test_manifest_round_trip_of_settings() {
    let text = fixtures::v4_manifest("TravelList", "/Travel");
    let path: Vec<String> = ["sap.ui5", "routing", "config", "flexibleColumnLayout", "defaultTwoColumnLayoutType"]
        .map(String::from)
        .to_vec();

    let (edits, inserted) = edit(&text, &path, EditOperation::Insert, Some(json!("TwoColumnsMidExpanded")));
    assert_eq!(edits.len(), 1);
    let value = reparse(&inserted);
    assert_eq!(
        value["sap.ui5"]["routing"]["config"]["flexibleColumnLayout"]["defaultTwoColumnLayoutType"],
        "TwoColumnsMidExpanded"
    );
    // Inserted members follow the document's indentation
    assert!(inserted.contains("\n            \"config\": {\n                \"flexibleColumnLayout\": {"));

    let config_path = &path[..3];
    let (_, removed) = edit(&inserted, config_path, EditOperation::Delete, None);
    assert_eq!(reparse(&removed), reparse(&text));
}

#[test]
fn test_unchanged_bytes_outside_edit() {
    let text = fixtures::v4_manifest("TravelList", "/Travel");
    let path: Vec<String> = ["sap.ui5", "flexEnabled"].map(String::from).to_vec();
    let (edits, out) = edit(&text, &path, EditOperation::Update, Some(json!(false)));
    let range = edits[0].range;
    assert_eq!(&out[..range.start], &text[..range.start]);
    assert_eq!(&out[range.start + "false".len()..], &text[range.end..]);
}
