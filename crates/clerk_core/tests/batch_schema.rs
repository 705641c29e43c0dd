use clerk_core::validate::{
    validate_categorization, validate_reorganization, FormatError, SchemaLimits,
};
use serde_json::json;

fn limits() -> SchemaLimits {
    SchemaLimits::default()
}

#[test]
fn empty_item_list_is_valid() {
    assert!(validate_categorization(&json!({"items": []}), &limits()).is_empty());
    assert!(validate_reorganization(&json!({"moves": []}), &limits()).is_empty());
}

#[test]
fn missing_or_null_list_is_one_root_error() {
    let missing = validate_categorization(&json!({}), &limits());
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].entry, None);
    assert_eq!(missing[0].error, FormatError::MissingField("items"));

    let null = validate_categorization(&json!({"items": null}), &limits());
    assert_eq!(null.len(), 1);
    assert_eq!(null[0].error, FormatError::NotAList("items"));

    let not_object = validate_reorganization(&json!(["moves"]), &limits());
    assert_eq!(not_object.len(), 1);
    assert_eq!(not_object[0].error, FormatError::RootNotObject);
}

#[test]
fn four_level_path_is_exactly_one_depth_error() {
    let violations = validate_categorization(
        &json!({"items": [{"item_key": "ABCD1234", "collection_path": "A/B/C/D"}]}),
        &limits(),
    );
    assert_eq!(violations.len(), 1);
    assert!(matches!(
        violations[0].error,
        FormatError::PathTooDeep { max_depth: 3, .. }
    ));
    assert!(violations[0].to_string().starts_with("Item 0: "));
}

#[test]
fn lowercase_key_is_exactly_one_format_error() {
    let violations = validate_categorization(
        &json!({"items": [{"item_key": "abcd1234", "collection_path": "A/B/C"}]}),
        &limits(),
    );
    assert_eq!(violations.len(), 1);
    assert!(matches!(violations[0].error, FormatError::InvalidItemKey(_)));
}

#[test]
fn validation_is_exhaustive_across_entries() {
    let violations = validate_categorization(
        &json!({"items": [
            {"item_key": "ABCD1234", "collection_path": "A"},
            {"item_key": 5, "collection_path": "   ", "tags": ["a", "b", "c", "d", "e", "f"]},
            "not an object",
            {"collection_path": "A", "tags": [1]}
        ]}),
        &limits(),
    );

    let messages: Vec<String> = violations.iter().map(ToString::to_string).collect();
    assert_eq!(messages.len(), 6);
    assert!(messages[0].starts_with("Item 1: "));
    assert!(messages[1].starts_with("Item 1: "));
    assert!(messages[2].starts_with("Item 1: "));
    assert!(messages[3].starts_with("Item 2: "));
    assert!(messages[4].starts_with("Item 3: "));
    assert!(messages[5].starts_with("Item 3: "));
}

#[test]
fn moves_require_both_paths_and_only_new_path_is_depth_capped() {
    let violations = validate_reorganization(
        &json!({"moves": [
            {"item_key": "ABCD1234", "current_path": "A/B/C/D/E", "new_path": "A/B"},
            {"item_key": "ABCD1234", "current_path": "A", "new_path": "A/B/C/D"},
            {"item_key": "ABCD1234", "new_path": "A"}
        ]}),
        &limits(),
    );

    let messages: Vec<String> = violations.iter().map(ToString::to_string).collect();
    assert_eq!(messages.len(), 2);
    assert!(messages[0].starts_with("Move 1: "));
    assert!(messages[0].contains("new_path"));
    assert!(messages[1].starts_with("Move 2: "));
    assert!(messages[1].contains("current_path"));
}
