//! Primitive shape checks for item keys, collection paths and tag lists.
//!
//! All functions are pure and total: they inspect a JSON value and report at
//! most one `FormatError`.

use crate::model::collection::PATH_SEPARATOR;
use crate::model::key::is_valid_key;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Default maximum number of path segments for target collections.
pub const MAX_COLLECTION_DEPTH: usize = 3;
/// Default maximum number of tags per categorization entry.
pub const MAX_TAGS_PER_ITEM: usize = 5;

/// Malformed input shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Batch root is not a JSON object.
    RootNotObject,
    /// Required field is absent.
    MissingField(&'static str),
    /// Field must hold a JSON array.
    NotAList(&'static str),
    /// List entry is not a JSON object.
    EntryNotObject,
    /// Field must hold a JSON string.
    NotAString(&'static str),
    /// `item_key` does not match `^[A-Z0-9]{8}$`.
    InvalidItemKey(String),
    /// Path is blank after trim.
    EmptyPath(&'static str),
    /// Path has more segments than allowed.
    PathTooDeep {
        field: &'static str,
        max_depth: usize,
        path: String,
    },
    /// Tag list contains a non-string value.
    TagNotAString,
    /// Tag list is longer than allowed.
    TooManyTags { max: usize, count: usize },
}

impl Display for FormatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RootNotObject => write!(f, "root must be a JSON object"),
            Self::MissingField(field) => write!(f, "missing required '{field}' field"),
            Self::NotAList(field) => write!(f, "'{field}' must be a list"),
            Self::EntryNotObject => write!(f, "must be an object"),
            Self::NotAString(field) => write!(f, "'{field}' must be a string"),
            Self::InvalidItemKey(value) => write!(
                f,
                "'item_key' must be 8 uppercase alphanumeric characters (got: {value})"
            ),
            Self::EmptyPath(field) => write!(f, "'{field}' cannot be empty"),
            Self::PathTooDeep {
                field,
                max_depth,
                path,
            } => write!(f, "'{field}' exceeds max {max_depth} levels (got: {path})"),
            Self::TagNotAString => write!(f, "all tags must be strings"),
            Self::TooManyTags { max, count } => {
                write!(f, "too many tags (max {max}, got {count})")
            }
        }
    }
}

impl Error for FormatError {}

/// Checks that `value` is an 8-character `[A-Z0-9]` string.
pub fn validate_item_key(value: &Value) -> Result<(), FormatError> {
    let Some(text) = value.as_str() else {
        return Err(FormatError::NotAString("item_key"));
    };
    if !is_valid_key(text) {
        return Err(FormatError::InvalidItemKey(text.to_string()));
    }
    Ok(())
}

/// Checks that `value` is a non-blank path string with at most `max_depth`
/// segments.
pub fn validate_path(
    value: &Value,
    field: &'static str,
    max_depth: usize,
) -> Result<(), FormatError> {
    let Some(text) = value.as_str() else {
        return Err(FormatError::NotAString(field));
    };
    validate_path_str(text, field, max_depth)
}

/// String form of [`validate_path`].
pub fn validate_path_str(
    path: &str,
    field: &'static str,
    max_depth: usize,
) -> Result<(), FormatError> {
    if path.trim().is_empty() {
        return Err(FormatError::EmptyPath(field));
    }
    if path_depth(path) > max_depth {
        return Err(FormatError::PathTooDeep {
            field,
            max_depth,
            path: path.to_string(),
        });
    }
    Ok(())
}

/// Checks that `value` is a list of at most `max_count` strings.
pub fn validate_tags(value: &Value, max_count: usize) -> Result<(), FormatError> {
    let Some(tags) = value.as_array() else {
        return Err(FormatError::NotAList("tags"));
    };
    if !tags.iter().all(Value::is_string) {
        return Err(FormatError::TagNotAString);
    }
    if tags.len() > max_count {
        return Err(FormatError::TooManyTags {
            max: max_count,
            count: tags.len(),
        });
    }
    Ok(())
}

/// Splits one path into its ordered segments.
pub fn path_segments(path: &str) -> Vec<&str> {
    path.split(PATH_SEPARATOR).collect()
}

/// Number of `/`-separated segments in `path`.
pub fn path_depth(path: &str) -> usize {
    path.matches(PATH_SEPARATOR).count() + 1
}

#[cfg(test)]
mod tests {
    use super::{
        path_depth, path_segments, validate_item_key, validate_path, validate_tags, FormatError,
        MAX_COLLECTION_DEPTH, MAX_TAGS_PER_ITEM,
    };
    use serde_json::json;

    #[test]
    fn item_key_requires_uppercase_alphanumeric_string() {
        assert_eq!(validate_item_key(&json!("ABCD1234")), Ok(()));
        assert_eq!(
            validate_item_key(&json!("abcd1234")),
            Err(FormatError::InvalidItemKey("abcd1234".to_string()))
        );
        assert_eq!(
            validate_item_key(&json!(12345678)),
            Err(FormatError::NotAString("item_key"))
        );
    }

    #[test]
    fn path_rejects_blank_and_too_deep_values() {
        assert_eq!(
            validate_path(&json!("A/B/C"), "collection_path", MAX_COLLECTION_DEPTH),
            Ok(())
        );
        assert_eq!(
            validate_path(&json!("   "), "collection_path", MAX_COLLECTION_DEPTH),
            Err(FormatError::EmptyPath("collection_path"))
        );
        assert!(matches!(
            validate_path(&json!("A/B/C/D"), "new_path", MAX_COLLECTION_DEPTH),
            Err(FormatError::PathTooDeep { field: "new_path", max_depth: 3, .. })
        ));
        assert_eq!(
            validate_path(&json!(null), "new_path", MAX_COLLECTION_DEPTH),
            Err(FormatError::NotAString("new_path"))
        );
    }

    #[test]
    fn unbounded_depth_accepts_long_paths() {
        assert_eq!(
            validate_path(&json!("A/B/C/D/E/F"), "current_path", usize::MAX),
            Ok(())
        );
    }

    #[test]
    fn tags_require_short_string_list() {
        assert_eq!(validate_tags(&json!(["a", "b"]), MAX_TAGS_PER_ITEM), Ok(()));
        assert_eq!(validate_tags(&json!([]), MAX_TAGS_PER_ITEM), Ok(()));
        assert_eq!(
            validate_tags(&json!("a"), MAX_TAGS_PER_ITEM),
            Err(FormatError::NotAList("tags"))
        );
        assert_eq!(
            validate_tags(&json!(["a", 1]), MAX_TAGS_PER_ITEM),
            Err(FormatError::TagNotAString)
        );
        assert_eq!(
            validate_tags(&json!(["1", "2", "3", "4", "5", "6"]), MAX_TAGS_PER_ITEM),
            Err(FormatError::TooManyTags { max: 5, count: 6 })
        );
    }

    #[test]
    fn segments_keep_order() {
        assert_eq!(path_segments("CS/AI/NLP"), vec!["CS", "AI", "NLP"]);
        assert_eq!(path_depth("CS"), 1);
        assert_eq!(path_depth("CS/AI/NLP"), 3);
    }
}
