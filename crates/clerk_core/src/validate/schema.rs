//! Batch descriptor schema validation.
//!
//! # Responsibility
//! - Check categorization (`items`) and reorganization (`moves`) descriptors
//!   before any session is opened.
//!
//! # Invariants
//! - Validation is exhaustive: every violation is reported, in entry order.
//! - An empty entry list is valid; a missing or non-list field is not.
//! - Entry-level violations carry the zero-based entry index.

use crate::model::batch::BatchKind;
use crate::validate::path::{
    validate_item_key, validate_path, validate_tags, FormatError, MAX_COLLECTION_DEPTH,
    MAX_TAGS_PER_ITEM,
};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};

/// Limits applied while validating batch entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaLimits {
    /// Max segments for `collection_path` and `new_path`.
    pub max_depth: usize,
    /// Max entries in `tags`.
    pub max_tags: usize,
}

impl Default for SchemaLimits {
    fn default() -> Self {
        Self {
            max_depth: MAX_COLLECTION_DEPTH,
            max_tags: MAX_TAGS_PER_ITEM,
        }
    }
}

/// Position of one entry inside a batch list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryRef {
    pub kind: BatchKind,
    pub index: usize,
}

impl Display for EntryRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind.entry_label(), self.index)
    }
}

/// One schema violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// `None` for root-level violations.
    pub entry: Option<EntryRef>,
    pub error: FormatError,
}

impl Display for SchemaViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.entry {
            Some(entry) => write!(f, "{entry}: {}", self.error),
            None => write!(f, "{}", self.error),
        }
    }
}

/// Validates a categorization descriptor (`{"items": [...]}`).
pub fn validate_categorization(data: &Value, limits: &SchemaLimits) -> Vec<SchemaViolation> {
    validate_batch(data, BatchKind::Categorization, |entry, errors| {
        check_item_key(entry, errors);
        match entry.get("collection_path") {
            None => errors.push(FormatError::MissingField("collection_path")),
            Some(value) => {
                if let Err(err) = validate_path(value, "collection_path", limits.max_depth) {
                    errors.push(err);
                }
            }
        }
        if let Some(tags) = entry.get("tags") {
            if let Err(err) = validate_tags(tags, limits.max_tags) {
                errors.push(err);
            }
        }
        check_optional_strings(entry, errors);
    })
}

/// Validates a reorganization descriptor (`{"moves": [...]}`).
pub fn validate_reorganization(data: &Value, limits: &SchemaLimits) -> Vec<SchemaViolation> {
    validate_batch(data, BatchKind::Reorganization, |entry, errors| {
        check_item_key(entry, errors);
        // current_path names an existing collection, so it has no depth cap.
        match entry.get("current_path") {
            None => errors.push(FormatError::MissingField("current_path")),
            Some(value) => {
                if let Err(err) = validate_path(value, "current_path", usize::MAX) {
                    errors.push(err);
                }
            }
        }
        match entry.get("new_path") {
            None => errors.push(FormatError::MissingField("new_path")),
            Some(value) => {
                if let Err(err) = validate_path(value, "new_path", limits.max_depth) {
                    errors.push(err);
                }
            }
        }
        check_optional_strings(entry, errors);
    })
}

fn validate_batch<F>(data: &Value, kind: BatchKind, check_entry: F) -> Vec<SchemaViolation>
where
    F: Fn(&Map<String, Value>, &mut Vec<FormatError>),
{
    let root_violation = |error| {
        vec![SchemaViolation {
            entry: None,
            error,
        }]
    };

    let Some(root) = data.as_object() else {
        return root_violation(FormatError::RootNotObject);
    };
    let field = kind.list_field();
    let Some(list) = root.get(field) else {
        return root_violation(FormatError::MissingField(field));
    };
    let Some(entries) = list.as_array() else {
        return root_violation(FormatError::NotAList(field));
    };

    let mut violations = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        let entry_ref = EntryRef { kind, index };
        let mut errors = Vec::new();
        match entry.as_object() {
            Some(object) => check_entry(object, &mut errors),
            None => errors.push(FormatError::EntryNotObject),
        }
        violations.extend(errors.into_iter().map(|error| SchemaViolation {
            entry: Some(entry_ref),
            error,
        }));
    }
    violations
}

fn check_item_key(entry: &Map<String, Value>, errors: &mut Vec<FormatError>) {
    match entry.get("item_key") {
        None => errors.push(FormatError::MissingField("item_key")),
        Some(value) => {
            if let Err(err) = validate_item_key(value) {
                errors.push(err);
            }
        }
    }
}

fn check_optional_strings(entry: &Map<String, Value>, errors: &mut Vec<FormatError>) {
    for field in ["title", "reasoning"] {
        if let Some(value) = entry.get(field) {
            if !value.is_string() {
                errors.push(FormatError::NotAString(field));
            }
        }
    }
}
