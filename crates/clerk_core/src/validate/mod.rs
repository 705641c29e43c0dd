//! Input validation for externally supplied batch descriptors.
//!
//! # Responsibility
//! - Provide pure shape checks (`path`) reused by schema validation and by
//!   hierarchy resolution.
//! - Validate whole descriptors before any database session opens (`schema`).

pub mod path;
pub mod schema;

pub use path::{
    validate_item_key, validate_path, validate_path_str, validate_tags, FormatError,
    MAX_COLLECTION_DEPTH, MAX_TAGS_PER_ITEM,
};
pub use schema::{
    validate_categorization, validate_reorganization, EntryRef, SchemaLimits, SchemaViolation,
};
