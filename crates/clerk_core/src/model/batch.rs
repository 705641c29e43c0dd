//! Typed batch descriptors.
//!
//! These types are only deserialized after `validate::schema` accepted the
//! raw JSON value, so every key and path they hold is already well-formed.

use crate::model::key::ItemKey;
use serde::{Deserialize, Serialize};

/// Which descriptor shape a batch uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    /// `{"items": [...]}` file-into-collection instructions.
    Categorization,
    /// `{"moves": [...]}` move-between-collections instructions.
    Reorganization,
}

impl BatchKind {
    /// Top-level list field name.
    pub fn list_field(self) -> &'static str {
        match self {
            Self::Categorization => "items",
            Self::Reorganization => "moves",
        }
    }

    /// Entry label used as message prefix.
    pub fn entry_label(self) -> &'static str {
        match self {
            Self::Categorization => "Item",
            Self::Reorganization => "Move",
        }
    }
}

/// Categorization batch: file unfiled items into collection paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorizationBatch {
    pub items: Vec<CategorizationEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorizationEntry {
    pub item_key: ItemKey,
    pub collection_path: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// Reorganization batch: move filed items between collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorganizationBatch {
    pub moves: Vec<MoveEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveEntry {
    pub item_key: ItemKey,
    pub current_path: String,
    pub new_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}
