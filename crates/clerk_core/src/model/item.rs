//! Catalog item read models.
//!
//! Items are owned by the desktop application; core only reads their
//! metadata and mutates their collection links and tags.

use crate::model::key::ItemKey;
use serde::Serialize;
use std::collections::BTreeMap;

/// Title used when an item has no `title` field value.
pub const UNTITLED: &str = "Untitled";

/// One regular (non-attachment, non-note, non-trashed) item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemSummary {
    pub item_id: i64,
    pub key: ItemKey,
    pub title: String,
    pub item_type: String,
}

/// Full metadata for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemDetail {
    pub item_id: i64,
    pub key: ItemKey,
    pub item_type: String,
    /// Field name -> value (e.g. `title`, `abstractNote`).
    pub fields: BTreeMap<String, String>,
    /// Tag names sorted by name.
    pub tags: Vec<String>,
}

impl ItemDetail {
    pub fn title(&self) -> &str {
        self.fields.get("title").map_or(UNTITLED, String::as_str)
    }
}
