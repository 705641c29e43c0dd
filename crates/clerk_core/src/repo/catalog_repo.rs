//! Catalog repository contracts and SQLite queries.
//!
//! # Responsibility
//! - Define the read and write operations core performs on the catalog.
//! - Keep SQL details for collections, links and tags inside this module.
//!
//! # Invariants
//! - Trashed collections (`deletedCollections`) are invisible to every read.
//! - Links are inserted only when absent, at `MAX(orderIndex) + 1` (or 0).
//! - Item-tag associations are inserted only when absent.
//! - Only `collectionItems` rows are ever deleted.

use crate::db::DbError;
use crate::model::collection::{CollectionRow, CollectionSnapshot};
use crate::model::item::{ItemDetail, ItemSummary, UNTITLED};
use crate::model::key::{CatalogKey, CollectionKey, ItemKey};
use log::{debug, info, warn};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type used by catalog repository operations.
pub type CatalogRepoResult<T> = Result<T, CatalogRepoError>;

/// Errors from catalog repository operations.
#[derive(Debug)]
pub enum CatalogRepoError {
    /// Underlying SQLite error.
    Db(DbError),
    /// No item row has this key.
    ItemNotFound(ItemKey),
    /// No active collection has this key.
    CollectionNotFound(CollectionKey),
    /// Stated parent collection does not exist at creation time.
    ParentNotFound(CollectionKey),
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl CatalogRepoError {
    /// Returns `true` for missing-record errors that only affect one entry.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ItemNotFound(_) | Self::CollectionNotFound(_) | Self::ParentNotFound(_)
        )
    }
}

impl Display for CatalogRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::ItemNotFound(key) => write!(f, "item not found: {key}"),
            Self::CollectionNotFound(key) => write!(f, "collection not found: {key}"),
            Self::ParentNotFound(key) => write!(f, "parent collection not found: {key}"),
            Self::MissingRequiredTable(table) => {
                write!(f, "catalog database requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "catalog database requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid catalog data: {message}"),
        }
    }
}

impl Error for CatalogRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for CatalogRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for CatalogRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Outcome of one link insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// New link row at this order position.
    Linked { order_index: i64 },
    /// Link already existed; nothing written.
    AlreadyLinked,
}

/// Outcome of one link removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlinkOutcome {
    Removed,
    NotLinked,
}

/// Outcome of one tag application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagOutcome {
    /// Tags newly associated with the item.
    pub added: Vec<String>,
    /// Tags the item already carried.
    pub already_present: Vec<String>,
}

/// Read operations available in every open session.
pub trait CatalogReader {
    /// Lists active collections with derived paths.
    fn list_collections(&self) -> CatalogRepoResult<CollectionSnapshot>;
    /// Lists regular items that belong to no collection.
    fn list_unfiled_items(&self) -> CatalogRepoResult<Vec<ItemSummary>>;
    /// Lists regular items that belong to at least one collection.
    fn list_filed_items(&self) -> CatalogRepoResult<Vec<ItemSummary>>;
    /// Loads all fields and tags of one item.
    fn get_item_detail(&self, item_key: &ItemKey) -> CatalogRepoResult<ItemDetail>;
    /// Lists the paths of every active collection holding the item.
    fn get_item_collection_paths(&self, item_key: &ItemKey) -> CatalogRepoResult<Vec<String>>;
}

/// Mutations available in read-write sessions only.
pub trait CatalogWriter: CatalogReader {
    /// Creates one collection and returns its fresh key.
    fn create_collection(
        &self,
        name: &str,
        parent_key: Option<&CollectionKey>,
    ) -> CatalogRepoResult<CollectionKey>;
    /// Adds the item to the collection unless already present.
    fn link_item(
        &self,
        item_key: &ItemKey,
        collection_key: &CollectionKey,
    ) -> CatalogRepoResult<LinkOutcome>;
    /// Removes the item from the collection if present.
    fn unlink_item(
        &self,
        item_key: &ItemKey,
        collection_key: &CollectionKey,
    ) -> CatalogRepoResult<UnlinkOutcome>;
    /// Adds tags to the item, creating tag rows as needed.
    fn add_tags(&self, item_key: &ItemKey, tag_names: &[String]) -> CatalogRepoResult<TagOutcome>;
    /// Runs `f` so that its writes are undone when it returns `Err`.
    fn with_savepoint<T, E, F>(&self, f: F) -> Result<T, E>
    where
        Self: Sized,
        E: From<CatalogRepoError>,
        F: FnOnce(&Self) -> Result<T, E>;
}

const ITEM_SUMMARY_SELECT_SQL: &str = "SELECT
    i.itemID AS item_id,
    i.key AS item_key,
    COALESCE(t.typeName, 'unknown') AS item_type,
    (
        SELECT v.value
        FROM itemData d
        INNER JOIN fields f ON f.fieldID = d.fieldID
        INNER JOIN itemDataValues v ON v.valueID = d.valueID
        WHERE d.itemID = i.itemID
          AND f.fieldName = 'title'
        LIMIT 1
    ) AS title
FROM items i
LEFT JOIN itemTypes t ON t.itemTypeID = i.itemTypeID
WHERE NOT EXISTS (SELECT 1 FROM itemAttachments a WHERE a.itemID = i.itemID)
  AND NOT EXISTS (SELECT 1 FROM itemNotes n WHERE n.itemID = i.itemID)
  AND NOT EXISTS (SELECT 1 FROM deletedItems di WHERE di.itemID = i.itemID)";

pub(crate) fn list_collections(conn: &Connection) -> CatalogRepoResult<CollectionSnapshot> {
    let mut stmt = conn.prepare(
        "SELECT collectionID, collectionName, parentCollectionID, key
         FROM collections
         WHERE collectionID NOT IN (SELECT collectionID FROM deletedCollections)
         ORDER BY collectionID ASC;",
    )?;
    let mut rows = stmt.query([])?;
    let mut collection_rows = Vec::new();
    while let Some(row) = rows.next()? {
        let key_text: String = row.get(3)?;
        collection_rows.push(CollectionRow {
            collection_id: row.get(0)?,
            name: row.get(1)?,
            parent_id: row.get(2)?,
            key: parse_key(&key_text, "collections.key")?,
        });
    }
    Ok(CollectionSnapshot::from_rows(collection_rows))
}

pub(crate) fn list_items(conn: &Connection, filed: bool) -> CatalogRepoResult<Vec<ItemSummary>> {
    let link_clause = if filed {
        "EXISTS (SELECT 1 FROM collectionItems ci WHERE ci.itemID = i.itemID)"
    } else {
        "NOT EXISTS (SELECT 1 FROM collectionItems ci WHERE ci.itemID = i.itemID)"
    };
    let sql = format!(
        "{ITEM_SUMMARY_SELECT_SQL}
           AND {link_clause}
         ORDER BY i.dateAdded DESC, i.itemID ASC;"
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse_item_summary_row(row)?);
    }
    Ok(items)
}

pub(crate) fn get_item_detail(
    conn: &Connection,
    item_key: &ItemKey,
) -> CatalogRepoResult<ItemDetail> {
    let (item_id, item_type): (i64, String) = conn
        .query_row(
            "SELECT i.itemID, COALESCE(t.typeName, 'unknown')
             FROM items i
             LEFT JOIN itemTypes t ON t.itemTypeID = i.itemTypeID
             WHERE i.key = ?1;",
            [item_key.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?
        .ok_or_else(|| CatalogRepoError::ItemNotFound(item_key.clone()))?;

    let mut fields = BTreeMap::new();
    let mut stmt = conn.prepare(
        "SELECT f.fieldName, v.value
         FROM itemData d
         INNER JOIN fields f ON f.fieldID = d.fieldID
         INNER JOIN itemDataValues v ON v.valueID = d.valueID
         WHERE d.itemID = ?1;",
    )?;
    let mut rows = stmt.query([item_id])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(0)?;
        let value: rusqlite::types::Value = row.get(1)?;
        fields.insert(name, value_to_text(value));
    }

    let mut tags = Vec::new();
    let mut stmt = conn.prepare(
        "SELECT t.name
         FROM itemTags it
         INNER JOIN tags t ON t.tagID = it.tagID
         WHERE it.itemID = ?1
         ORDER BY t.name ASC;",
    )?;
    let mut rows = stmt.query([item_id])?;
    while let Some(row) = rows.next()? {
        tags.push(row.get(0)?);
    }

    Ok(ItemDetail {
        item_id,
        key: item_key.clone(),
        item_type,
        fields,
        tags,
    })
}

pub(crate) fn get_item_collection_paths(
    conn: &Connection,
    item_key: &ItemKey,
) -> CatalogRepoResult<Vec<String>> {
    let item_id = require_item_id(conn, item_key)?;
    let snapshot = list_collections(conn)?;

    let mut stmt = conn.prepare(
        "SELECT c.key
         FROM collectionItems ci
         INNER JOIN collections c ON c.collectionID = ci.collectionID
         WHERE ci.itemID = ?1
         ORDER BY ci.collectionID ASC;",
    )?;
    let mut rows = stmt.query([item_id])?;
    let mut paths = Vec::new();
    while let Some(row) = rows.next()? {
        let key_text: String = row.get(0)?;
        let key = parse_key(&key_text, "collections.key")?;
        // Trashed collections are absent from the snapshot.
        if let Some(node) = snapshot.get(&key) {
            paths.push(node.path.clone());
        }
    }
    Ok(paths)
}

pub(crate) fn create_collection(
    conn: &Connection,
    name: &str,
    parent_key: Option<&CollectionKey>,
) -> CatalogRepoResult<CollectionKey> {
    let (parent_id, library_id) = match parent_key {
        Some(parent_key) => {
            let (parent_id, library_id): (i64, i64) = conn
                .query_row(
                    "SELECT collectionID, libraryID
                     FROM collections
                     WHERE key = ?1
                       AND collectionID NOT IN (SELECT collectionID FROM deletedCollections);",
                    [parent_key.as_str()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?
                .ok_or_else(|| CatalogRepoError::ParentNotFound(parent_key.clone()))?;
            (Some(parent_id), library_id)
        }
        None => (None, default_library_id(conn)?),
    };

    let key = CatalogKey::generate();
    conn.execute(
        "INSERT INTO collections (
            collectionName,
            parentCollectionID,
            libraryID,
            key,
            version,
            synced,
            clientDateModified
        ) VALUES (?1, ?2, ?3, ?4, 0, 0, CURRENT_TIMESTAMP);",
        params![name, parent_id, library_id, key.as_str()],
    )?;

    info!(
        "event=collection_create module=repo status=ok key={} parent={}",
        key,
        parent_key.map_or("-", CatalogKey::as_str)
    );
    Ok(key)
}

pub(crate) fn link_item(
    conn: &Connection,
    item_key: &ItemKey,
    collection_key: &CollectionKey,
) -> CatalogRepoResult<LinkOutcome> {
    let item_id = require_item_id(conn, item_key)?;
    let collection_id = require_collection_id(conn, collection_key)?;
    let outcome = insert_link_if_absent(conn, collection_id, item_id)?;
    match outcome {
        LinkOutcome::Linked { order_index } => debug!(
            "event=item_link module=repo status=ok item={} collection={} order_index={}",
            item_key, collection_key, order_index
        ),
        LinkOutcome::AlreadyLinked => info!(
            "event=item_link module=repo status=skipped reason=already_linked item={} collection={}",
            item_key, collection_key
        ),
    }
    Ok(outcome)
}

pub(crate) fn unlink_item(
    conn: &Connection,
    item_key: &ItemKey,
    collection_key: &CollectionKey,
) -> CatalogRepoResult<UnlinkOutcome> {
    let item_id = require_item_id(conn, item_key)?;
    let collection_id = require_collection_id(conn, collection_key)?;
    let removed = conn.execute(
        "DELETE FROM collectionItems WHERE collectionID = ?1 AND itemID = ?2;",
        params![collection_id, item_id],
    )?;
    let outcome = if removed == 0 {
        UnlinkOutcome::NotLinked
    } else {
        UnlinkOutcome::Removed
    };
    debug!(
        "event=item_unlink module=repo status=ok item={} collection={} removed={}",
        item_key,
        collection_key,
        removed > 0
    );
    Ok(outcome)
}

pub(crate) fn add_tags(
    conn: &Connection,
    item_key: &ItemKey,
    tag_names: &[String],
) -> CatalogRepoResult<TagOutcome> {
    let item_id = require_item_id(conn, item_key)?;
    let mut outcome = TagOutcome::default();
    let mut seen = HashSet::new();

    for name in tag_names {
        if name.trim().is_empty() {
            warn!(
                "event=tag_add module=repo status=skipped reason=blank_tag item={}",
                item_key
            );
            continue;
        }
        if !seen.insert(name.as_str()) {
            continue;
        }

        let tag_id = match conn
            .query_row("SELECT tagID FROM tags WHERE name = ?1;", [name], |row| {
                row.get::<_, i64>(0)
            })
            .optional()?
        {
            Some(tag_id) => tag_id,
            None => {
                conn.execute("INSERT INTO tags (name) VALUES (?1);", [name])?;
                conn.last_insert_rowid()
            }
        };

        let already_tagged: i64 = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM itemTags WHERE itemID = ?1 AND tagID = ?2);",
            params![item_id, tag_id],
            |row| row.get(0),
        )?;
        if already_tagged == 1 {
            outcome.already_present.push(name.clone());
            continue;
        }

        // type 0 marks a manually assigned tag.
        conn.execute(
            "INSERT INTO itemTags (itemID, tagID, type) VALUES (?1, ?2, 0);",
            params![item_id, tag_id],
        )?;
        outcome.added.push(name.clone());
    }

    debug!(
        "event=tag_add module=repo status=ok item={} added={} already_present={}",
        item_key,
        outcome.added.len(),
        outcome.already_present.len()
    );
    Ok(outcome)
}

/// Inserts one link by row ids unless it already exists.
pub(crate) fn insert_link_if_absent(
    conn: &Connection,
    collection_id: i64,
    item_id: i64,
) -> CatalogRepoResult<LinkOutcome> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM collectionItems
            WHERE collectionID = ?1 AND itemID = ?2
        );",
        params![collection_id, item_id],
        |row| row.get(0),
    )?;
    if exists == 1 {
        return Ok(LinkOutcome::AlreadyLinked);
    }

    let order_index: i64 = conn.query_row(
        "SELECT COALESCE(MAX(orderIndex), -1) + 1
         FROM collectionItems
         WHERE collectionID = ?1;",
        [collection_id],
        |row| row.get(0),
    )?;
    conn.execute(
        "INSERT INTO collectionItems (collectionID, itemID, orderIndex) VALUES (?1, ?2, ?3);",
        params![collection_id, item_id, order_index],
    )?;
    Ok(LinkOutcome::Linked { order_index })
}

pub(crate) fn require_item_id(conn: &Connection, item_key: &ItemKey) -> CatalogRepoResult<i64> {
    conn.query_row(
        "SELECT itemID FROM items WHERE key = ?1;",
        [item_key.as_str()],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| CatalogRepoError::ItemNotFound(item_key.clone()))
}

pub(crate) fn require_collection_id(
    conn: &Connection,
    collection_key: &CollectionKey,
) -> CatalogRepoResult<i64> {
    conn.query_row(
        "SELECT collectionID
         FROM collections
         WHERE key = ?1
           AND collectionID NOT IN (SELECT collectionID FROM deletedCollections);",
        [collection_key.as_str()],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| CatalogRepoError::CollectionNotFound(collection_key.clone()))
}

fn default_library_id(conn: &Connection) -> CatalogRepoResult<i64> {
    let library_id: Option<i64> = conn
        .query_row(
            "SELECT libraryID FROM libraries ORDER BY libraryID ASC LIMIT 1;",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(library_id.unwrap_or(1))
}

fn parse_item_summary_row(row: &Row<'_>) -> CatalogRepoResult<ItemSummary> {
    let key_text: String = row.get("item_key")?;
    let title: Option<String> = row.get("title")?;
    Ok(ItemSummary {
        item_id: row.get("item_id")?,
        key: parse_key(&key_text, "items.key")?,
        title: title.unwrap_or_else(|| UNTITLED.to_string()),
        item_type: row.get("item_type")?,
    })
}

fn parse_key(value: &str, column: &'static str) -> CatalogRepoResult<CatalogKey> {
    CatalogKey::parse(value)
        .map_err(|_| CatalogRepoError::InvalidData(format!("invalid key `{value}` in {column}")))
}

fn value_to_text(value: rusqlite::types::Value) -> String {
    use rusqlite::types::Value;
    match value {
        Value::Null => String::new(),
        Value::Integer(number) => number.to_string(),
        Value::Real(number) => number.to_string(),
        Value::Text(text) => text,
        Value::Blob(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
    }
}

const REQUIRED_COLUMNS: &[(&str, &[&str])] = &[
    ("libraries", &["libraryID"]),
    ("items", &["itemID", "itemTypeID", "dateAdded", "key"]),
    ("itemTypes", &["itemTypeID", "typeName"]),
    ("itemData", &["itemID", "fieldID", "valueID"]),
    ("itemDataValues", &["valueID", "value"]),
    ("fields", &["fieldID", "fieldName"]),
    ("itemAttachments", &["itemID"]),
    ("itemNotes", &["itemID"]),
    ("deletedItems", &["itemID"]),
    (
        "collections",
        &[
            "collectionID",
            "collectionName",
            "parentCollectionID",
            "libraryID",
            "key",
        ],
    ),
    ("deletedCollections", &["collectionID"]),
    ("collectionItems", &["collectionID", "itemID", "orderIndex"]),
    ("tags", &["tagID", "name"]),
    ("itemTags", &["itemID", "tagID", "type"]),
];

/// Verifies that the connection exposes every table and column core uses.
pub fn ensure_catalog_ready(conn: &Connection) -> CatalogRepoResult<()> {
    for &(table, columns) in REQUIRED_COLUMNS {
        if !table_exists(conn, table)? {
            return Err(CatalogRepoError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(CatalogRepoError::MissingRequiredColumn { table, column });
            }
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> CatalogRepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> CatalogRepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
