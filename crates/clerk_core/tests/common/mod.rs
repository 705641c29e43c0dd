#![allow(dead_code)]

use clerk_core::{CatalogKey, ClerkConfig};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::TempDir;

const CATALOG_SCHEMA_SQL: &str = include_str!("catalog_schema.sql");

// Write sessions are limited to one per process, so fixtures run one at a time.
static SERIAL: Mutex<()> = Mutex::new(());

/// Minimal catalog database in a temporary data directory.
pub struct Catalog {
    dir: TempDir,
    db_path: PathBuf,
    _serial: Option<MutexGuard<'static, ()>>,
}

impl Catalog {
    pub fn new() -> Self {
        let guard = SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Self::create(Some(guard))
    }

    /// Second catalog for a test that already holds one from `new`.
    pub fn sibling(&self) -> Self {
        Self::create(None)
    }

    fn create(serial: Option<MutexGuard<'static, ()>>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("zotero.sqlite");
        let conn = Connection::open(&db_path).unwrap();
        conn.execute_batch(CATALOG_SCHEMA_SQL).unwrap();
        Self {
            dir,
            db_path,
            _serial: serial,
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn config(&self) -> ClerkConfig {
        ClerkConfig::new(&self.db_path)
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.dir.path().join("backups")
    }

    pub fn backup_count(&self) -> usize {
        match std::fs::read_dir(self.backup_dir()) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }

    /// Raw connection for setup and assertions.
    pub fn conn(&self) -> Connection {
        Connection::open(&self.db_path).unwrap()
    }

    /// Inserts one journal article and returns its row id.
    pub fn add_item(&self, key: &str, title: Option<&str>, date_added: &str) -> i64 {
        self.add_item_of_type(key, 1, title, date_added)
    }

    pub fn add_attachment(&self, key: &str) -> i64 {
        let item_id = self.add_item_of_type(key, 3, None, "2024-01-01 00:00:00");
        self.conn()
            .execute(
                "INSERT INTO itemAttachments (itemID) VALUES (?1);",
                [item_id],
            )
            .unwrap();
        item_id
    }

    pub fn add_note(&self, key: &str) -> i64 {
        let item_id = self.add_item_of_type(key, 4, None, "2024-01-01 00:00:00");
        self.conn()
            .execute(
                "INSERT INTO itemNotes (itemID, note) VALUES (?1, 'note');",
                [item_id],
            )
            .unwrap();
        item_id
    }

    pub fn trash_item(&self, item_id: i64) {
        self.conn()
            .execute("INSERT INTO deletedItems (itemID) VALUES (?1);", [item_id])
            .unwrap();
    }

    pub fn set_field(&self, item_id: i64, field_id: i64, value: &str) {
        let conn = self.conn();
        conn.execute(
            "INSERT OR IGNORE INTO itemDataValues (value) VALUES (?1);",
            [value],
        )
        .unwrap();
        let value_id: i64 = conn
            .query_row(
                "SELECT valueID FROM itemDataValues WHERE value = ?1;",
                [value],
                |row| row.get(0),
            )
            .unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO itemData (itemID, fieldID, valueID) VALUES (?1, ?2, ?3);",
            params![item_id, field_id, value_id],
        )
        .unwrap();
    }

    pub fn add_collection(
        &self,
        collection_id: i64,
        key: &str,
        name: &str,
        parent_id: Option<i64>,
    ) {
        self.conn()
            .execute(
                "INSERT INTO collections (collectionID, collectionName, parentCollectionID, libraryID, key)
                 VALUES (?1, ?2, ?3, 1, ?4);",
                params![collection_id, name, parent_id, key],
            )
            .unwrap();
    }

    pub fn trash_collection(&self, collection_id: i64) {
        self.conn()
            .execute(
                "INSERT INTO deletedCollections (collectionID) VALUES (?1);",
                [collection_id],
            )
            .unwrap();
    }

    pub fn link(&self, collection_id: i64, item_id: i64, order_index: i64) {
        self.conn()
            .execute(
                "INSERT INTO collectionItems (collectionID, itemID, orderIndex) VALUES (?1, ?2, ?3);",
                params![collection_id, item_id, order_index],
            )
            .unwrap();
    }

    pub fn count(&self, sql: &str) -> i64 {
        self.conn().query_row(sql, [], |row| row.get(0)).unwrap()
    }

    /// Order positions of one collection, ascending.
    pub fn order_indexes(&self, collection_key: &str) -> Vec<i64> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT ci.orderIndex
                 FROM collectionItems ci
                 INNER JOIN collections c ON c.collectionID = ci.collectionID
                 WHERE c.key = ?1
                 ORDER BY ci.orderIndex ASC;",
            )
            .unwrap();
        let rows = stmt
            .query_map([collection_key], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<i64>, _>>()
            .unwrap();
        rows
    }

    /// Item keys linked to one collection, in link order.
    pub fn items_in(&self, collection_key: &CatalogKey) -> Vec<String> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT i.key
                 FROM collectionItems ci
                 INNER JOIN collections c ON c.collectionID = ci.collectionID
                 INNER JOIN items i ON i.itemID = ci.itemID
                 WHERE c.key = ?1
                 ORDER BY ci.orderIndex ASC;",
            )
            .unwrap();
        let rows = stmt
            .query_map([collection_key.as_str()], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<String>, _>>()
            .unwrap();
        rows
    }

    fn add_item_of_type(
        &self,
        key: &str,
        item_type_id: i64,
        title: Option<&str>,
        date_added: &str,
    ) -> i64 {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO items (itemTypeID, dateAdded, libraryID, key) VALUES (?1, ?2, 1, ?3);",
            params![item_type_id, date_added, key],
        )
        .unwrap();
        let item_id = conn.last_insert_rowid();
        drop(conn);
        if let Some(title) = title {
            self.set_field(item_id, 1, title);
        }
        item_id
    }
}

pub fn key(value: &str) -> CatalogKey {
    CatalogKey::parse(value).unwrap()
}
