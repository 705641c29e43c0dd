//! Row-id level queries used by catalog maintenance.
//!
//! # Invariants
//! - Retired collections are recorded in `deletedCollections`; rows in
//!   `collections` are never deleted.

use crate::repo::catalog_repo::CatalogRepoResult;
use rusqlite::{params, Connection};

/// Item ids linked to one collection, in link order.
pub(crate) fn collection_item_ids(
    conn: &Connection,
    collection_id: i64,
) -> CatalogRepoResult<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT itemID
         FROM collectionItems
         WHERE collectionID = ?1
         ORDER BY orderIndex ASC, itemID ASC;",
    )?;
    let mut rows = stmt.query([collection_id])?;
    let mut item_ids = Vec::new();
    while let Some(row) = rows.next()? {
        item_ids.push(row.get(0)?);
    }
    Ok(item_ids)
}

/// Deletes every link of one collection and returns the removed count.
pub(crate) fn remove_all_links(conn: &Connection, collection_id: i64) -> CatalogRepoResult<usize> {
    Ok(conn.execute(
        "DELETE FROM collectionItems WHERE collectionID = ?1;",
        [collection_id],
    )?)
}

/// Moves every child of `from_id` under `to_id`.
pub(crate) fn reparent_children(
    conn: &Connection,
    from_id: i64,
    to_id: i64,
) -> CatalogRepoResult<usize> {
    Ok(conn.execute(
        "UPDATE collections
         SET parentCollectionID = ?2,
             clientDateModified = CURRENT_TIMESTAMP,
             synced = 0
         WHERE parentCollectionID = ?1;",
        params![from_id, to_id],
    )?)
}

/// Marks one collection as trashed.
pub(crate) fn soft_delete_collection(
    conn: &Connection,
    collection_id: i64,
) -> CatalogRepoResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO deletedCollections (collectionID) VALUES (?1);",
        [collection_id],
    )?;
    Ok(())
}
