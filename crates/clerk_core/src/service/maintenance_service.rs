//! Duplicate-path merge maintenance.
//!
//! # Responsibility
//! - Report collections that share one derived path.
//! - Fold each duplicate into the oldest node with the same path.
//!
//! # Invariants
//! - Runs only inside a write session; batch application never merges.
//! - Shallow groups merge before deeper ones, and the snapshot is rebuilt
//!   after every depth so children that become siblings are caught.
//! - Duplicates are retired through `deletedCollections`, never deleted.

use crate::db::WriteSession;
use crate::model::collection::{CollectionSnapshot, DuplicatePathGroup};
use crate::model::key::CollectionKey;
use crate::repo::catalog_repo::{
    self, CatalogReader, CatalogRepoError, CatalogRepoResult, LinkOutcome,
};
use crate::repo::maintenance_repo;
use log::info;
use serde::Serialize;
use std::time::Instant;

/// Summary of one merge run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub groups_merged: usize,
    /// Links newly added to keepers.
    pub items_moved: usize,
    /// Duplicates recorded as trashed, in merge order.
    pub retired: Vec<CollectionKey>,
}

/// Groups of active collections sharing one path, shallowest first.
pub fn find_duplicate_paths(snapshot: &CollectionSnapshot) -> Vec<DuplicatePathGroup> {
    let mut groups = snapshot.duplicate_groups();
    groups.sort_by_key(DuplicatePathGroup::depth);
    groups
}

/// Merges every duplicate-path group into its keeper.
pub fn merge_duplicate_collections(session: &WriteSession) -> CatalogRepoResult<MergeReport> {
    let started_at = Instant::now();
    let mut report = MergeReport::default();

    loop {
        let snapshot = session.list_collections()?;
        let groups = find_duplicate_paths(&snapshot);
        let Some(depth) = groups.first().map(DuplicatePathGroup::depth) else {
            break;
        };

        for group in groups.iter().filter(|group| group.depth() == depth) {
            merge_group(session, &snapshot, group, &mut report)?;
        }
    }

    info!(
        "event=collection_merge module=service status=ok groups={} items_moved={} retired={} duration_ms={}",
        report.groups_merged,
        report.items_moved,
        report.retired.len(),
        started_at.elapsed().as_millis()
    );
    Ok(report)
}

fn merge_group(
    session: &WriteSession,
    snapshot: &CollectionSnapshot,
    group: &DuplicatePathGroup,
    report: &mut MergeReport,
) -> CatalogRepoResult<()> {
    let conn = session.connection();
    let keeper_id = collection_id(snapshot, &group.keeper)?;

    for duplicate in &group.duplicates {
        let duplicate_id = collection_id(snapshot, duplicate)?;
        for item_id in maintenance_repo::collection_item_ids(conn, duplicate_id)? {
            if let LinkOutcome::Linked { .. } =
                catalog_repo::insert_link_if_absent(conn, keeper_id, item_id)?
            {
                report.items_moved += 1;
            }
        }
        maintenance_repo::remove_all_links(conn, duplicate_id)?;
        let children = maintenance_repo::reparent_children(conn, duplicate_id, keeper_id)?;
        maintenance_repo::soft_delete_collection(conn, duplicate_id)?;

        info!(
            "event=collection_merge module=service status=merged keeper={} retired={} children={}",
            group.keeper, duplicate, children
        );
        report.retired.push(duplicate.clone());
    }

    report.groups_merged += 1;
    Ok(())
}

fn collection_id(snapshot: &CollectionSnapshot, key: &CollectionKey) -> CatalogRepoResult<i64> {
    snapshot
        .get(key)
        .map(|node| node.collection_id)
        .ok_or_else(|| CatalogRepoError::CollectionNotFound(key.clone()))
}
