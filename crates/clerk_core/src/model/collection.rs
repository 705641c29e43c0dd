//! Collection hierarchy read model.
//!
//! # Responsibility
//! - Hold one point-in-time view of active collections.
//! - Derive slash-joined paths from parent links.
//!
//! # Invariants
//! - Paths are derived on read and never persisted.
//! - Node order is `collection_id ASC`; the first node wins a shared path.
//! - A parent that is missing from the view (trashed or dangling) makes the
//!   child a root for path purposes.

use crate::model::key::CollectionKey;
use log::warn;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Path segment separator.
pub const PATH_SEPARATOR: char = '/';

/// Raw collection row as stored by the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionRow {
    pub collection_id: i64,
    pub key: CollectionKey,
    pub name: String,
    pub parent_id: Option<i64>,
}

/// Collection node with its derived path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionNode {
    /// Catalog row id.
    pub collection_id: i64,
    /// Stable collection key.
    pub key: CollectionKey,
    /// User-facing name (one path segment).
    pub name: String,
    /// Parent key. `None` means root-level node.
    pub parent_key: Option<CollectionKey>,
    /// Slash-joined names from root to this node.
    pub path: String,
}

/// Nodes that share one derived path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicatePathGroup {
    pub path: String,
    /// Oldest node (lowest row id) for the path.
    pub keeper: CollectionKey,
    /// Remaining nodes, oldest first.
    pub duplicates: Vec<CollectionKey>,
}

impl DuplicatePathGroup {
    /// Number of path segments.
    pub fn depth(&self) -> usize {
        self.path.split(PATH_SEPARATOR).count()
    }
}

/// Immutable view of all active collections.
#[derive(Debug, Clone, Default)]
pub struct CollectionSnapshot {
    order: Vec<CollectionKey>,
    nodes: BTreeMap<CollectionKey, CollectionNode>,
    path_index: HashMap<String, CollectionKey>,
}

impl CollectionSnapshot {
    /// Builds a snapshot from raw rows.
    ///
    /// Parent lookup is indexed once; each path is computed by an iterative
    /// walk towards the root that stops at the first already-computed
    /// ancestor.
    pub fn from_rows(mut rows: Vec<CollectionRow>) -> Self {
        rows.sort_by_key(|row| row.collection_id);

        let index_by_id: HashMap<i64, usize> = rows
            .iter()
            .enumerate()
            .map(|(index, row)| (row.collection_id, index))
            .collect();
        let parent_index: Vec<Option<usize>> = rows
            .iter()
            .map(|row| {
                row.parent_id
                    .and_then(|parent_id| index_by_id.get(&parent_id).copied())
            })
            .collect();

        let mut paths: Vec<Option<String>> = vec![None; rows.len()];
        for start in 0..rows.len() {
            if paths[start].is_some() {
                continue;
            }

            let mut chain = Vec::new();
            let mut on_chain = HashSet::new();
            let mut cursor = Some(start);
            let mut base: Option<String> = None;
            while let Some(current) = cursor {
                if let Some(known) = &paths[current] {
                    base = Some(known.clone());
                    break;
                }
                if !on_chain.insert(current) {
                    warn!(
                        "event=snapshot_build module=model status=warn reason=parent_cycle collection_id={}",
                        rows[current].collection_id
                    );
                    break;
                }
                chain.push(current);
                cursor = parent_index[current];
            }

            for index in chain.into_iter().rev() {
                let path = match base {
                    Some(parent_path) => {
                        format!("{parent_path}{PATH_SEPARATOR}{}", rows[index].name)
                    }
                    None => rows[index].name.clone(),
                };
                paths[index] = Some(path.clone());
                base = Some(path);
            }
        }

        let mut snapshot = Self::default();
        for (index, row) in rows.iter().enumerate() {
            let path = paths[index].clone().unwrap_or_else(|| row.name.clone());
            let parent_key = parent_index[index].map(|parent| rows[parent].key.clone());
            snapshot
                .path_index
                .entry(path.clone())
                .or_insert_with(|| row.key.clone());
            snapshot.order.push(row.key.clone());
            snapshot.nodes.insert(
                row.key.clone(),
                CollectionNode {
                    collection_id: row.collection_id,
                    key: row.key.clone(),
                    name: row.name.clone(),
                    parent_key,
                    path,
                },
            );
        }
        snapshot
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, key: &CollectionKey) -> Option<&CollectionNode> {
        self.nodes.get(key)
    }

    pub fn contains_key(&self, key: &CollectionKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// Returns the oldest node whose derived path equals `path`.
    pub fn key_for_path(&self, path: &str) -> Option<&CollectionKey> {
        self.path_index.get(path)
    }

    /// Iterates nodes in `collection_id ASC` order.
    pub fn iter(&self) -> impl Iterator<Item = &CollectionNode> {
        self.order.iter().filter_map(|key| self.nodes.get(key))
    }

    /// Groups nodes sharing one derived path, in first-seen order.
    pub fn duplicate_groups(&self) -> Vec<DuplicatePathGroup> {
        let mut grouped: Vec<(String, Vec<CollectionKey>)> = Vec::new();
        let mut slot_by_path: HashMap<&str, usize> = HashMap::new();
        for node in self.iter() {
            match slot_by_path.get(node.path.as_str()) {
                Some(&slot) => grouped[slot].1.push(node.key.clone()),
                None => {
                    slot_by_path.insert(node.path.as_str(), grouped.len());
                    grouped.push((node.path.clone(), vec![node.key.clone()]));
                }
            }
        }

        grouped
            .into_iter()
            .filter(|(_, keys)| keys.len() > 1)
            .map(|(path, mut keys)| {
                let keeper = keys.remove(0);
                DuplicatePathGroup {
                    path,
                    keeper,
                    duplicates: keys,
                }
            })
            .collect()
    }
}
