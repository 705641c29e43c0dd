//! Hierarchical path resolution.
//!
//! # Responsibility
//! - Map a slash-delimited path to its leaf collection key.
//! - Create missing ancestors root-to-leaf and remember them for the rest
//!   of the session.
//!
//! # Invariants
//! - A snapshot node with a matching path always wins over a cache entry.
//! - A node is never created for a path that already resolves.
//! - Parents are created before children; overlapping prefixes share
//!   ancestors.

use crate::model::collection::{CollectionSnapshot, PATH_SEPARATOR};
use crate::model::key::CollectionKey;
use crate::repo::catalog_repo::{CatalogRepoError, CatalogRepoResult, CatalogWriter};
use crate::validate::path::path_segments;
use log::{debug, error};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum ResolveError {
    /// Path is empty after trim.
    EmptyPath,
    /// Path contains an empty segment (`"A//B"`, `"/A"`).
    EmptySegment { path: String },
    /// Parent vanished between resolution and creation.
    NodeCreate {
        path: String,
        parent: CollectionKey,
        source: CatalogRepoError,
    },
    Store(CatalogRepoError),
}

impl Display for ResolveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPath => write!(f, "collection path is empty"),
            Self::EmptySegment { path } => {
                write!(f, "collection path has an empty segment: {path}")
            }
            Self::NodeCreate { path, parent, .. } => write!(
                f,
                "failed to create collection `{path}`: parent {parent} no longer exists"
            ),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ResolveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NodeCreate { source, .. } => Some(source),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CatalogRepoError> for ResolveError {
    fn from(value: CatalogRepoError) -> Self {
        Self::Store(value)
    }
}

/// Opaque cache position used to undo creations of a failed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheCheckpoint(usize);

/// Paths created during the current session, in creation order.
#[derive(Debug, Clone, Default)]
pub struct ResolutionCache {
    created: Vec<(String, CollectionKey)>,
    index: HashMap<String, usize>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&CollectionKey> {
        self.index.get(path).map(|slot| &self.created[*slot].1)
    }

    pub fn len(&self) -> usize {
        self.created.len()
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
    }

    /// Created `(path, key)` pairs, oldest first.
    pub fn entries(&self) -> &[(String, CollectionKey)] {
        &self.created
    }

    pub fn checkpoint(&self) -> CacheCheckpoint {
        CacheCheckpoint(self.created.len())
    }

    /// Forgets every path recorded after `checkpoint`.
    pub fn restore(&mut self, checkpoint: CacheCheckpoint) {
        for (path, _) in self.created.drain(checkpoint.0.min(self.created.len())..) {
            self.index.remove(&path);
        }
    }

    fn insert(&mut self, path: String, key: CollectionKey) {
        self.index.insert(path.clone(), self.created.len());
        self.created.push((path, key));
    }
}

/// Resolves `path` to its leaf key, calling `create_node(name, parent)` for
/// each missing level.
pub fn resolve_path<F>(
    path: &str,
    snapshot: &CollectionSnapshot,
    cache: &mut ResolutionCache,
    mut create_node: F,
) -> Result<CollectionKey, ResolveError>
where
    F: FnMut(&str, Option<&CollectionKey>) -> CatalogRepoResult<CollectionKey>,
{
    if path.trim().is_empty() {
        return Err(ResolveError::EmptyPath);
    }
    let segments = path_segments(path);
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(ResolveError::EmptySegment {
            path: path.to_string(),
        });
    }

    let mut parent: Option<CollectionKey> = None;
    let mut path_so_far = String::with_capacity(path.len());
    for (depth, segment) in segments.iter().enumerate() {
        if depth > 0 {
            path_so_far.push(PATH_SEPARATOR);
        }
        path_so_far.push_str(segment);

        let key = if let Some(key) = snapshot.key_for_path(&path_so_far) {
            key.clone()
        } else if let Some(key) = cache.get(&path_so_far) {
            key.clone()
        } else {
            match create_node(segment, parent.as_ref()) {
                Ok(key) => {
                    debug!(
                        "event=path_resolve module=hierarchy status=created depth={} key={}",
                        depth + 1,
                        key
                    );
                    cache.insert(path_so_far.clone(), key.clone());
                    key
                }
                Err(CatalogRepoError::ParentNotFound(missing)) => {
                    error!(
                        "event=path_resolve module=hierarchy status=error error_code=node_create_failed depth={} parent={}",
                        depth + 1,
                        missing
                    );
                    return Err(ResolveError::NodeCreate {
                        path: path_so_far,
                        parent: missing.clone(),
                        source: CatalogRepoError::ParentNotFound(missing),
                    });
                }
                Err(err) => return Err(ResolveError::Store(err)),
            }
        };
        parent = Some(key);
    }

    parent.ok_or(ResolveError::EmptyPath)
}

/// Session-scoped resolver over one snapshot.
#[derive(Debug, Clone)]
pub struct HierarchyResolver {
    snapshot: CollectionSnapshot,
    cache: ResolutionCache,
}

impl HierarchyResolver {
    pub fn new(snapshot: CollectionSnapshot) -> Self {
        Self {
            snapshot,
            cache: ResolutionCache::new(),
        }
    }

    /// Resolves `path`, creating missing levels through `writer`.
    pub fn resolve<W: CatalogWriter>(
        &mut self,
        path: &str,
        writer: &W,
    ) -> Result<CollectionKey, ResolveError> {
        resolve_path(path, &self.snapshot, &mut self.cache, |name, parent| {
            writer.create_collection(name, parent)
        })
    }

    /// Looks up an existing path without creating anything.
    pub fn existing_key(&self, path: &str) -> Option<&CollectionKey> {
        self.snapshot
            .key_for_path(path)
            .or_else(|| self.cache.get(path))
    }

    pub fn snapshot(&self) -> &CollectionSnapshot {
        &self.snapshot
    }

    pub fn checkpoint(&self) -> CacheCheckpoint {
        self.cache.checkpoint()
    }

    pub fn restore(&mut self, checkpoint: CacheCheckpoint) {
        self.cache.restore(checkpoint);
    }

    /// Collections created so far, oldest first.
    pub fn created(&self) -> &[(String, CollectionKey)] {
        self.cache.entries()
    }
}
