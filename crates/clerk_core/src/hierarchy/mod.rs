//! Collection hierarchy resolution.

pub mod resolver;

pub use resolver::{
    resolve_path, CacheCheckpoint, HierarchyResolver, ResolutionCache, ResolveError,
};
