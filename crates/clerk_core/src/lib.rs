//! Core logic for research-clerk.
//! Safe batch mutation of a shared reference catalog and hierarchical
//! collection path resolution.

pub mod config;
pub mod db;
pub mod hierarchy;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod validate;

pub use config::{ClerkConfig, ConfigError};
pub use db::{
    with_read_session, with_write_session, DbError, ReadSession, SessionError, SessionResult,
    WriteSession,
};
pub use hierarchy::{HierarchyResolver, ResolveError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::collection::{CollectionNode, CollectionSnapshot, DuplicatePathGroup};
pub use model::item::{ItemDetail, ItemSummary};
pub use model::key::{CatalogKey, CollectionKey, ItemKey, KeyFormatError};
pub use repo::catalog_repo::{
    CatalogReader, CatalogRepoError, CatalogRepoResult, CatalogWriter, LinkOutcome, TagOutcome,
    UnlinkOutcome,
};
pub use service::batch_service::{
    BatchApplier, BatchError, BatchReport, BatchResult, BatchStatus, EntryError, EntryOutcome,
    EntryReport,
};
pub use service::maintenance_service::{
    find_duplicate_paths, merge_duplicate_collections, MergeReport,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
