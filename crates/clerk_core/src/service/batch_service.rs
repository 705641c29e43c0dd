//! Batch application use-cases.
//!
//! # Responsibility
//! - Validate categorization and reorganization descriptors.
//! - Apply every entry inside exactly one write session.
//! - Report one outcome per entry.
//!
//! # Invariants
//! - A descriptor that fails validation causes zero mutations and opens no
//!   session.
//! - An empty batch opens no session and takes no backup.
//! - A skipped entry leaves no partial writes (nodes, links or tags).
//! - Storage failures abort the batch and roll the whole session back.
//! - Entries are applied strictly in descriptor order.

use crate::config::ClerkConfig;
use crate::db::{with_write_session, SessionError, WriteSession};
use crate::hierarchy::{HierarchyResolver, ResolveError};
use crate::model::batch::{
    BatchKind, CategorizationBatch, CategorizationEntry, MoveEntry, ReorganizationBatch,
};
use crate::model::key::{CollectionKey, ItemKey};
use crate::repo::catalog_repo::{
    CatalogReader, CatalogRepoError, CatalogWriter, LinkOutcome, TagOutcome, UnlinkOutcome,
};
use crate::validate::{validate_categorization, validate_reorganization, EntryRef, SchemaViolation};
use log::{error, info, warn};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub type BatchResult<T> = Result<T, BatchError>;

/// Errors that stop a whole batch.
#[derive(Debug)]
pub enum BatchError {
    /// Descriptor file could not be read.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Descriptor is not valid JSON or does not match the typed shape.
    Json {
        path: Option<PathBuf>,
        source: serde_json::Error,
    },
    /// Descriptor failed schema validation.
    Invalid(Vec<SchemaViolation>),
    Session(SessionError),
    Store(CatalogRepoError),
    /// A storage failure inside one entry aborted the session.
    Aborted { entry: EntryRef, source: EntryError },
}

impl Display for BatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read batch file {}: {source}", path.display())
            }
            Self::Json {
                path: Some(path),
                source,
            } => write!(f, "invalid JSON in {}: {source}", path.display()),
            Self::Json { path: None, source } => write!(f, "invalid batch JSON: {source}"),
            Self::Invalid(violations) => {
                write!(f, "batch failed validation ({} errors)", violations.len())?;
                for violation in violations {
                    write!(f, "\n  {violation}")?;
                }
                Ok(())
            }
            Self::Session(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Aborted { entry, source } => {
                write!(f, "{entry}: batch aborted and rolled back: {source}")
            }
        }
    }
}

impl Error for BatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            Self::Invalid(_) => None,
            Self::Session(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Aborted { source, .. } => Some(source),
        }
    }
}

impl From<SessionError> for BatchError {
    fn from(value: SessionError) -> Self {
        Self::Session(value)
    }
}

impl From<CatalogRepoError> for BatchError {
    fn from(value: CatalogRepoError) -> Self {
        Self::Store(value)
    }
}

/// Errors confined to one entry.
#[derive(Debug)]
pub enum EntryError {
    /// `current_path` names no existing collection.
    CurrentPathNotFound(String),
    Resolve(ResolveError),
    Store(CatalogRepoError),
}

impl EntryError {
    /// Returns `true` when the error must abort the whole session.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Self::Store(CatalogRepoError::Db(_))
                | Self::Resolve(ResolveError::Store(CatalogRepoError::Db(_)))
        )
    }
}

impl Display for EntryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CurrentPathNotFound(path) => {
                write!(f, "current collection not found: {path}")
            }
            Self::Resolve(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for EntryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CurrentPathNotFound(_) => None,
            Self::Resolve(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<CatalogRepoError> for EntryError {
    fn from(value: CatalogRepoError) -> Self {
        Self::Store(value)
    }
}

impl From<ResolveError> for EntryError {
    fn from(value: ResolveError) -> Self {
        Self::Resolve(value)
    }
}

/// What happened to one entry.
#[derive(Debug)]
pub enum EntryOutcome {
    /// Categorization entry linked into its collection.
    Filed {
        collection_key: CollectionKey,
        link: LinkOutcome,
        tags: TagOutcome,
    },
    /// Move entry linked into `to` and unlinked from `from`.
    Moved {
        from: CollectionKey,
        to: CollectionKey,
        link: LinkOutcome,
        unlink: UnlinkOutcome,
    },
    /// Move whose target is its current collection, which already holds the item.
    Unchanged { collection_key: CollectionKey },
    Skipped(EntryError),
}

impl EntryOutcome {
    pub fn is_applied(&self) -> bool {
        !matches!(self, Self::Skipped(_))
    }
}

#[derive(Debug)]
pub struct EntryReport {
    pub entry: EntryRef,
    pub item_key: ItemKey,
    pub outcome: EntryOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// Batch held no entries; nothing was opened.
    Empty,
    /// Session committed; see entries for per-entry outcomes.
    Applied,
}

/// Result of one applied batch.
#[derive(Debug)]
pub struct BatchReport {
    pub kind: BatchKind,
    pub status: BatchStatus,
    pub entries: Vec<EntryReport>,
    /// Backup taken before the session; `None` for empty batches.
    pub backup_path: Option<PathBuf>,
    /// Collections created during the session, oldest first.
    pub created_collections: Vec<(String, CollectionKey)>,
}

impl BatchReport {
    fn empty(kind: BatchKind) -> Self {
        Self {
            kind,
            status: BatchStatus::Empty,
            entries: Vec::new(),
            backup_path: None,
            created_collections: Vec::new(),
        }
    }

    pub fn applied_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|report| report.outcome.is_applied())
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.entries.len() - self.applied_count()
    }

    /// `true` when the batch had entries and none of them applied.
    pub fn all_failed(&self) -> bool {
        !self.entries.is_empty() && self.applied_count() == 0
    }
}

/// Applies batch descriptors to one catalog database.
#[derive(Debug, Clone)]
pub struct BatchApplier {
    config: ClerkConfig,
}

impl BatchApplier {
    pub fn new(config: ClerkConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClerkConfig {
        &self.config
    }

    /// Files items into collection paths and applies their tags.
    pub fn apply_categorization(&self, data: &Value) -> BatchResult<BatchReport> {
        let violations = validate_categorization(data, &self.config.schema_limits());
        reject_violations(BatchKind::Categorization, violations)?;
        let batch: CategorizationBatch = serde_json::from_value(data.clone())
            .map_err(|source| BatchError::Json { path: None, source })?;

        self.apply_entries(
            BatchKind::Categorization,
            &batch.items,
            |entry| &entry.item_key,
            file_entry,
        )
    }

    /// Moves filed items from their current collection to a new path.
    pub fn apply_reorganization(&self, data: &Value) -> BatchResult<BatchReport> {
        let violations = validate_reorganization(data, &self.config.schema_limits());
        reject_violations(BatchKind::Reorganization, violations)?;
        let batch: ReorganizationBatch = serde_json::from_value(data.clone())
            .map_err(|source| BatchError::Json { path: None, source })?;

        self.apply_entries(
            BatchKind::Reorganization,
            &batch.moves,
            |entry| &entry.item_key,
            move_entry,
        )
    }

    pub fn apply_categorization_file(&self, path: &Path) -> BatchResult<BatchReport> {
        let data = read_batch_file(path)?;
        self.apply_categorization(&data)
    }

    pub fn apply_reorganization_file(&self, path: &Path) -> BatchResult<BatchReport> {
        let data = read_batch_file(path)?;
        self.apply_reorganization(&data)
    }

    fn apply_entries<T, K, A>(
        &self,
        kind: BatchKind,
        entries: &[T],
        item_key: K,
        apply: A,
    ) -> BatchResult<BatchReport>
    where
        K: Fn(&T) -> &ItemKey,
        A: Fn(&WriteSession, &mut HierarchyResolver, &T) -> Result<EntryOutcome, EntryError>,
    {
        if entries.is_empty() {
            info!("event=batch_apply module=service status=ok kind={kind:?} result=empty");
            return Ok(BatchReport::empty(kind));
        }

        let started_at = Instant::now();
        info!(
            "event=batch_apply module=service status=start kind={:?} entries={}",
            kind,
            entries.len()
        );

        let result = with_write_session(&self.config, |session| -> BatchResult<BatchReport> {
            let mut resolver = HierarchyResolver::new(session.list_collections()?);
            let mut reports = Vec::with_capacity(entries.len());

            for (index, entry) in entries.iter().enumerate() {
                let entry_ref = EntryRef { kind, index };
                let checkpoint = resolver.checkpoint();
                let outcome = session.with_savepoint(|writer| apply(writer, &mut resolver, entry));

                let outcome = match outcome {
                    Ok(outcome) => outcome,
                    Err(err) if err.is_session_fatal() => {
                        error!(
                            "event=batch_entry module=service status=error entry=\"{}\" error={}",
                            entry_ref, err
                        );
                        return Err(BatchError::Aborted {
                            entry: entry_ref,
                            source: err,
                        });
                    }
                    Err(err) => {
                        resolver.restore(checkpoint);
                        warn!(
                            "event=batch_entry module=service status=skipped entry=\"{}\" item={} error={}",
                            entry_ref,
                            item_key(entry),
                            err
                        );
                        EntryOutcome::Skipped(err)
                    }
                };

                reports.push(EntryReport {
                    entry: entry_ref,
                    item_key: item_key(entry).clone(),
                    outcome,
                });
            }

            Ok(BatchReport {
                kind,
                status: BatchStatus::Applied,
                entries: reports,
                backup_path: Some(session.backup_path().to_path_buf()),
                created_collections: resolver.created().to_vec(),
            })
        });

        match &result {
            Ok(report) => info!(
                "event=batch_apply module=service status=ok kind={:?} applied={} skipped={} created={} duration_ms={}",
                kind,
                report.applied_count(),
                report.skipped_count(),
                report.created_collections.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=batch_apply module=service status=error kind={:?} duration_ms={} error={}",
                kind,
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }
}

fn file_entry<W: CatalogWriter>(
    writer: &W,
    resolver: &mut HierarchyResolver,
    entry: &CategorizationEntry,
) -> Result<EntryOutcome, EntryError> {
    let collection_key = resolver.resolve(&entry.collection_path, writer)?;
    let link = writer.link_item(&entry.item_key, &collection_key)?;
    let tags = if entry.tags.is_empty() {
        TagOutcome::default()
    } else {
        writer.add_tags(&entry.item_key, &entry.tags)?
    };
    Ok(EntryOutcome::Filed {
        collection_key,
        link,
        tags,
    })
}

fn move_entry<W: CatalogWriter>(
    writer: &W,
    resolver: &mut HierarchyResolver,
    entry: &MoveEntry,
) -> Result<EntryOutcome, EntryError> {
    let from = resolver
        .existing_key(&entry.current_path)
        .cloned()
        .ok_or_else(|| EntryError::CurrentPathNotFound(entry.current_path.clone()))?;
    let to = resolver.resolve(&entry.new_path, writer)?;

    if from == to {
        // An item not yet in the collection still ends up filed there.
        return match writer.link_item(&entry.item_key, &to)? {
            LinkOutcome::AlreadyLinked => Ok(EntryOutcome::Unchanged { collection_key: to }),
            link => Ok(EntryOutcome::Moved {
                from,
                to,
                link,
                unlink: UnlinkOutcome::NotLinked,
            }),
        };
    }

    let link = writer.link_item(&entry.item_key, &to)?;
    let unlink = writer.unlink_item(&entry.item_key, &from)?;
    Ok(EntryOutcome::Moved {
        from,
        to,
        link,
        unlink,
    })
}

fn reject_violations(kind: BatchKind, violations: Vec<SchemaViolation>) -> BatchResult<()> {
    if violations.is_empty() {
        return Ok(());
    }
    warn!(
        "event=batch_validate module=service status=error kind={:?} violations={}",
        kind,
        violations.len()
    );
    Err(BatchError::Invalid(violations))
}

fn read_batch_file(path: &Path) -> BatchResult<Value> {
    let text = fs::read_to_string(path).map_err(|source| BatchError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| BatchError::Json {
        path: Some(path.to_path_buf()),
        source,
    })
}
