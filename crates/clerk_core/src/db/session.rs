//! Scoped catalog sessions.
//!
//! # Responsibility
//! - Gate write access behind the lock probe and a pre-write backup.
//! - Hold one transaction per write session and end it exactly once.
//!
//! # Invariants
//! - At most one `WriteSession` exists in this process, whatever its file.
//! - A `WriteSession` dropped without `commit` rolls back, including during
//!   panic unwinding.
//! - A busy database is rejected before any backup file is created.
//! - Backups are retained whether the session commits or rolls back.

use crate::config::ClerkConfig;
use crate::db::{create_backup, open_read_only, open_read_write, probe_exclusive_lock};
use crate::db::{DbError, LockProbe};
use crate::model::collection::CollectionSnapshot;
use crate::model::item::{ItemDetail, ItemSummary};
use crate::model::key::{CollectionKey, ItemKey};
use crate::repo::catalog_repo::{
    self, CatalogReader, CatalogRepoError, CatalogRepoResult, CatalogWriter, LinkOutcome,
    TagOutcome, UnlinkOutcome,
};
use log::{error, info, warn};
use once_cell::sync::Lazy;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

const ENTRY_SAVEPOINT: &str = "clerk_entry";

static ACTIVE_WRITE_SESSION: Lazy<Mutex<Option<PathBuf>>> = Lazy::new(|| Mutex::new(None));

pub type SessionResult<T> = Result<T, SessionError>;

/// Errors raised while opening or ending a session.
#[derive(Debug)]
pub enum SessionError {
    /// Configured database file does not exist.
    DatabaseNotFound(PathBuf),
    /// The owning application holds the database.
    ResourceBusy(PathBuf),
    /// This process already has a write session open on the given file.
    WriteSessionActive(PathBuf),
    Db(DbError),
    /// Catalog schema check failed.
    Catalog(CatalogRepoError),
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DatabaseNotFound(path) => {
                write!(f, "catalog database not found: {}", path.display())
            }
            Self::ResourceBusy(path) => write!(
                f,
                "catalog database is in use by another application (close it and retry): {}",
                path.display()
            ),
            Self::WriteSessionActive(path) => write!(
                f,
                "a write session is already open in this process on {}",
                path.display()
            ),
            Self::Db(err) => write!(f, "{err}"),
            Self::Catalog(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Catalog(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for SessionError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SessionError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<CatalogRepoError> for SessionError {
    fn from(value: CatalogRepoError) -> Self {
        match value {
            CatalogRepoError::Db(err) => Self::Db(err),
            other => Self::Catalog(other),
        }
    }
}

/// Read-only session. Skips the lock probe and never takes a backup.
pub struct ReadSession {
    conn: Connection,
    db_path: PathBuf,
}

impl ReadSession {
    pub fn open(config: &ClerkConfig) -> SessionResult<Self> {
        require_database(&config.db_path)?;
        let conn = open_read_only(&config.db_path, config.busy_timeout)?;
        catalog_repo::ensure_catalog_ready(&conn)?;
        info!("event=session_open module=store status=ok mode=read_only");
        Ok(Self {
            conn,
            db_path: config.db_path.clone(),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn close(self) {
        info!("event=session_close module=store status=ok mode=read_only");
    }
}

/// Read-write session holding one `BEGIN IMMEDIATE` transaction.
pub struct WriteSession {
    // Field order matters: the connection closes before the registration
    // is released.
    conn: Connection,
    db_path: PathBuf,
    backup_path: PathBuf,
    finished: bool,
    _registration: Registration,
}

impl WriteSession {
    /// Opens a write session.
    ///
    /// # Side effects
    /// - Claims the single process-wide write session slot.
    /// - Probes the database lock; a held lock ends the attempt here.
    /// - Copies the database to the backup directory.
    /// - Starts an immediate transaction.
    pub fn open(config: &ClerkConfig) -> SessionResult<Self> {
        let started_at = Instant::now();
        require_database(&config.db_path)?;
        let registration = Registration::acquire(&config.db_path)?;

        match probe_exclusive_lock(&config.db_path, config.lock_probe_timeout)? {
            LockProbe::Free => {}
            LockProbe::Held => {
                warn!(
                    "event=session_open module=store status=error mode=read_write error_code=resource_busy duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                return Err(SessionError::ResourceBusy(config.db_path.clone()));
            }
        }

        let backup_path = create_backup(&config.db_path, &config.backup_dir())?;
        let conn = open_read_write(&config.db_path, config.busy_timeout)?;
        conn.execute_batch("BEGIN IMMEDIATE;")?;

        let session = Self {
            conn,
            db_path: config.db_path.clone(),
            backup_path,
            finished: false,
            _registration: registration,
        };
        catalog_repo::ensure_catalog_ready(&session.conn)?;

        info!(
            "event=session_open module=store status=ok mode=read_write duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(session)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Backup taken before this session's first statement.
    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    /// Commits every change made in this session.
    pub fn commit(mut self) -> SessionResult<()> {
        match self.conn.execute_batch("COMMIT;") {
            Ok(()) => {
                self.finished = true;
                info!("event=session_commit module=store status=ok");
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=session_commit module=store status=error error_code=commit_failed error={}",
                    err
                );
                Err(err.into())
            }
        }
    }

    /// Discards every change made in this session.
    pub fn rollback(mut self) -> SessionResult<()> {
        self.finished = true;
        self.conn.execute_batch("ROLLBACK;")?;
        info!("event=session_rollback module=store status=ok reason=requested");
        Ok(())
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Drop for WriteSession {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let reason = if std::thread::panicking() {
            "panic"
        } else {
            "not_committed"
        };
        match self.conn.execute_batch("ROLLBACK;") {
            Ok(()) => warn!("event=session_rollback module=store status=ok reason={reason}"),
            Err(err) => error!(
                "event=session_rollback module=store status=error reason={} error={}",
                reason, err
            ),
        }
    }
}

/// Runs `f` inside one write session; commits on `Ok`, rolls back on `Err`.
pub fn with_write_session<T, E, F>(config: &ClerkConfig, f: F) -> Result<T, E>
where
    E: From<SessionError>,
    F: FnOnce(&WriteSession) -> Result<T, E>,
{
    let session = WriteSession::open(config)?;
    match f(&session) {
        Ok(value) => {
            session.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = session.rollback() {
                error!(
                    "event=session_rollback module=store status=error error={}",
                    rollback_err
                );
            }
            Err(err)
        }
    }
}

/// Runs `f` inside one read-only session.
pub fn with_read_session<T, E, F>(config: &ClerkConfig, f: F) -> Result<T, E>
where
    E: From<SessionError>,
    F: FnOnce(&ReadSession) -> Result<T, E>,
{
    let session = ReadSession::open(config)?;
    let result = f(&session);
    session.close();
    result
}

fn require_database(path: &Path) -> SessionResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(SessionError::DatabaseNotFound(path.to_path_buf()))
    }
}

/// Holds the process-wide write session slot until dropped.
struct Registration;

impl Registration {
    fn acquire(db_path: &Path) -> SessionResult<Self> {
        let canonical_path = fs::canonicalize(db_path).map_err(DbError::from)?;
        let mut active = ACTIVE_WRITE_SESSION
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(holder) = active.as_ref() {
            warn!(
                "event=session_open module=store status=error error_code=write_session_active holder={}",
                holder.display()
            );
            return Err(SessionError::WriteSessionActive(holder.clone()));
        }
        *active = Some(canonical_path);
        Ok(Self)
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut active = ACTIVE_WRITE_SESSION
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *active = None;
    }
}

mod sealed {
    use rusqlite::Connection;

    /// Session types whose connection backs the catalog reads.
    pub trait SessionConnection {
        fn session_conn(&self) -> &Connection;
    }
}

impl sealed::SessionConnection for ReadSession {
    fn session_conn(&self) -> &Connection {
        &self.conn
    }
}

impl sealed::SessionConnection for WriteSession {
    fn session_conn(&self) -> &Connection {
        &self.conn
    }
}

impl<S: sealed::SessionConnection> CatalogReader for S {
    fn list_collections(&self) -> CatalogRepoResult<CollectionSnapshot> {
        catalog_repo::list_collections(self.session_conn())
    }

    fn list_unfiled_items(&self) -> CatalogRepoResult<Vec<ItemSummary>> {
        catalog_repo::list_items(self.session_conn(), false)
    }

    fn list_filed_items(&self) -> CatalogRepoResult<Vec<ItemSummary>> {
        catalog_repo::list_items(self.session_conn(), true)
    }

    fn get_item_detail(&self, item_key: &ItemKey) -> CatalogRepoResult<ItemDetail> {
        catalog_repo::get_item_detail(self.session_conn(), item_key)
    }

    fn get_item_collection_paths(&self, item_key: &ItemKey) -> CatalogRepoResult<Vec<String>> {
        catalog_repo::get_item_collection_paths(self.session_conn(), item_key)
    }
}

impl CatalogWriter for WriteSession {
    fn create_collection(
        &self,
        name: &str,
        parent_key: Option<&CollectionKey>,
    ) -> CatalogRepoResult<CollectionKey> {
        catalog_repo::create_collection(&self.conn, name, parent_key)
    }

    fn link_item(
        &self,
        item_key: &ItemKey,
        collection_key: &CollectionKey,
    ) -> CatalogRepoResult<LinkOutcome> {
        catalog_repo::link_item(&self.conn, item_key, collection_key)
    }

    fn unlink_item(
        &self,
        item_key: &ItemKey,
        collection_key: &CollectionKey,
    ) -> CatalogRepoResult<UnlinkOutcome> {
        catalog_repo::unlink_item(&self.conn, item_key, collection_key)
    }

    fn add_tags(&self, item_key: &ItemKey, tag_names: &[String]) -> CatalogRepoResult<TagOutcome> {
        catalog_repo::add_tags(&self.conn, item_key, tag_names)
    }

    fn with_savepoint<T, E, F>(&self, f: F) -> Result<T, E>
    where
        Self: Sized,
        E: From<CatalogRepoError>,
        F: FnOnce(&Self) -> Result<T, E>,
    {
        self.conn
            .execute_batch(&format!("SAVEPOINT {ENTRY_SAVEPOINT};"))
            .map_err(CatalogRepoError::from)?;

        match f(self) {
            Ok(value) => {
                self.conn
                    .execute_batch(&format!("RELEASE SAVEPOINT {ENTRY_SAVEPOINT};"))
                    .map_err(CatalogRepoError::from)?;
                Ok(value)
            }
            Err(err) => {
                let undo = format!(
                    "ROLLBACK TO SAVEPOINT {ENTRY_SAVEPOINT}; RELEASE SAVEPOINT {ENTRY_SAVEPOINT};"
                );
                self.conn
                    .execute_batch(&undo)
                    .map_err(CatalogRepoError::from)?;
                Err(err)
            }
        }
    }
}
