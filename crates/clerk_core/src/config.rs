//! Explicit configuration passed into every session.
//!
//! # Responsibility
//! - Locate the catalog database the way the desktop application lays it out.
//! - Carry timeouts, backup location and batch limits as one plain value.
//!
//! # Invariants
//! - Core never reads ambient state after a `ClerkConfig` is built.

use crate::db::BACKUP_DIR_NAME;
use crate::validate::{SchemaLimits, MAX_COLLECTION_DEPTH, MAX_TAGS_PER_ITEM};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming a custom desktop data directory.
pub const DATA_DIR_ENV: &str = "ZOTERO_DATA_DIR";
/// Database file name inside a data directory.
pub const DATABASE_FILE_NAME: &str = "zotero.sqlite";

const DEFAULT_LOCK_PROBE_TIMEOUT: Duration = Duration::from_millis(100);
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub enum ConfigError {
    /// No candidate location holds a database file.
    DatabaseNotFound { checked: Vec<PathBuf> },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DatabaseNotFound { checked } => {
                write!(f, "catalog database not found; checked:")?;
                for path in checked {
                    write!(f, " `{}`", path.display())?;
                }
                write!(f, " (set {DATA_DIR_ENV} for a custom location)")
            }
        }
    }
}

impl Error for ConfigError {}

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClerkConfig {
    /// Catalog database file.
    pub db_path: PathBuf,
    /// Backup directory. `None` means `<db dir>/backups`.
    pub backup_dir: Option<PathBuf>,
    /// How long the lock probe waits before reporting the owner as live.
    pub lock_probe_timeout: Duration,
    /// Busy timeout for session connections.
    pub busy_timeout: Duration,
    /// Max segments for target collection paths.
    pub max_path_depth: usize,
    /// Max tags per categorization entry.
    pub max_tags_per_item: usize,
}

impl ClerkConfig {
    /// Creates default configuration for one database file.
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            backup_dir: None,
            lock_probe_timeout: DEFAULT_LOCK_PROBE_TIMEOUT,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            max_path_depth: MAX_COLLECTION_DEPTH,
            max_tags_per_item: MAX_TAGS_PER_ITEM,
        }
    }

    /// Builds configuration from the first existing default database location.
    pub fn discover() -> Result<Self, ConfigError> {
        find_database(
            std::env::var_os(DATA_DIR_ENV).map(PathBuf::from),
            std::env::var_os("HOME").map(PathBuf::from),
        )
        .map(Self::new)
    }

    pub fn with_backup_dir(mut self, backup_dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = Some(backup_dir.into());
        self
    }

    pub fn with_lock_probe_timeout(mut self, timeout: Duration) -> Self {
        self.lock_probe_timeout = timeout;
        self
    }

    /// Resolved backup directory.
    pub fn backup_dir(&self) -> PathBuf {
        match &self.backup_dir {
            Some(dir) => dir.clone(),
            None => self
                .db_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(BACKUP_DIR_NAME),
        }
    }

    /// Limits for batch schema validation.
    pub fn schema_limits(&self) -> SchemaLimits {
        SchemaLimits {
            max_depth: self.max_path_depth,
            max_tags: self.max_tags_per_item,
        }
    }
}

/// Lists database locations in lookup order.
pub fn database_candidates(data_dir: Option<PathBuf>, home: Option<PathBuf>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(data_dir) = data_dir {
        candidates.push(data_dir.join(DATABASE_FILE_NAME));
    }
    if let Some(home) = home {
        candidates.push(home.join("Zotero").join(DATABASE_FILE_NAME));
        candidates.push(home.join(".zotero").join("zotero").join(DATABASE_FILE_NAME));
        candidates.push(
            home.join("snap")
                .join("zotero-snap")
                .join("common")
                .join("Zotero")
                .join(DATABASE_FILE_NAME),
        );
    }
    candidates
}

/// Returns the first existing candidate database file.
pub fn find_database(
    data_dir: Option<PathBuf>,
    home: Option<PathBuf>,
) -> Result<PathBuf, ConfigError> {
    let checked = database_candidates(data_dir, home);
    checked
        .iter()
        .find(|path| path.is_file())
        .cloned()
        .ok_or(ConfigError::DatabaseNotFound { checked })
}

#[cfg(test)]
mod tests {
    use super::{database_candidates, find_database, ClerkConfig, ConfigError};
    use std::fs;
    use std::path::PathBuf;

    #[test]
    fn data_dir_env_is_checked_first() {
        let candidates =
            database_candidates(Some(PathBuf::from("/data")), Some(PathBuf::from("/home/u")));
        assert_eq!(candidates[0], PathBuf::from("/data/zotero.sqlite"));
        assert_eq!(candidates[1], PathBuf::from("/home/u/Zotero/zotero.sqlite"));
        assert_eq!(candidates.len(), 4);
    }

    #[test]
    fn find_database_reports_every_checked_location() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_database(Some(dir.path().to_path_buf()), None).unwrap_err();
        let ConfigError::DatabaseNotFound { checked } = err;
        assert_eq!(checked, vec![dir.path().join("zotero.sqlite")]);
    }

    #[test]
    fn find_database_returns_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join("home");
        fs::create_dir_all(home.join("Zotero")).unwrap();
        fs::write(home.join("Zotero").join("zotero.sqlite"), b"").unwrap();

        let found = find_database(None, Some(home.clone())).unwrap();
        assert_eq!(found, home.join("Zotero").join("zotero.sqlite"));
    }

    #[test]
    fn backup_dir_defaults_next_to_database() {
        let config = ClerkConfig::new("/data/zotero.sqlite");
        assert_eq!(config.backup_dir(), PathBuf::from("/data/backups"));

        let custom = config.with_backup_dir("/elsewhere");
        assert_eq!(custom.backup_dir(), PathBuf::from("/elsewhere"));
    }
}
