//! SQLite access to the shared catalog database.
//!
//! # Responsibility
//! - Open read-only and read-write connections with the pragmas core needs.
//! - Detect a live owning application through an exclusive-lock probe.
//! - Copy the database file to a timestamped backup before writes.
//! - Scope sessions so that uncommitted work is always rolled back.
//!
//! # Invariants
//! - No write session exists without a backup taken before its first
//!   statement.
//! - The schema is owned by the desktop application; core never migrates it.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod backup;
mod open;
pub mod session;

pub use backup::{backup_file_name, create_backup, BACKUP_DIR_NAME};
pub use open::{open_read_only, open_read_write, probe_exclusive_lock, LockProbe};
pub use session::{
    with_read_session, with_write_session, ReadSession, SessionError, SessionResult, WriteSession,
};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    Io(std::io::Error),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Io(err) => Some(err),
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<std::io::Error> for DbError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}
