//! Connection bootstrap utilities for the catalog database.
//!
//! # Responsibility
//! - Open existing database files read-only or read-write (never create).
//! - Probe whether another process holds the database lock.
//!
//! # Invariants
//! - Read-write connections have `foreign_keys=ON` and a busy timeout.
//! - The lock probe never leaves a transaction or lock behind.

use super::DbResult;
use log::{error, info, warn};
use rusqlite::{Connection, ErrorCode, OpenFlags};
use std::path::Path;
use std::time::{Duration, Instant};

/// Result of an exclusive-lock probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockProbe {
    /// Exclusive lock was acquired and released immediately.
    Free,
    /// Another connection holds the database.
    Held,
}

/// Opens an existing database file in read-only mode.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_read_only(path: &Path, busy_timeout: Duration) -> DbResult<Connection> {
    open_with_mode(
        path,
        busy_timeout,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        "read_only",
    )
}

/// Opens an existing database file in read-write mode.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_read_write(path: &Path, busy_timeout: Duration) -> DbResult<Connection> {
    let conn = open_with_mode(
        path,
        busy_timeout,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        "read_write",
    )?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(conn)
}

/// Attempts to take and release an exclusive lock within `timeout`.
///
/// A busy or locked answer means the owning application is live. Any other
/// failure is returned as an error.
pub fn probe_exclusive_lock(path: &Path, timeout: Duration) -> DbResult<LockProbe> {
    let started_at = Instant::now();
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    conn.busy_timeout(timeout)?;

    match conn.execute_batch("BEGIN EXCLUSIVE;") {
        Ok(()) => {
            conn.execute_batch("ROLLBACK;")?;
            info!(
                "event=lock_probe module=db status=ok result=free duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(LockProbe::Free)
        }
        Err(rusqlite::Error::SqliteFailure(failure, _))
            if matches!(
                failure.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ) =>
        {
            warn!(
                "event=lock_probe module=db status=ok result=held duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(LockProbe::Held)
        }
        Err(err) => {
            error!(
                "event=lock_probe module=db status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err.into())
        }
    }
}

fn open_with_mode(
    path: &Path,
    busy_timeout: Duration,
    flags: OpenFlags,
    mode: &'static str,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let conn = match Connection::open_with_flags(path, flags) {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    if let Err(err) = conn.busy_timeout(busy_timeout) {
        error!(
            "event=db_open module=db status=error mode={} duration_ms={} error_code=db_configure_failed error={}",
            mode,
            started_at.elapsed().as_millis(),
            err
        );
        return Err(err.into());
    }

    info!(
        "event=db_open module=db status=ok mode={} duration_ms={}",
        mode,
        started_at.elapsed().as_millis()
    );
    Ok(conn)
}
