//! Pre-write database backups.
//!
//! # Invariants
//! - A backup is a full byte copy of the database file (plus its `-wal`
//!   sidecar when one exists).
//! - Existing backups are never overwritten or pruned.

use super::DbResult;
use chrono::{DateTime, Local};
use log::{error, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Directory created next to the database file to hold backups.
pub const BACKUP_DIR_NAME: &str = "backups";

const BACKUP_PREFIX: &str = "zotero_backup";
const BACKUP_EXTENSION: &str = "sqlite";

/// Returns the backup file name for one timestamp and collision counter.
pub fn backup_file_name(timestamp: &DateTime<Local>, attempt: u32) -> String {
    let stamp = timestamp.format("%Y%m%d_%H%M%S_%6f");
    if attempt == 0 {
        format!("{BACKUP_PREFIX}_{stamp}.{BACKUP_EXTENSION}")
    } else {
        format!("{BACKUP_PREFIX}_{stamp}-{attempt}.{BACKUP_EXTENSION}")
    }
}

/// Copies `db_path` into `backup_dir` and returns the backup path.
///
/// # Side effects
/// - Creates `backup_dir` when missing.
/// - Emits `db_backup` logging events with duration and size.
pub fn create_backup(db_path: &Path, backup_dir: &Path) -> DbResult<PathBuf> {
    let started_at = Instant::now();
    info!("event=db_backup module=db status=start");

    match copy_to_backup(db_path, backup_dir) {
        Ok((backup_path, bytes)) => {
            info!(
                "event=db_backup module=db status=ok duration_ms={} bytes={} backup={}",
                started_at.elapsed().as_millis(),
                bytes,
                backup_path.display()
            );
            Ok(backup_path)
        }
        Err(err) => {
            error!(
                "event=db_backup module=db status=error duration_ms={} error_code=db_backup_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err.into())
        }
    }
}

fn copy_to_backup(db_path: &Path, backup_dir: &Path) -> std::io::Result<(PathBuf, u64)> {
    fs::create_dir_all(backup_dir)?;

    let timestamp = Local::now();
    let mut attempt = 0;
    let backup_path = loop {
        let candidate = backup_dir.join(backup_file_name(&timestamp, attempt));
        if !candidate.exists() {
            break candidate;
        }
        attempt += 1;
    };

    let bytes = fs::copy(db_path, &backup_path)?;

    let wal_path = sidecar(db_path, "-wal");
    if wal_path.exists() {
        fs::copy(&wal_path, sidecar(&backup_path, "-wal"))?;
    }

    Ok((backup_path, bytes))
}

fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut value = path.as_os_str().to_owned();
    value.push(suffix);
    PathBuf::from(value)
}

#[cfg(test)]
mod tests {
    use super::{backup_file_name, create_backup};
    use chrono::{Local, TimeZone};
    use std::fs;

    #[test]
    fn file_name_carries_timestamp_and_collision_counter() {
        let timestamp = Local.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(
            backup_file_name(&timestamp, 0),
            "zotero_backup_20260304_050607_000000.sqlite"
        );
        assert_eq!(
            backup_file_name(&timestamp, 2),
            "zotero_backup_20260304_050607_000000-2.sqlite"
        );
    }

    #[test]
    fn backups_are_full_copies_and_never_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("zotero.sqlite");
        fs::write(&db_path, b"catalog bytes").unwrap();
        let backup_dir = dir.path().join("backups");

        let first = create_backup(&db_path, &backup_dir).unwrap();
        let second = create_backup(&db_path, &backup_dir).unwrap();

        assert_ne!(first, second);
        assert_eq!(fs::read(&first).unwrap(), b"catalog bytes");
        assert_eq!(fs::read(&second).unwrap(), b"catalog bytes");
        assert_eq!(fs::read_dir(&backup_dir).unwrap().count(), 2);
    }
}
