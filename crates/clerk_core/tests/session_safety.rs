mod common;

use clerk_core::{
    with_write_session, CatalogRepoError, CatalogWriter, ReadSession, SessionError, WriteSession,
};
use common::{key, Catalog};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

#[test]
fn busy_database_is_rejected_before_backup() {
    let catalog = Catalog::new();
    let owner = catalog.conn();
    owner.execute_batch("BEGIN EXCLUSIVE;").unwrap();

    let config = catalog
        .config()
        .with_lock_probe_timeout(Duration::from_millis(20));
    let result = WriteSession::open(&config);

    assert!(matches!(result, Err(SessionError::ResourceBusy(_))));
    assert_eq!(catalog.backup_count(), 0);

    owner.execute_batch("ROLLBACK;").unwrap();
    let session = WriteSession::open(&config).unwrap();
    session.rollback().unwrap();
}

#[test]
fn write_session_takes_backup_before_first_statement() {
    let catalog = Catalog::new();
    catalog.add_item("ITEM0001", Some("Paper"), "2024-01-01 00:00:00");
    let before = std::fs::read(catalog.db_path()).unwrap();

    let session = WriteSession::open(&catalog.config()).unwrap();
    let backup = session.backup_path().to_path_buf();
    session.create_collection("Created", None).unwrap();
    session.commit().unwrap();

    assert!(backup.starts_with(catalog.backup_dir()));
    assert_eq!(std::fs::read(&backup).unwrap(), before);
    assert_eq!(catalog.count("SELECT COUNT(*) FROM collections;"), 1);
}

#[test]
fn drop_without_commit_rolls_back_and_keeps_backup() {
    let catalog = Catalog::new();
    {
        let session = WriteSession::open(&catalog.config()).unwrap();
        session.create_collection("Temporary", None).unwrap();
    }

    assert_eq!(catalog.count("SELECT COUNT(*) FROM collections;"), 0);
    assert_eq!(catalog.backup_count(), 1);
}

#[test]
fn panic_inside_session_rolls_back() {
    let catalog = Catalog::new();
    let config = catalog.config();

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let session = WriteSession::open(&config).unwrap();
        session.create_collection("Doomed", None).unwrap();
        panic!("simulated failure");
    }));

    assert!(outcome.is_err());
    assert_eq!(catalog.count("SELECT COUNT(*) FROM collections;"), 0);
    WriteSession::open(&config).unwrap().rollback().unwrap();
}

#[test]
fn second_write_session_in_process_is_rejected() {
    let catalog = Catalog::new();
    let first = WriteSession::open(&catalog.config()).unwrap();

    let second = WriteSession::open(&catalog.config());
    assert!(matches!(second, Err(SessionError::WriteSessionActive(_))));
    assert_eq!(catalog.backup_count(), 1);

    first.commit().unwrap();
    WriteSession::open(&catalog.config())
        .unwrap()
        .commit()
        .unwrap();
}

#[test]
fn write_session_on_another_file_is_rejected_while_one_is_open() {
    let first_catalog = Catalog::new();
    let second_catalog = first_catalog.sibling();
    let first = WriteSession::open(&first_catalog.config()).unwrap();

    match WriteSession::open(&second_catalog.config()) {
        Err(SessionError::WriteSessionActive(holder)) => {
            assert_eq!(holder, std::fs::canonicalize(first_catalog.db_path()).unwrap());
        }
        Err(other) => panic!("unexpected error: {other:?}"),
        Ok(_) => panic!("second write session opened"),
    }
    assert_eq!(second_catalog.backup_count(), 0);

    first.rollback().unwrap();
    WriteSession::open(&second_catalog.config())
        .unwrap()
        .commit()
        .unwrap();
    assert_eq!(second_catalog.backup_count(), 1);
}

#[test]
fn with_write_session_commits_on_ok_and_rolls_back_on_err() {
    let catalog = Catalog::new();
    let config = catalog.config();

    with_write_session(&config, |session| -> Result<(), SessionError> {
        session.create_collection("Kept", None)?;
        Ok(())
    })
    .unwrap();

    let result = with_write_session(&config, |session| -> Result<(), SessionError> {
        session.create_collection("Discarded", None)?;
        Err(CatalogRepoError::ItemNotFound(key("MISSING1")).into())
    });

    assert!(result.is_err());
    assert_eq!(catalog.count("SELECT COUNT(*) FROM collections;"), 1);
    assert_eq!(
        catalog.count("SELECT COUNT(*) FROM collections WHERE collectionName = 'Kept';"),
        1
    );
    assert_eq!(catalog.backup_count(), 2);
}

#[test]
fn read_session_takes_no_backup_and_skips_lock_probe() {
    let catalog = Catalog::new();
    let session = ReadSession::open(&catalog.config()).unwrap();
    assert_eq!(session.db_path(), catalog.db_path());
    session.close();
    assert_eq!(catalog.backup_count(), 0);
}

#[test]
fn missing_database_is_reported() {
    let catalog = Catalog::new();
    let config = clerk_core::ClerkConfig::new(catalog.db_path().with_file_name("absent.sqlite"));

    assert!(matches!(
        WriteSession::open(&config),
        Err(SessionError::DatabaseNotFound(_))
    ));
    assert!(matches!(
        ReadSession::open(&config),
        Err(SessionError::DatabaseNotFound(_))
    ));
    assert_eq!(catalog.backup_count(), 0);
}

#[test]
fn database_without_catalog_tables_is_rejected() {
    let catalog = Catalog::new();
    catalog
        .conn()
        .execute_batch("DROP TABLE collectionItems;")
        .unwrap();

    let result = ReadSession::open(&catalog.config());
    assert!(matches!(
        result,
        Err(SessionError::Catalog(CatalogRepoError::MissingRequiredTable(
            "collectionItems"
        )))
    ));
}
