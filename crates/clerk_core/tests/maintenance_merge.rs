mod common;

use clerk_core::{
    find_duplicate_paths, merge_duplicate_collections, with_write_session, CatalogReader,
    ReadSession, SessionError, WriteSession,
};
use common::{key, Catalog};

fn duplicated_catalog() -> Catalog {
    let catalog = Catalog::new();
    catalog.add_collection(1, "PHYSKEEP", "Physics", None);
    catalog.add_collection(2, "PHYSDUP1", "Physics", None);
    catalog.add_collection(3, "QUANTUM1", "Quantum", Some(1));
    catalog.add_collection(4, "QUANTUM2", "Quantum", Some(2));
    catalog.add_collection(5, "OPTICS01", "Optics", Some(2));

    let shared = catalog.add_item("SHARED01", Some("Shared"), "2024-01-01 00:00:00");
    let only_dup = catalog.add_item("ONLYDUP1", Some("Only dup"), "2024-01-02 00:00:00");
    let quantum = catalog.add_item("QITEM001", Some("Qubits"), "2024-01-03 00:00:00");
    catalog.link(1, shared, 0);
    catalog.link(2, shared, 0);
    catalog.link(2, only_dup, 1);
    catalog.link(4, quantum, 0);
    catalog
}

#[test]
fn duplicate_groups_are_reported_shallowest_first() {
    let catalog = duplicated_catalog();
    catalog.add_collection(6, "DEEPDUP1", "Deep", Some(3));
    catalog.add_collection(7, "DEEPDUP2", "Deep", Some(3));

    let session = ReadSession::open(&catalog.config()).unwrap();
    let groups = find_duplicate_paths(&session.list_collections().unwrap());

    let paths: Vec<_> = groups.iter().map(|group| group.path.as_str()).collect();
    assert_eq!(paths, vec!["Physics", "Physics/Quantum", "Physics/Quantum/Deep"]);
    assert_eq!(groups[0].keeper, key("PHYSKEEP"));
    assert_eq!(groups[0].duplicates, vec![key("PHYSDUP1")]);
    assert_eq!(groups[1].keeper, key("QUANTUM1"));
    assert_eq!(groups[2].depth(), 3);
}

#[test]
fn merge_folds_duplicates_into_oldest_node() {
    let catalog = duplicated_catalog();
    let config = catalog.config();

    let report = with_write_session(&config, |session| -> Result<_, SessionError> {
        Ok(merge_duplicate_collections(session)?)
    })
    .unwrap();

    assert_eq!(report.groups_merged, 2);
    assert_eq!(report.retired, vec![key("PHYSDUP1"), key("QUANTUM2")]);
    assert_eq!(report.items_moved, 2);

    assert_eq!(
        catalog.items_in(&key("PHYSKEEP")),
        vec!["SHARED01".to_string(), "ONLYDUP1".to_string()]
    );
    assert_eq!(catalog.items_in(&key("QUANTUM1")), vec!["QITEM001".to_string()]);
    assert!(catalog.items_in(&key("PHYSDUP1")).is_empty());
    assert_eq!(catalog.count("SELECT COUNT(*) FROM deletedCollections;"), 2);
    assert_eq!(catalog.count("SELECT COUNT(*) FROM collections;"), 5);
    assert_eq!(
        catalog.count("SELECT parentCollectionID FROM collections WHERE key = 'OPTICS01';"),
        1
    );

    let session = ReadSession::open(&config).unwrap();
    let snapshot = session.list_collections().unwrap();
    assert_eq!(snapshot.len(), 3);
    assert!(find_duplicate_paths(&snapshot).is_empty());
    assert_eq!(
        snapshot.key_for_path("Physics/Optics"),
        Some(&key("OPTICS01"))
    );
}

#[test]
fn merge_without_duplicates_changes_nothing() {
    let catalog = Catalog::new();
    catalog.add_collection(1, "SOLO0001", "Solo", None);

    let session = WriteSession::open(&catalog.config()).unwrap();
    let report = merge_duplicate_collections(&session).unwrap();
    session.commit().unwrap();

    assert_eq!(report.groups_merged, 0);
    assert!(report.retired.is_empty());
    assert_eq!(catalog.count("SELECT COUNT(*) FROM deletedCollections;"), 0);
}
