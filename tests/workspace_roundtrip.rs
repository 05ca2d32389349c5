//! Facade-level roundtrip: build a schema, fail a commit, verify recovery

use canopy::{
    AccessorRegistry, CanopyError, DataType, NodeKind, ObjectId, ObjectTree, Project,
    SessionPersister, Value,
};
use parking_lot::Mutex;
use std::sync::Arc;

#[test]
fn test_build_schema_then_survive_a_failed_batch() {
    let tree = Arc::new(Mutex::new(Project::new()));
    let persister = SessionPersister::new(
        "roundtrip",
        Arc::clone(&tree),
        AccessorRegistry::standard(),
    );

    let ws = ObjectId::new();
    let db = ObjectId::new();
    let table = ObjectId::new();
    let id_col = ObjectId::new();
    let pk = ObjectId::new();

    persister.begin().unwrap();
    persister
        .persist_object(None, NodeKind::Workspace, ws, 0)
        .unwrap();
    persister
        .persist_object(Some(ws), NodeKind::Database, db, 0)
        .unwrap();
    persister
        .persist_object(Some(db), NodeKind::Table, table, 0)
        .unwrap();
    persister
        .persist_object(Some(table), NodeKind::Column, id_col, 0)
        .unwrap();
    persister
        .persist_object(Some(table), NodeKind::Index, pk, 0)
        .unwrap();
    persister
        .persist_property_unconditional(table, "name", DataType::String, Value::from("orders"))
        .unwrap();
    persister
        .persist_property_unconditional(pk, "unique", DataType::Bool, Value::Bool(true))
        .unwrap();
    persister
        .persist_property_unconditional(pk, "column", DataType::Reference, Value::Reference(id_col))
        .unwrap();
    persister.commit().unwrap();

    {
        let guard = tree.lock();
        assert_eq!(guard.placement(id_col).unwrap().parent, Some(table));
        assert_eq!(
            guard.find_by_uuid(table).unwrap().property("name"),
            Some(&Value::from("orders"))
        );
    }

    // Removing the referenced column must fail the commit and leave the
    // schema untouched.
    persister.begin().unwrap();
    persister.remove_object(table, id_col).unwrap();
    let err = persister.commit().unwrap_err();
    assert!(matches!(err, CanopyError::CommitFailure { .. }));
    let guard = tree.lock();
    assert_eq!(guard.placement(id_col).unwrap().parent, Some(table));
    assert_eq!(guard.placement(pk).unwrap().parent, Some(table));
}
