//! Integration tests for collections over the sled-backed membership table

use crate::integration::create_members;
use std::sync::Arc;
use tempfile::TempDir;
use treants::membership::{MembershipTable, SledMembershipTable};
use treants::resolver::FsResolver;
use treants::{MemberCollection, MemberId, MemberKind};

fn open_collection(db: &std::path::Path) -> MemberCollection {
    MemberCollection::with_parts(
        Box::new(SledMembershipTable::new(db).unwrap()),
        Arc::new(FsResolver::new()),
    )
}

#[test]
fn test_membership_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db = temp_dir.path().join("members.db");
    let members = create_members(temp_dir.path(), &["a", "b", "c"], MemberKind::Sim);

    {
        let collection = open_collection(&db);
        collection
            .add(members.iter().map(|m| m.location().to_path_buf()))
            .unwrap();
        collection.remove(&[1]).unwrap();
    }

    let collection = open_collection(&db);
    assert_eq!(
        collection.uuids().unwrap(),
        vec![members[0].uuid(), members[2].uuid()]
    );
    assert_eq!(
        collection.names().unwrap(),
        vec![Some("a".to_string()), Some("c".to_string())]
    );
}

#[test]
fn test_update_keeps_position_across_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db = temp_dir.path().join("members.db");
    let members = create_members(temp_dir.path(), &["a", "b"], MemberKind::Sim);

    {
        let collection = open_collection(&db);
        collection
            .add(members.iter().map(|m| m.location().to_path_buf()))
            .unwrap();
    }

    let moved = temp_dir.path().join("moved-a");
    std::fs::rename(members[0].location(), &moved).unwrap();
    {
        let collection = open_collection(&db);
        collection.add([moved.as_path()]).unwrap();
        assert_eq!(collection.len().unwrap(), 2);
    }

    let table = SledMembershipTable::new(&db).unwrap();
    let records = table.records().unwrap();
    assert_eq!(records[0].uuid, members[0].uuid());
    assert!(records[0].location.ends_with("moved-a"));
}

#[test]
fn test_removing_unknown_uuid_is_noop() {
    let temp_dir = TempDir::new().unwrap();
    let members = create_members(temp_dir.path(), &["a"], MemberKind::Group);
    let table = SledMembershipTable::new(temp_dir.path().join("members.db")).unwrap();
    table.add(members[0].record()).unwrap();

    table.remove(&[MemberId::new()]).unwrap();
    assert_eq!(table.records().unwrap(), vec![members[0].record()]);
}

#[test]
fn test_concurrent_adds_of_one_member() {
    let temp_dir = TempDir::new().unwrap();
    let members = create_members(temp_dir.path(), &["a"], MemberKind::Sim);
    let collection = Arc::new(open_collection(&temp_dir.path().join("members.db")));

    std::thread::scope(|scope| {
        for _ in 0..8 {
            let collection = Arc::clone(&collection);
            let location = members[0].location().to_path_buf();
            scope.spawn(move || {
                assert_eq!(collection.add([location]).unwrap(), 1);
            });
        }
    });

    assert_eq!(collection.uuids().unwrap(), vec![members[0].uuid()]);
    collection.remove(&[0]).unwrap();
    assert!(collection.is_empty().unwrap());
}
