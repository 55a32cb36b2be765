//! Integration tests for cross-member dataset aggregation

use crate::integration::create_members;
use tempfile::TempDir;
use treants::config::AggregateConfig;
use treants::dataset::{Cell, Compare, Payload, ReadOptions, RowFilter, Table};
use treants::{
    Aggregated, CollectionError, DuplicateNamePolicy, IndexBy, IndexKey, KeyMode, Member,
    MemberCollection, MemberKind,
};

fn frame(columns: &[&str], rows: usize) -> Table {
    let rows = (0..rows)
        .map(|r| {
            columns
                .iter()
                .enumerate()
                .map(|(c, _)| Cell::Int((r * 10 + c) as i64))
                .collect()
        })
        .collect();
    Table::frame_from_rows(columns.iter().map(|c| c.to_string()).collect(), rows).unwrap()
}

fn collection_of(members: &[Member]) -> MemberCollection {
    let collection = MemberCollection::new();
    collection
        .add(members.iter().map(|m| m.location().to_path_buf()))
        .unwrap();
    collection
}

#[test]
fn test_dataset_on_one_member_only() {
    let temp_dir = TempDir::new().unwrap();
    let members = create_members(temp_dir.path(), &["a", "b"], MemberKind::Sim);
    members[0]
        .data()
        .write("x", &Payload::Table(frame(&["p", "q"], 3)))
        .unwrap();
    let collection = collection_of(&members);
    let data = collection.data().unwrap();

    assert_eq!(data.keys(KeyMode::Any).unwrap().into_iter().collect::<Vec<_>>(), vec!["x"]);
    assert!(data.keys(KeyMode::All).unwrap().is_empty());

    let merged = data.retrieve("x", IndexBy::Uuid, &ReadOptions::new()).unwrap();
    let table = merged.as_table().unwrap();
    assert_eq!(table.len(), 3);
    assert_eq!(table.members(), vec![&IndexKey::Uuid(members[0].uuid())]);
    assert_eq!(table.index()[1].1, Cell::Int(1));
}

#[test]
fn test_table_and_blob_fall_back_to_per_member() {
    let temp_dir = TempDir::new().unwrap();
    let members = create_members(temp_dir.path(), &["a", "b"], MemberKind::Sim);
    let table = frame(&["p"], 2);
    members[0].data().write("y", &Payload::Table(table.clone())).unwrap();
    members[1]
        .data()
        .write("y", &Payload::Opaque(b"raw bytes".to_vec()))
        .unwrap();
    let collection = collection_of(&members);

    let merged = collection
        .data()
        .unwrap()
        .retrieve("y", IndexBy::Uuid, &ReadOptions::new())
        .unwrap();

    let Aggregated::PerMember(entries) = &merged else {
        panic!("expected unmerged result, got {:?}", merged);
    };
    assert_eq!(entries.len(), 2);
    assert_eq!(
        merged.get(&IndexKey::Uuid(members[0].uuid())),
        Some(&Payload::Table(table))
    );
    assert_eq!(
        merged.get(&IndexKey::Uuid(members[1].uuid())),
        Some(&Payload::Opaque(b"raw bytes".to_vec()))
    );
}

#[test]
fn test_missing_dataset_is_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let members = create_members(temp_dir.path(), &["a", "b"], MemberKind::Sim);
    members[0].data().write("x", &Payload::Table(frame(&["p"], 1))).unwrap();
    let collection = collection_of(&members);

    assert!(matches!(
        collection
            .data()
            .unwrap()
            .retrieve("nope", IndexBy::Uuid, &ReadOptions::new()),
        Err(CollectionError::DatasetNotFound(handle)) if handle == "nope"
    ));
}

#[test]
fn test_keys_all_subset_of_any() {
    let temp_dir = TempDir::new().unwrap();
    let members = create_members(temp_dir.path(), &["a", "b", "c"], MemberKind::Sim);
    for (i, member) in members.iter().enumerate() {
        member.data().write("shared", &Payload::Table(frame(&["v"], 1))).unwrap();
        member
            .data()
            .write(&format!("own/{}", i), &Payload::Opaque(vec![i as u8]))
            .unwrap();
    }
    let data = collection_of(&members).data().unwrap();

    let any = data.keys(KeyMode::Any).unwrap();
    let all = data.keys(KeyMode::All).unwrap();
    assert!(all.is_subset(&any));
    assert_eq!(all.into_iter().collect::<Vec<_>>(), vec!["shared"]);
    assert_eq!(any.len(), 4);
    assert!(any.contains("own/2"));
}

#[test]
fn test_retrieve_many_matches_individual_retrieves() {
    let temp_dir = TempDir::new().unwrap();
    let members = create_members(temp_dir.path(), &["a", "b"], MemberKind::Sim);
    for member in &members {
        member.data().write("h1", &Payload::Table(frame(&["p"], 2))).unwrap();
    }
    members[1]
        .data()
        .write("h2", &Payload::Opaque(vec![7, 7]))
        .unwrap();
    let data = collection_of(&members).data().unwrap();
    let options = ReadOptions::new();

    let many = data.retrieve_many(&["h1", "h2"], IndexBy::Uuid, &options).unwrap();
    assert_eq!(many.len(), 2);
    assert_eq!(many[0], data.retrieve("h1", IndexBy::Uuid, &options).unwrap());
    assert_eq!(many[1], data.retrieve("h2", IndexBy::Uuid, &options).unwrap());
}

#[test]
fn test_read_options_reach_every_member() {
    let temp_dir = TempDir::new().unwrap();
    let members = create_members(temp_dir.path(), &["a", "b"], MemberKind::Sim);
    for member in &members {
        member
            .data()
            .write("x", &Payload::Table(frame(&["p", "q", "r"], 5)))
            .unwrap();
    }
    let data = collection_of(&members).data().unwrap();

    let options = ReadOptions::new().start(1).stop(3).columns(["q"]);
    let merged = data.retrieve("x", IndexBy::Uuid, &options).unwrap();
    let table = merged.as_table().unwrap();
    assert_eq!(table.len(), 4);
    assert_eq!(table.columns(), &["q".to_string()]);
    assert_eq!(table.rows()[0], vec![Cell::Int(11)]);
}

#[test]
fn test_series_merge_under_member_level() {
    let temp_dir = TempDir::new().unwrap();
    let members = create_members(temp_dir.path(), &["a", "b"], MemberKind::Sim);
    for (i, member) in members.iter().enumerate() {
        let series = Table::series(
            "energy",
            vec![Cell::Int(0), Cell::Int(1)],
            vec![Cell::Float(i as f64), Cell::Float(i as f64 + 0.5)],
        )
        .unwrap();
        member.data().write("energy", &series.into()).unwrap();
    }
    let merged = collection_of(&members)
        .data()
        .unwrap()
        .retrieve("energy", IndexBy::Name, &ReadOptions::new())
        .unwrap();

    let table = merged.as_table().unwrap();
    assert_eq!(table.len(), 4);
    assert_eq!(
        table.members(),
        vec![&IndexKey::Name("a".to_string()), &IndexKey::Name("b".to_string())]
    );
    let b_key = IndexKey::Name("b".to_string());
    let b_rows: Vec<_> = table.rows_for(&b_key).collect();
    assert_eq!(b_rows[1].1, &[Cell::Float(1.5)][..]);
}

#[test]
fn test_duplicate_names_fail_by_default() {
    let temp_dir = TempDir::new().unwrap();
    let a = Member::create(temp_dir.path().join("1"), "same", MemberKind::Sim).unwrap();
    let b = Member::create(temp_dir.path().join("2"), "same", MemberKind::Sim).unwrap();
    for member in [&a, &b] {
        member.data().write("x", &Payload::Table(frame(&["p"], 1))).unwrap();
    }
    let data = collection_of(&[a, b]).data().unwrap();

    match data.retrieve("x", IndexBy::Name, &ReadOptions::new()) {
        Err(CollectionError::AmbiguousIndex(names)) => assert_eq!(names, vec!["same"]),
        other => panic!("expected AmbiguousIndex, got {:?}", other),
    }
    assert!(data.retrieve("x", IndexBy::Uuid, &ReadOptions::new()).is_ok());
}

#[test]
fn test_duplicate_names_warn_keeps_all_rows() {
    let temp_dir = TempDir::new().unwrap();
    let a = Member::create(temp_dir.path().join("1"), "same", MemberKind::Sim).unwrap();
    let b = Member::create(temp_dir.path().join("2"), "same", MemberKind::Sim).unwrap();
    for member in [&a, &b] {
        member.data().write("x", &Payload::Table(frame(&["p"], 2))).unwrap();
    }
    let collection = collection_of(&[a, b]).with_aggregate_config(AggregateConfig {
        index_by: IndexBy::Name,
        duplicate_names: DuplicateNamePolicy::Warn,
    });

    let data = collection.data().unwrap();
    let merged = data.retrieve("x", IndexBy::Name, &ReadOptions::new()).unwrap();
    assert_eq!(merged.as_table().unwrap().len(), 4);
    // The configured index is the default one.
    assert_eq!(data.get("x").unwrap(), merged);
}

#[test]
fn test_invalid_index_by_rejected() {
    assert!(matches!(
        "path".parse::<IndexBy>(),
        Err(CollectionError::InvalidArgument(_))
    ));
}

#[test]
fn test_dataset_added_after_member_loaded_is_visible() {
    let temp_dir = TempDir::new().unwrap();
    let members = create_members(temp_dir.path(), &["a"], MemberKind::Sim);
    let collection = collection_of(&members);
    let loaded = collection.get(0).unwrap();
    assert!(collection.data().unwrap().keys(KeyMode::Any).unwrap().is_empty());

    // Written through an independent handle on the same directory.
    members[0].data().write("late", &Payload::Opaque(vec![1])).unwrap();

    assert!(loaded.data().contains("late").unwrap());
    assert!(collection
        .data()
        .unwrap()
        .keys(KeyMode::Any)
        .unwrap()
        .contains("late"));
}

#[test]
fn test_get_uses_configured_index() {
    let temp_dir = TempDir::new().unwrap();
    let members = create_members(temp_dir.path(), &["a", "b"], MemberKind::Sim);
    for member in &members {
        member.data().write("x", &Payload::Table(frame(&["p"], 1))).unwrap();
        member.data().write("y", &Payload::Opaque(vec![1])).unwrap();
    }

    let by_uuid = collection_of(&members).data().unwrap().get("x").unwrap();
    assert_eq!(
        by_uuid.as_table().unwrap().members(),
        vec![
            &IndexKey::Uuid(members[0].uuid()),
            &IndexKey::Uuid(members[1].uuid())
        ]
    );

    let data = collection_of(&members)
        .with_aggregate_config(AggregateConfig {
            index_by: IndexBy::Name,
            ..AggregateConfig::default()
        })
        .data()
        .unwrap();
    let many = data.get_many(&["x", "y"]).unwrap();
    assert_eq!(
        many[0].as_table().unwrap().members(),
        vec![&IndexKey::Name("a".to_string()), &IndexKey::Name("b".to_string())]
    );
    assert_eq!(
        many[1].get(&IndexKey::Name("b".to_string())),
        Some(&Payload::Opaque(vec![1]))
    );
}

#[test]
fn test_row_filter_reaches_every_member() {
    let temp_dir = TempDir::new().unwrap();
    let members = create_members(temp_dir.path(), &["a", "b"], MemberKind::Sim);
    for member in &members {
        member
            .data()
            .write("x", &Payload::Table(frame(&["p", "q"], 4)))
            .unwrap();
    }
    let data = collection_of(&members).data().unwrap();

    let options = ReadOptions::new().filter(RowFilter::new("p", Compare::Ge, 20i64));
    let merged = data.retrieve("x", IndexBy::Uuid, &options).unwrap();
    let table = merged.as_table().unwrap();
    assert_eq!(table.len(), 4);
    assert!(table.rows().iter().all(|row| row[0] == Cell::Int(20) || row[0] == Cell::Int(30)));
}

#[test]
fn test_remove_rows_through_a_member() {
    let temp_dir = TempDir::new().unwrap();
    let members = create_members(temp_dir.path(), &["a"], MemberKind::Sim);
    let store = members[0].data();
    store.write("x", &Payload::Table(frame(&["p"], 4))).unwrap();

    store
        .remove_rows("x", &ReadOptions::new().filter(RowFilter::new("p", Compare::Lt, 20i64)))
        .unwrap();
    let payload = store.read("x", &ReadOptions::new()).unwrap().unwrap();
    assert_eq!(payload.as_table().unwrap().len(), 2);

    store.remove_rows("x", &ReadOptions::new()).unwrap();
    assert!(!store.contains("x").unwrap());
}
