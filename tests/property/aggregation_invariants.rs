//! Property-based tests for key reconciliation and merging

use proptest::prelude::*;
use tempfile::TempDir;
use treants::dataset::{Cell, Payload, ReadOptions, Table};
use treants::{IndexBy, KeyMode, Member, MemberCollection, MemberKind};

const HANDLES: [&str; 4] = ["a", "b", "c/d", "c/e"];

/// keys(all) is contained in keys(any) for any dataset layout
#[test]
fn test_all_keys_subset_of_any_keys() {
    let mut runner =
        proptest::test_runner::TestRunner::new(ProptestConfig::with_cases(32));

    runner
        .run(
            &prop::collection::vec(prop::collection::vec(any::<bool>(), 4), 0..4),
            |layout| {
                let temp_dir = TempDir::new().unwrap();
                let collection = MemberCollection::new();
                for (i, present) in layout.iter().enumerate() {
                    let member =
                        Member::create(temp_dir.path().join(i.to_string()), "m", MemberKind::Sim)
                            .unwrap();
                    for (handle, _) in HANDLES.iter().zip(present).filter(|(_, p)| **p) {
                        member.data().write(handle, &Payload::Opaque(vec![1])).unwrap();
                    }
                    collection.add([member]).unwrap();
                }

                let data = collection.data().unwrap();
                let any = data.keys(KeyMode::Any).unwrap();
                let all = data.keys(KeyMode::All).unwrap();
                prop_assert!(all.is_subset(&any));
                for (h, handle) in HANDLES.iter().enumerate() {
                    let everywhere = !layout.is_empty() && layout.iter().all(|p| p[h]);
                    let somewhere = layout.iter().any(|p| p[h]);
                    prop_assert_eq!(all.contains(*handle), everywhere);
                    prop_assert_eq!(any.contains(*handle), somewhere);
                }
                Ok(())
            },
        )
        .unwrap();
}

/// Merged row count is the sum of every contributing member's rows
#[test]
fn test_merged_rows_sum_member_rows() {
    let mut runner =
        proptest::test_runner::TestRunner::new(ProptestConfig::with_cases(32));

    runner
        .run(&prop::collection::vec(prop::option::of(0..6usize), 1..5), |sizes| {
            prop_assume!(sizes.iter().any(Option::is_some));
            let temp_dir = TempDir::new().unwrap();
            let collection = MemberCollection::new();
            for (i, size) in sizes.iter().enumerate() {
                let member =
                    Member::create(temp_dir.path().join(i.to_string()), "m", MemberKind::Sim)
                        .unwrap();
                if let Some(rows) = size {
                    let table = Table::frame_from_rows(
                        vec!["v".to_string()],
                        vec![vec![Cell::Int(i as i64)]; *rows],
                    )
                    .unwrap();
                    member.data().write("x", &table.into()).unwrap();
                }
                collection.add([member]).unwrap();
            }

            let merged = collection
                .data()
                .unwrap()
                .retrieve("x", IndexBy::Uuid, &ReadOptions::new())
                .unwrap();
            let expected: usize = sizes.iter().flatten().sum();
            prop_assert_eq!(merged.as_table().unwrap().len(), expected);
            Ok(())
        })
        .unwrap();
}
