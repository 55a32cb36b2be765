//! Integration tests for layered configuration loading

use crate::integration::with_xdg_env;
use std::path::PathBuf;
use tempfile::TempDir;
use treants::config::ConfigLoader;
use treants::{CollectionError, DuplicateNamePolicy, IndexBy, MemberCollection};

fn write(path: PathBuf, contents: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

#[test]
fn test_defaults_without_any_sources() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();

    let config = with_xdg_env(&test_dir, &[], || ConfigLoader::load(workspace.path()).unwrap());

    assert!(config.resolver.search_roots.is_empty());
    assert_eq!(config.resolver.ignore_patterns.len(), 3);
    assert_eq!(config.aggregate.index_by, IndexBy::Uuid);
    assert_eq!(config.logging.output, "stderr");
}

#[test]
fn test_layer_precedence() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();

    write(
        test_dir.path().join("xdg").join("treants").join("config.toml"),
        r#"
[resolver]
search_roots = ["/global/sims"]
max_depth = 2

[aggregate]
duplicate_names = "warn"
"#,
    );
    write(
        workspace.path().join("config").join("config.toml"),
        "[resolver]\nmax_depth = 5\n",
    );

    let config = with_xdg_env(
        &test_dir,
        &[("TREANTS_AGGREGATE__INDEX_BY", "name")],
        || ConfigLoader::load(workspace.path()).unwrap(),
    );

    assert_eq!(config.resolver.search_roots, vec![PathBuf::from("/global/sims")]);
    assert_eq!(config.resolver.max_depth, Some(5));
    assert_eq!(config.aggregate.duplicate_names, DuplicateNamePolicy::Warn);
    assert_eq!(config.aggregate.index_by, IndexBy::Name);
}

#[test]
fn test_environment_specific_workspace_file() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    write(
        workspace.path().join("config").join("config.toml"),
        "[logging]\nlevel = \"warn\"\n",
    );
    write(
        workspace.path().join("config").join("ci.toml"),
        "[logging]\nlevel = \"debug\"\nformat = \"json\"\n",
    );

    let config = with_xdg_env(&test_dir, &[("TREANTS_ENV", "ci")], || {
        ConfigLoader::load(workspace.path()).unwrap()
    });

    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, "json");
}

#[test]
fn test_environment_lists_and_numbers() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();

    let config = with_xdg_env(
        &test_dir,
        &[
            ("TREANTS_RESOLVER__SEARCH_ROOTS", "/data/a,/data/b"),
            ("TREANTS_RESOLVER__MAX_DEPTH", "3"),
            ("TREANTS_RESOLVER__FOLLOW_SYMLINKS", "true"),
        ],
        || ConfigLoader::load(workspace.path()).unwrap(),
    );

    assert_eq!(
        config.resolver.search_roots,
        vec![PathBuf::from("/data/a"), PathBuf::from("/data/b")]
    );
    assert_eq!(config.resolver.max_depth, Some(3));
    assert!(config.resolver.follow_symlinks);
}

#[test]
fn test_invalid_values_rejected() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    write(
        workspace.path().join("config").join("config.toml"),
        "[logging]\nlevel = \"loud\"\n",
    );

    let result = with_xdg_env(&test_dir, &[], || ConfigLoader::load(workspace.path()));
    match result {
        Err(CollectionError::ConfigError(msg)) => assert!(msg.contains("Invalid log level")),
        other => panic!("expected ConfigError, got {:?}", other),
    }

    let result = with_xdg_env(
        &test_dir,
        &[("TREANTS_AGGREGATE__DUPLICATE_NAMES", "maybe")],
        || ConfigLoader::load(TempDir::new().unwrap().path()),
    );
    assert!(matches!(result, Err(CollectionError::ConfigError(_))));
}

#[test]
fn test_collection_from_loaded_config() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    write(
        workspace.path().join("config").join("config.toml"),
        "[aggregate]\nindex_by = \"name\"\nduplicate_names = \"warn\"\n",
    );

    let config = with_xdg_env(&test_dir, &[], || ConfigLoader::load(workspace.path()).unwrap());
    let collection = MemberCollection::from_config(&config);

    assert_eq!(collection.aggregate_config().index_by, IndexBy::Name);
    assert_eq!(
        collection.aggregate_config().duplicate_names,
        DuplicateNamePolicy::Warn
    );
    assert_eq!(collection.data().unwrap().index_by(), IndexBy::Name);
    assert!(collection.is_empty().unwrap());
}
