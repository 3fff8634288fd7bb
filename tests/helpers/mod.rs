//! Shared setup for integration tests: each test gets its own ephemeral
//! SQLite file under a fresh `tempfile::tempdir()`, matching the teacher's
//! `tests/helpers` convention of keeping per-test state isolated.

use catalog_core::catalog::{CatalogStore, UpsertEntry};
use catalog_core::config::{Config, SqliteConfig};
use catalog_core::database::entities::entry::EntryKind;
use catalog_core::Catalog;
use tempfile::TempDir;

/// Holds the `TempDir` alive for the test's duration; dropping it deletes
/// the backing SQLite file.
pub struct TestCatalog {
    pub catalog: Catalog,
    _dir: TempDir,
}

impl std::ops::Deref for TestCatalog {
    type Target = Catalog;
    fn deref(&self) -> &Catalog {
        &self.catalog
    }
}

pub async fn open_test_catalog() -> TestCatalog {
    let dir = TempDir::new().expect("tempdir creation succeeds");
    let db_path = dir.path().join("catalog.db");
    let config = Config {
        sqlite: SqliteConfig {
            path: db_path.to_string_lossy().to_string(),
            ..Default::default()
        },
        ..Default::default()
    };
    let catalog = Catalog::open(config).await.expect("catalog opens");
    TestCatalog { catalog, _dir: dir }
}

pub fn dir_entry(path: &str, parent: Option<&str>, ctime: i64, mtime: i64, last_scanned: i64) -> UpsertEntry {
    UpsertEntry {
        path: path.to_string(),
        parent: parent.map(str::to_string),
        size: 0,
        kind: EntryKind::Directory,
        ctime,
        mtime,
        last_scanned,
    }
}

pub fn file_entry(
    path: &str,
    parent: Option<&str>,
    size: i64,
    ctime: i64,
    mtime: i64,
    last_scanned: i64,
) -> UpsertEntry {
    UpsertEntry {
        path: path.to_string(),
        parent: parent.map(str::to_string),
        size,
        kind: EntryKind::File,
        ctime,
        mtime,
        last_scanned,
    }
}

/// Insert a chain of directories from `/r` down to `leaf_parent`, so tests
/// don't need to hand-write the (I1) parent-must-exist setup every time.
pub async fn seed_directories(store: &CatalogStore, paths: &[(&str, Option<&str>)]) {
    for (path, parent) in paths {
        store
            .upsert_entry(dir_entry(path, *parent, 0, 0, 1))
            .await
            .unwrap_or_else(|e| panic!("seeding directory '{path}' failed: {e}"));
    }
}
