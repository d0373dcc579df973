use std::time::{Duration, UNIX_EPOCH};

use lfs_core::{Backend, Error, FixedClock, LockBackend};
use lfs_local::{current_username, lock_id, FsBackend};

const FOO_LOCK_ID: &str = "d76670443f4d5ecdeea34c12793917498e18e858c6f74cd38c4b794273bb5e28";

fn backend(root: &std::path::Path) -> FsBackend {
    let clock = FixedClock(UNIX_EPOCH + Duration::from_secs(1_700_000_000));
    FsBackend::new(root, 0o022, &clock).unwrap()
}

#[test]
fn lock_id_is_versioned_path_hash() {
    assert_eq!(lock_id("foo"), FOO_LOCK_ID);
}

#[test]
fn create_writes_versioned_body_and_cleans_sentinel() {
    let dir = tempfile::tempdir().unwrap();
    let backend = backend(dir.path());
    let locks = backend.lock_backend();

    let lock = locks.create("foo", Some("refs/heads/main")).unwrap();
    assert_eq!(lock.id(), FOO_LOCK_ID);
    assert_eq!(lock.path(), "foo");
    assert_eq!(lock.locked_at(), 1_700_000_000);
    assert_eq!(lock.owner(), current_username());

    let lock_file = dir.path().join("locks").join(FOO_LOCK_ID);
    assert_eq!(
        std::fs::read_to_string(&lock_file).unwrap(),
        "v1:1700000000:foo"
    );
    assert!(!dir.path().join("locks").join(format!("{FOO_LOCK_ID}.lock")).exists());
}

#[test]
fn second_create_conflicts_and_keeps_first() {
    let dir = tempfile::tempdir().unwrap();
    let backend = backend(dir.path());
    let locks = backend.lock_backend();

    let first = locks.create("foo", None).unwrap();
    let err = locks.create("foo", None).unwrap_err();
    assert!(matches!(err, Error::Conflict));

    let existing = locks.from_path("foo").unwrap();
    assert_eq!(existing, first);
}

#[test]
fn stale_sentinel_blocks_creation() {
    let dir = tempfile::tempdir().unwrap();
    let backend = backend(dir.path());
    let locks = backend.lock_backend();

    std::fs::write(dir.path().join("locks").join(format!("{FOO_LOCK_ID}.lock")), "v1:1:foo")
        .unwrap();
    let err = locks.create("foo", None).unwrap_err();
    assert!(matches!(err, Error::Conflict));
}

#[test]
fn from_id_and_from_path_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let backend = backend(dir.path());
    let locks = backend.lock_backend();

    // a path containing the body separator survives
    let created = locks.create("dir/a:b.bin", None).unwrap();
    let by_id = locks.from_id(created.id()).unwrap();
    assert_eq!(by_id.path(), "dir/a:b.bin");
    let by_path = locks.from_path("dir/a:b.bin").unwrap();
    assert_eq!(by_path, created);

    assert!(matches!(locks.from_id(FOO_LOCK_ID).unwrap_err(), Error::NotFound));
}

#[test]
fn from_path_rejects_body_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let backend = backend(dir.path());
    let locks = backend.lock_backend();

    // a lock file whose body names a different path
    std::fs::write(dir.path().join("locks").join(lock_id("foo")), "v1:1:bar").unwrap();
    let err = locks.from_path("foo").unwrap_err();
    assert!(matches!(err, Error::CorruptData(_)));
}

#[test]
fn unlock_removes_file_once() {
    let dir = tempfile::tempdir().unwrap();
    let backend = backend(dir.path());
    let locks = backend.lock_backend();

    let lock = locks.create("foo", None).unwrap();
    locks.unlock(&lock).unwrap();
    assert!(!dir.path().join("locks").join(FOO_LOCK_ID).exists());
    assert!(matches!(locks.unlock(&lock).unwrap_err(), Error::NotFound));
}

#[test]
fn range_pages_in_id_order_without_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let backend = backend(dir.path());
    let locks = backend.lock_backend();

    let paths = ["a", "b", "c", "d", "e"];
    for path in paths {
        locks.create(path, None).unwrap();
    }
    let mut expected: Vec<String> = paths.iter().map(|p| lock_id(p)).collect();
    expected.sort_unstable();

    let mut seen = Vec::new();
    let mut cursor = String::new();
    loop {
        let page = locks.range(&cursor, 2).unwrap();
        assert!(page.locks.len() <= 2);
        for lock in &page.locks {
            seen.push(lock.id().to_owned());
        }
        if page.next_cursor.is_empty() {
            break;
        }
        cursor = page.next_cursor;
    }
    assert_eq!(seen, expected);
}

#[test]
fn range_skips_sentinels_and_respects_cursor() {
    let dir = tempfile::tempdir().unwrap();
    let backend = backend(dir.path());
    let locks = backend.lock_backend();

    locks.create("a", None).unwrap();
    locks.create("b", None).unwrap();
    std::fs::write(dir.path().join("locks").join(format!("{FOO_LOCK_ID}.lock")), "junk").unwrap();

    let all = locks.range("", 100).unwrap();
    assert_eq!(all.locks.len(), 2);
    assert!(all.next_cursor.is_empty());

    // cursor equal to an existing id is exclusive
    let first_id = all.locks[0].id().to_owned();
    let rest = locks.range(&first_id, 100).unwrap();
    assert_eq!(rest.locks.len(), 1);
    assert_ne!(rest.locks[0].id(), first_id);
}

#[test]
fn exhausted_page_has_empty_cursor() {
    let dir = tempfile::tempdir().unwrap();
    let backend = backend(dir.path());
    let locks = backend.lock_backend();

    locks.create("only", None).unwrap();
    let page = locks.range("", 1).unwrap();
    assert_eq!(page.locks.len(), 1);
    assert!(page.next_cursor.is_empty(), "no further locks, cursor must be empty");
}
