use filestore_config::StorageDir;

// The process-wide instance is shared by every test in this binary, so all assertions about it
// live in this single test.
#[test]
fn first_initialization_wins() {
    let tempdir = tempfile::tempdir().unwrap();
    let first_path = tempdir.path().join("first");
    let second_path = tempdir.path().join("second");

    assert!(StorageDir::get().is_none());

    let first = StorageDir::init(&first_path).unwrap();
    let second = StorageDir::init(&second_path).unwrap();

    assert!(std::ptr::eq(first, second));
    assert_eq!(second.path(), first_path);
    assert!(first_path.is_dir());
    assert!(!second_path.exists());

    let current = StorageDir::get().unwrap();
    assert!(std::ptr::eq(first, current));
}
