use paramtree_fs::{NormalizedPath, io};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_write_atomic_creates_file() {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join("ports.pt"));

    io::write_atomic(&path, b"namespace ports {\n}\n").unwrap();

    let content = fs::read_to_string(path.to_native()).unwrap();
    assert_eq!(content, "namespace ports {\n}\n");
}

#[test]
fn test_write_atomic_overwrites_existing() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("ports.pt");
    fs::write(&file_path, "original").unwrap();

    let path = NormalizedPath::new(&file_path);
    io::write_atomic(&path, b"updated").unwrap();

    assert_eq!(fs::read_to_string(&file_path).unwrap(), "updated");
}

#[test]
fn test_write_atomic_creates_parent_dirs() {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join("site/tower/ports.pt"));

    io::write_atomic(&path, b"// EOF\n").unwrap();

    assert!(path.is_file());
}

#[test]
fn test_write_atomic_leaves_no_temp_file() {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join("ports.pt"));

    io::write_atomic(&path, b"x").unwrap();

    let entries: Vec<_> = fs::read_dir(temp.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[test]
fn test_failed_replace_discards_staged_file() {
    let temp = TempDir::new().unwrap();
    let occupied = temp.path().join("ports.pt");
    fs::create_dir(&occupied).unwrap();
    fs::write(occupied.join("keep.pt"), "// EOF\n").unwrap();

    let err = io::write_atomic(&NormalizedPath::new(&occupied), b"x").unwrap_err();

    assert!(matches!(err, paramtree_fs::Error::Io { .. }));
    let names: Vec<_> = fs::read_dir(temp.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(names, vec![std::ffi::OsString::from("ports.pt")]);
}

#[test]
fn test_read_text_missing_file_reports_path() {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join("missing.pt"));

    let err = io::read_text(&path).unwrap_err();
    assert!(err.to_string().contains("missing.pt"));
}
