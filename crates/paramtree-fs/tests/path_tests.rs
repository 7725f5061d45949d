use assert_fs::prelude::*;
use paramtree_fs::NormalizedPath;
use rstest::rstest;

#[rstest]
#[case("foo/bar/baz", "foo/bar/baz")]
#[case("foo\\bar\\baz", "foo/bar/baz")]
#[case("foo/bar\\baz", "foo/bar/baz")]
fn test_normalize_separators(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(NormalizedPath::new(input).as_str(), expected);
}

#[rstest]
#[case("configs/ports.pt", Some("pt"))]
#[case("configs/ports.json", Some("json"))]
#[case("configs/ports", None)]
fn test_extension(#[case] input: &str, #[case] expected: Option<&str>) {
    assert_eq!(NormalizedPath::new(input).extension(), expected);
}

#[test]
fn test_parent_and_file_name() {
    let path = NormalizedPath::new("configs/site/ports.pt");
    assert_eq!(path.parent().unwrap().as_str(), "configs/site");
    assert_eq!(path.file_name(), Some("ports.pt"));
}

#[test]
fn test_canonical_key_resolves_dot_segments() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("site/ports.pt").write_str("// EOF\n").unwrap();

    let direct = NormalizedPath::new(temp.path().join("site/ports.pt"));
    let dotted = NormalizedPath::new(temp.path().join("site/../site/./ports.pt"));

    assert_eq!(direct.canonical_key(), dotted.canonical_key());
}

#[test]
fn test_canonical_key_of_missing_file_is_identity() {
    let path = NormalizedPath::new("does/not/exist.pt");
    assert_eq!(path.canonical_key(), path);
}
