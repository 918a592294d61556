use std::cmp::Ordering;

use olecf::path::{dirname, filename, namecmp};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

#[test]
fn dirname_vectors() {
    let vectors: &[(&str, &str)] = &[
        ("", ""),
        ("/", "/"),
        ("/foo", "/"),
        ("/foo/", "/"),
        ("/foo/bar", "/foo/"),
        ("/foo/bar/baz///", "/foo/bar/"),
        ("Root Entry/", "Root Entry/"),
        ("Root Entry/hello.txt", "Root Entry/"),
    ];
    for (input, expected) in vectors {
        assert_eq!(dirname(input), *expected, "dirname({input:?})");
    }
}

#[test]
fn filename_vectors() {
    let vectors: &[(&str, &str)] = &[
        ("", ""),
        ("/", ""),
        ("/foo", "foo"),
        ("/foo/", "foo"),
        ("/foo/bar/baz///", "baz"),
    ];
    for (input, expected) in vectors {
        assert_eq!(filename(input), *expected, "filename({input:?})");
    }
}

#[test]
fn shorter_segments_sort_first() {
    assert_eq!(namecmp("Root Entry/z", "Root Entry/aa"), Ordering::Less);
    assert_eq!(namecmp("Root Entry/aa", "Root Entry/z"), Ordering::Greater);
    assert_eq!(
        namecmp("Root Entry/\u{1}Sh33tJ5", "Root Entry/hello.txt"),
        Ordering::Less
    );
}

fn path_strategy() -> impl Strategy<Value = String> {
    // Up to four segments of short alphanumeric names, slash-joined.
    prop::collection::vec("[a-z0-9]{0,8}", 1..4).prop_map(|segs| segs.join("/"))
}

proptest! {
    #[test]
    fn namecmp_is_reflexive(a in path_strategy()) {
        prop_assert_eq!(namecmp(&a, &a), Ordering::Equal);
    }

    #[test]
    fn namecmp_is_antisymmetric(a in path_strategy(), b in path_strategy()) {
        prop_assert_eq!(namecmp(&a, &b), namecmp(&b, &a).reverse());
    }

    #[test]
    fn namecmp_is_transitive(a in path_strategy(), b in path_strategy(), c in path_strategy()) {
        let mut v = [a, b, c];
        v.sort_by(|x, y| namecmp(x, y));
        // A total order sorted once stays sorted under pairwise checks.
        prop_assert!(namecmp(&v[0], &v[1]) != Ordering::Greater);
        prop_assert!(namecmp(&v[1], &v[2]) != Ordering::Greater);
        prop_assert!(namecmp(&v[0], &v[2]) != Ordering::Greater);
    }

    #[test]
    fn equal_compare_means_equal_segments(a in path_strategy(), b in path_strategy()) {
        if namecmp(&a, &b) == Ordering::Equal {
            prop_assert_eq!(a, b);
        }
    }
}
