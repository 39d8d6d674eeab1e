use mosaic::utils::{sha1_hex, slugify};

#[test]
fn test_slugify() {
    // basic names
    assert_eq!(slugify("hello"), "hello");
    assert_eq!(slugify("Hello World"), "hello-world");
    assert_eq!(slugify("vacation photo.jpg"), "vacation-photo-jpg");

    // runs of separators collapse
    assert_eq!(slugify("a  -  b"), "a-b");
    assert_eq!(slugify("my___file"), "my-file");

    // leading and trailing punctuation disappears
    assert_eq!(slugify("..hidden"), "hidden");
    assert_eq!(slugify("name..."), "name");

    // non-ascii is dropped, not transliterated
    assert_eq!(slugify("café menu"), "caf-menu");

    // degenerate input
    assert_eq!(slugify(""), "");
    assert_eq!(slugify("!!!"), "");
}

#[test]
fn test_sha1_hex() {
    // known sha1 test vectors
    assert_eq!(sha1_hex(b""), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    assert_eq!(sha1_hex(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");

    // deterministic, 40 hex chars
    let hash = sha1_hex(b"mosaic");
    assert_eq!(hash.len(), 40);
    assert_eq!(hash, sha1_hex(b"mosaic"));
    assert_ne!(hash, sha1_hex(b"mosaik"));
}
