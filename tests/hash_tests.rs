//! Integration tests for the hash engine.

use std::fs;
use std::io::Write;

use proptest::prelude::*;
use sha2::{Digest, Sha256};
use tempfile::{NamedTempFile, TempDir};

use evidence_collector::utils::hash::{hash_file, hash_file_with_progress, parse_algorithms, verify_hash, HashAlgorithm};

const HELLO_MD5: &str = "5d41402abc4b2a76b9719d911017c592";
const HELLO_SHA1: &str = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";
const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

fn hello_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"hello").unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_all_algorithms_in_one_pass() {
    let file = hello_file();
    let digests = hash_file(file.path(), &["md5", "sha1", "sha256"]);

    assert_eq!(digests.len(), 3);
    assert_eq!(digests["md5"], HELLO_MD5);
    assert_eq!(digests["sha1"], HELLO_SHA1);
    assert_eq!(digests["sha256"], HELLO_SHA256);
}

#[test]
fn test_unknown_algorithms_are_dropped() {
    let file = hello_file();
    let digests = hash_file(file.path(), &["SHA256", "whirlpool", "sha256"]);

    assert_eq!(digests.keys().collect::<Vec<_>>(), vec!["sha256"]);
    assert_eq!(
        parse_algorithms(&["crc32", "md5", "MD5"]),
        vec![HashAlgorithm::Md5]
    );
}

#[test]
fn test_missing_file_yields_empty_map() {
    let dir = TempDir::new().unwrap();
    assert!(hash_file(&dir.path().join("absent.bin"), &["md5"]).is_empty());
}

#[test]
fn test_empty_file_has_well_known_digest() {
    let file = NamedTempFile::new().unwrap();
    let digests = hash_file(file.path(), &["md5"]);
    assert_eq!(digests["md5"], "d41d8cd98f00b204e9800998ecf8427e");
}

#[test]
fn test_progress_reaches_total() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("large.bin");
    fs::write(&path, vec![7u8; 100_000]).unwrap();

    let mut updates = Vec::new();
    let mut cb = |done: u64, total: u64| updates.push((done, total));
    hash_file_with_progress(&path, &["sha1"], Some(&mut cb as &mut dyn FnMut(u64, u64)));

    assert!(updates.len() > 1);
    assert_eq!(updates.last().copied(), Some((100_000, 100_000)));
    assert!(updates.windows(2).all(|w| w[0].0 < w[1].0));
}

#[test]
fn test_verify_is_case_insensitive() {
    let file = hello_file();
    assert!(verify_hash(file.path(), &HELLO_SHA256.to_uppercase(), "sha256"));
    assert!(verify_hash(file.path(), HELLO_MD5, "MD5"));
    assert!(!verify_hash(file.path(), HELLO_MD5, "sha1"));
    assert!(!verify_hash(file.path(), HELLO_MD5, "crc32"));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_streamed_sha256_matches_one_shot(data in proptest::collection::vec(any::<u8>(), 0..40_000)) {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&data).unwrap();
        file.flush().unwrap();

        let expected = hex::encode(Sha256::digest(&data));
        let digests = hash_file(file.path(), &["sha256"]);
        prop_assert_eq!(&digests["sha256"], &expected);
        prop_assert!(verify_hash(file.path(), &digests["sha256"], "sha256"));
    }
}
