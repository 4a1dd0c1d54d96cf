//! Tests for the shared FNV-1a 64-bit hash.

use crate::encoding::{fnv1a_64, fnv1a_64_with_seed, FNV_OFFSET_BASIS};

#[test]
fn hash_is_deterministic() {
    let a = fnv1a_64(b"hello world");
    let b = fnv1a_64(b"hello world");
    assert_eq!(a, b);
}

#[test]
fn hash_differs_across_inputs() {
    assert_ne!(fnv1a_64(b"foo"), fnv1a_64(b"bar"));
}

#[test]
fn hash_empty_input_equals_seed() {
    assert_eq!(fnv1a_64(b""), FNV_OFFSET_BASIS);
}

#[test]
fn hash_with_seed_matches_default_seed() {
    assert_eq!(
        fnv1a_64(b"some key"),
        fnv1a_64_with_seed(b"some key", FNV_OFFSET_BASIS)
    );
}

#[test]
fn hash_sensitive_to_single_byte_change() {
    assert_ne!(fnv1a_64(b"keyA"), fnv1a_64(b"keyB"));
}
