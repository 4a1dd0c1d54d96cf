use std::path::PathBuf;

use crate::version::{TableFile, VersionSet};

fn file(level: usize, number: u64, smallest: &[u8], largest: &[u8]) -> TableFile {
    TableFile {
        level,
        file_number: number,
        path: PathBuf::from(format!("L{level}-{number}.sst")),
        smallest_key: smallest.to_vec(),
        largest_key: largest.to_vec(),
        file_size: 0,
    }
}

#[test]
fn candidates_are_newest_first_at_level_zero() {
    let vs = VersionSet::new(7);
    vs.add_file(file(0, 1, b"a", b"m")).unwrap();
    vs.add_file(file(0, 2, b"a", b"m")).unwrap();

    let candidates = vs.get_candidate_files(b"c").unwrap();
    let numbers: Vec<u64> = candidates.iter().map(|f| f.file_number).collect();
    assert_eq!(numbers, vec![2, 1]);
}

#[test]
fn level_zero_excludes_non_overlapping_files() {
    let vs = VersionSet::new(7);
    vs.add_file(file(0, 1, b"a", b"c")).unwrap();
    vs.add_file(file(0, 2, b"x", b"z")).unwrap();

    let candidates = vs.get_candidate_files(b"b").unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].file_number, 1);
}

#[test]
fn deeper_levels_contribute_at_most_one_file_each() {
    let vs = VersionSet::new(7);
    vs.add_file(file(1, 1, b"a", b"f")).unwrap();
    vs.add_file(file(1, 2, b"g", b"z")).unwrap();
    vs.add_file(file(2, 3, b"a", b"z")).unwrap();

    let candidates = vs.get_candidate_files(b"d").unwrap();
    // one from level 1 (file 1, whose range covers "d") and one from level 2
    assert_eq!(candidates.len(), 2);
    assert!(candidates.iter().any(|f| f.file_number == 1));
    assert!(candidates.iter().any(|f| f.file_number == 3));
}

#[test]
fn candidates_concatenate_newest_to_oldest_across_levels() {
    let vs = VersionSet::new(7);
    vs.add_file(file(0, 5, b"a", b"z")).unwrap();
    vs.add_file(file(1, 1, b"a", b"z")).unwrap();

    let candidates = vs.get_candidate_files(b"m").unwrap();
    assert_eq!(candidates[0].level, 0);
    assert_eq!(candidates[1].level, 1);
}

#[test]
fn key_outside_every_range_yields_no_candidates() {
    let vs = VersionSet::new(7);
    vs.add_file(file(0, 1, b"a", b"c")).unwrap();
    vs.add_file(file(1, 2, b"d", b"f")).unwrap();

    let candidates = vs.get_candidate_files(b"z").unwrap();
    assert!(candidates.is_empty());
}
