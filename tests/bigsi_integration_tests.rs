//! End-to-end scenarios for the index: build, freeze, query, persist,
//! reload.

use std::path::Path;

use tempfile::tempdir;

use bigsid::bigsi::Bigsi;
use bigsid::bitvec::BitVector;
use bigsid::bloom::BloomFilter;
use bigsid::error::BigsiError;

/// A filter with exactly the given bit positions set.
fn filter_with_bits(num_bits: usize, num_hashes: usize, positions: &[usize]) -> BloomFilter {
    let mut bits = BitVector::new(num_bits);
    for &p in positions {
        bits.set(p, true).unwrap();
    }
    BloomFilter::from_parts(num_hashes, bits).unwrap()
}

/// The two-colour fixture shared by several scenarios:
/// "A" has Bloom bits {3, 11}, "B" has Bloom bits {3, 7}.
fn two_colour_index(dir: &Path) -> Bigsi {
    let mut bigsi = Bigsi::new(16, 2, dir).unwrap();
    let a = filter_with_bits(16, 2, &[3, 11]);
    let b = filter_with_bits(16, 2, &[3, 7]);
    bigsi.add([("A", &a), ("B", &b)], 2).unwrap();
    bigsi.index().unwrap();
    bigsi
}

#[test]
fn shared_bit_matches_both_colours() {
    let dir = tempdir().unwrap();
    let bigsi = two_colour_index(dir.path());

    // Both colours have bit 3 set
    let mut result = BitVector::new(2);
    bigsi.query(&[3, 3], &mut result).unwrap();
    assert!(result.get(0).unwrap());
    assert!(result.get(1).unwrap());
    assert_eq!(result.count(), 2);
}

#[test]
fn and_chain_excludes_partial_matches() {
    let dir = tempdir().unwrap();
    let bigsi = two_colour_index(dir.path());

    // Bit 11 belongs only to A, bit 7 only to B; no colour has both
    let mut result = BitVector::new(2);
    bigsi.query(&[11, 7], &mut result).unwrap();
    assert_eq!(result.count(), 0);
}

#[test]
fn empty_row_short_circuits_to_ok() {
    let dir = tempdir().unwrap();
    let mut bigsi = Bigsi::new(8, 1, dir.path()).unwrap();
    let a = filter_with_bits(8, 1, &[0]);
    bigsi.add([("A", &a)], 1).unwrap();
    bigsi.index().unwrap();

    // Row 5 was never set by any colour
    let mut result = BitVector::new(1);
    bigsi.query(&[5], &mut result).unwrap();
    assert_eq!(result.count(), 0);
}

#[test]
fn duplicate_in_one_batch_is_rejected_after_first_entry() {
    let dir = tempdir().unwrap();
    let mut bigsi = Bigsi::new(16, 2, dir.path()).unwrap();
    let a = filter_with_bits(16, 2, &[3, 11]);

    let err = bigsi.add([("A", &a), ("A", &a)], 2).unwrap_err();
    assert!(matches!(err, BigsiError::DuplicateSequenceId(ref id) if id == "A"));
    assert_eq!(bigsi.colours(), 1);
}

#[test]
fn persisted_index_answers_the_same_queries() {
    let dir = tempdir().unwrap();

    let bigsi = two_colour_index(dir.path());
    let mut before = BitVector::new(2);
    bigsi.query(&[3, 3], &mut before).unwrap();
    bigsi.destroy().unwrap();

    let loaded = Bigsi::load(dir.path()).unwrap();
    assert_eq!(loaded.num_bits(), 16);
    assert_eq!(loaded.num_hashes(), 2);
    assert_eq!(loaded.colours(), 2);

    let mut after = BitVector::new(2);
    loaded.query(&[3, 3], &mut after).unwrap();
    assert_eq!(after, before);

    // Colour lookups also survive the round trip
    assert_eq!(loaded.lookup_colour(0).unwrap(), "A");
    assert_eq!(loaded.lookup_colour(1).unwrap(), "B");
}

#[test]
fn result_capacity_must_match_colour_count() {
    let dir = tempdir().unwrap();
    let bigsi = two_colour_index(dir.path());

    let mut too_small = BitVector::new(1);
    assert!(matches!(
        bigsi.query(&[3, 3], &mut too_small),
        Err(BigsiError::CapacityMismatch { expected: 2, got: 1 })
    ));
}

#[test]
fn load_from_an_empty_directory_fails() {
    let dir = tempdir().unwrap();
    assert!(Bigsi::load(dir.path()).is_err());
}

#[test]
fn load_without_stores_fails_even_with_metadata() {
    let dir = tempdir().unwrap();
    // Only the sidecar, no store directories
    std::fs::write(
        dir.path().join("metadata.json"),
        r#"{
  "db_directory": "x",
  "metadata_file": "x/metadata.json",
  "bitvectors_db": "x/bitvectors.db",
  "colours_db": "x/colours.db",
  "num_bits": 16,
  "num_hashes": 2,
  "colour_count": 2
}"#,
    )
    .unwrap();
    assert!(Bigsi::load(dir.path()).is_err());
}

#[test]
fn destroy_before_freeze_leaves_no_files() {
    let dir = tempdir().unwrap();
    let index_dir = dir.path().join("index");
    let mut bigsi = Bigsi::new(16, 2, &index_dir).unwrap();
    let a = filter_with_bits(16, 2, &[3]);
    bigsi.add([("A", &a)], 1).unwrap();
    bigsi.destroy().unwrap();
    assert!(!index_dir.exists());
}

#[test]
fn queries_run_concurrently_on_a_shared_index() {
    let dir = tempdir().unwrap();
    let bigsi = std::sync::Arc::new(two_colour_index(dir.path()));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let bigsi = std::sync::Arc::clone(&bigsi);
            std::thread::spawn(move || {
                for _ in 0..50 {
                    let mut result = BitVector::new(2);
                    bigsi.query(&[3, 3], &mut result).unwrap();
                    assert_eq!(result.count(), 2);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}
