//! The ingest pipeline wired together without the detach: watcher
//! events feed the worker pool, workers sketch files into a shared
//! build-phase index, and the result freezes into a queryable store.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::tempdir;

use bigsid::bigsi::Bigsi;
use bigsid::bitvec::BitVector;
use bigsid::bloom::hash_values;
use bigsid::daemon::pool::WorkerPool;
use bigsid::daemon::watcher::DirWatcher;
use bigsid::sketch::{self, SketchParams};

const PARAMS: SketchParams = SketchParams {
    k_size: 5,
    sketch_size: 32,
    num_bits: 1024,
    num_hashes: 3,
};

fn write_fasta(path: &Path, records: &[(&str, &str)]) {
    let mut f = File::create(path).unwrap();
    for (id, seq) in records {
        writeln!(f, ">{}", id).unwrap();
        writeln!(f, "{}", seq).unwrap();
    }
    f.sync_all().unwrap();
}

fn wait_until(deadline: Duration, mut probe: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if probe() {
            return true;
        }
        thread::sleep(Duration::from_millis(50));
    }
    false
}

#[test]
fn watcher_events_flow_through_the_pool_into_the_index() {
    let dir = tempdir().unwrap();
    let watch_dir = dir.path().join("incoming");
    std::fs::create_dir_all(&watch_dir).unwrap();

    let index = Arc::new(Mutex::new(Some(
        Bigsi::new(PARAMS.num_bits, PARAMS.num_hashes, &dir.path().join("index")).unwrap(),
    )));
    let pool = Arc::new(WorkerPool::new(2).unwrap());

    let watcher = {
        let pool = Arc::clone(&pool);
        let index = Arc::clone(&index);
        DirWatcher::start(&watch_dir, move |paths| {
            let index = Arc::clone(&index);
            pool.submit(move || {
                for path in paths {
                    if !path.is_file() {
                        continue;
                    }
                    let blooms = match sketch::blooms_from_file(&path, &PARAMS) {
                        Ok(b) => b,
                        Err(_) => continue,
                    };
                    let mut guard = index.lock().unwrap();
                    if let Some(bigsi) = guard.as_mut() {
                        // Re-notifications re-deliver records already
                        // ingested; the duplicate check drops them
                        for (id, bf) in &blooms {
                            let _ = bigsi.add([(id.as_str(), bf)], 1);
                        }
                    }
                }
            });
        })
        .unwrap()
    };

    // Stage outside the watch directory, then rename in so the watcher
    // sees one event for a complete file
    let staged = dir.path().join("batch1.fa");
    write_fasta(
        &staged,
        &[
            ("sample_1", "ACGTACGGTTCAGTCAGGCTACGATCGATTAGC"),
            ("sample_2", "TTGACCATGCATTACGGATTGACCATTTGACCA"),
        ],
    );
    std::fs::rename(&staged, watch_dir.join("batch1.fa")).unwrap();

    assert!(
        wait_until(Duration::from_secs(10), || {
            index
                .lock()
                .unwrap()
                .as_ref()
                .map(|b| b.colours() >= 2)
                .unwrap_or(false)
        }),
        "watched file never reached the index"
    );

    // Orderly shutdown: watcher, then drain and destroy the pool
    watcher.stop().unwrap();
    pool.wait();
    match Arc::try_unwrap(pool) {
        Ok(pool) => pool.destroy().unwrap(),
        Err(_) => panic!("pool still referenced after watcher stop"),
    }

    // Freeze what was ingested and check a known k-mer resolves
    let mut bigsi = index.lock().unwrap().take().unwrap();
    let colours = bigsi.colours();
    assert!(colours >= 2);
    bigsi.index().unwrap();

    let mut result = BitVector::new(colours);
    bigsi
        .query(&hash_values(b"ACGTA", PARAMS.num_hashes), &mut result)
        .unwrap();
    assert!(result.get(0).unwrap(), "sample_1 should match its own k-mer");
    bigsi.destroy().unwrap();
}

#[test]
fn sketch_to_index_round_trip_on_disk() {
    let dir = tempdir().unwrap();
    let fasta = dir.path().join("refs.fa");
    write_fasta(
        &fasta,
        &[
            ("ref_a", "ACGTACGGTTCAGTCAGGCTACGATCGATTAGC"),
            ("ref_b", "TTGACCATGCATTACGGATTGACCATTTGACCA"),
        ],
    );

    let blooms = sketch::blooms_from_file(&fasta, &PARAMS).unwrap();
    assert_eq!(blooms.len(), 2);

    let index_dir = dir.path().join("index");
    let mut bigsi = Bigsi::new(PARAMS.num_bits, PARAMS.num_hashes, &index_dir).unwrap();
    bigsi
        .add(blooms.iter().map(|(id, bf)| (id.as_str(), bf)), blooms.len())
        .unwrap();
    bigsi.index().unwrap();
    bigsi.destroy().unwrap();

    let loaded = Bigsi::load(&index_dir).unwrap();
    assert_eq!(loaded.colours(), 2);

    // Every sketched k-mer of ref_a must report colour 0; whether it
    // also reports colour 1 depends only on Bloom collisions
    let kmers = sketch::sketch_kmers(b"ACGTACGGTTCAGTCAGGCTACGATCGATTAGC", PARAMS.k_size, PARAMS.sketch_size);
    assert!(!kmers.is_empty());
    for kmer in &kmers {
        let mut result = BitVector::new(2);
        loaded
            .query(&hash_values(kmer, PARAMS.num_hashes), &mut result)
            .unwrap();
        assert!(result.get(0).unwrap(), "k-mer {:?} missing from ref_a", kmer);
    }

    assert_eq!(loaded.lookup_colour(0).unwrap(), "ref_a");
    assert_eq!(loaded.lookup_colour(1).unwrap(), "ref_b");
}

#[test]
fn pool_survives_bad_files_from_the_watcher() {
    let dir = tempdir().unwrap();
    let watch_dir = dir.path().join("incoming");
    std::fs::create_dir_all(&watch_dir).unwrap();

    let processed = Arc::new(Mutex::new(0usize));
    let pool = Arc::new(WorkerPool::new(2).unwrap());

    let watcher = {
        let pool = Arc::clone(&pool);
        let processed = Arc::clone(&processed);
        DirWatcher::start(&watch_dir, move |paths| {
            let processed = Arc::clone(&processed);
            pool.submit(move || {
                for path in paths {
                    if !path.is_file() {
                        continue;
                    }
                    // A non-FASTA file fails to parse; the task logs and moves on
                    let _ = sketch::blooms_from_file(&path, &PARAMS);
                    *processed.lock().unwrap() += 1;
                }
            });
        })
        .unwrap()
    };

    std::fs::write(watch_dir.join("garbage.txt"), b"this is not fasta").unwrap();
    write_fasta(&watch_dir.join("good.fa"), &[("ok", "ACGTACGGTTCAGTCAGG")]);

    assert!(
        wait_until(Duration::from_secs(10), || *processed.lock().unwrap() >= 2),
        "pool stopped processing after a bad file"
    );

    watcher.stop().unwrap();
    pool.wait();
    Arc::try_unwrap(pool).ok().unwrap().destroy().unwrap();
}
