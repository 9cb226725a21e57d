//! The offline sketch and shrink subcommand bodies.

use std::path::Path;

use anyhow::{bail, Context, Result};
use log::info;
use needletail::parse_fastx_file;
use rayon::prelude::*;

use crate::bigsi::Bigsi;
use crate::bloom::BloomFilter;
use crate::config::Config;
use crate::sketch::{bloom_for_sequence, SketchParams};

/// Sketch every record of one file; with `index_dir` the sketches are
/// frozen into a queryable index.
pub fn sketch(config_path: &Path, file: &Path, index_dir: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path)
        .with_context(|| format!("failed to load config: {}", config_path.display()))?;
    let (num_bits, num_hashes) = config.bloom_params()?;
    let params = SketchParams {
        k_size: config.k_size,
        sketch_size: config.sketch_size,
        num_bits,
        num_hashes,
    };

    // Read the records up front so the sketching can fan out
    let mut reader = parse_fastx_file(file)
        .with_context(|| format!("could not open sequence file: {}", file.display()))?;
    let mut records: Vec<(String, Vec<u8>)> = Vec::new();
    while let Some(record) = reader.next() {
        let record = record.context("invalid sequence record")?;
        let id = String::from_utf8_lossy(record.id())
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string();
        records.push((id, record.seq().into_owned()));
    }
    if records.is_empty() {
        bail!("no sequence records in {}", file.display());
    }

    let blooms: Vec<(String, BloomFilter)> = records
        .par_iter()
        .map(|(id, seq)| {
            bloom_for_sequence(seq, &params).map(|bf| (id.clone(), bf))
        })
        .collect::<crate::error::Result<_>>()?;

    for (id, bf) in &blooms {
        info!(
            "{}: {} bits set across {} ({} hashes)",
            id,
            bf.bit_vector().count(),
            bf.num_bits(),
            bf.num_hashes()
        );
    }
    println!(
        "sketched {} records from {} (k={}, sketch={})",
        blooms.len(),
        file.display(),
        config.k_size,
        config.sketch_size
    );

    if let Some(dir) = index_dir {
        let mut bigsi = Bigsi::new(num_bits, num_hashes, dir)?;
        bigsi.add(blooms.iter().map(|(id, bf)| (id.as_str(), bf)), blooms.len())?;
        bigsi.index()?;
        bigsi.flush()?;
        println!("index written to {}", dir.display());
    }
    Ok(())
}

/// Reserved maintenance verb.
pub fn shrink(config_path: &Path) -> Result<()> {
    let _ = Config::load(config_path)
        .with_context(|| format!("failed to load config: {}", config_path.display()))?;
    bail!("shrink is reserved and not implemented");
}
