// src/corpus.rs
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Partition discovery and whole-corpus file utilities
//!
//! Naive multi-file loading, merging partitions into a single file, gzip
//! compression of the merged file, and deriving a sample query.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use flate2::write::GzEncoder;
use flate2::Compression;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::catalog::Category;
use crate::constants::{PARTITION_INDEX_WIDTH, PARTITION_PREFIX, PARTITION_SUFFIX};
use crate::error::{Error, Result};
use crate::reader::Query;
use crate::schema::{Record, Schema};

/// `part_000001.csv` for index 1
pub fn partition_file_name(index: usize) -> String {
    format!(
        "{PARTITION_PREFIX}{index:0width$}{PARTITION_SUFFIX}",
        width = PARTITION_INDEX_WIDTH
    )
}

pub fn partition_path(dir: impl AsRef<Path>, index: usize) -> PathBuf {
    dir.as_ref().join(partition_file_name(index))
}

/// Partition files under `dir`, sorted by name (and therefore by index)
///
/// A missing directory has no partitions.
pub fn list_partitions(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let pattern = format!(
        "{}/{PARTITION_PREFIX}*{PARTITION_SUFFIX}",
        glob::Pattern::escape(&dir.to_string_lossy())
    );
    let paths = glob::glob(&pattern).map_err(|e| Error::InvalidConfig(e.to_string()))?;
    let mut out = Vec::new();
    for entry in paths {
        out.push(entry.map_err(io::Error::from)?);
    }
    out.sort();
    Ok(out)
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader)
}

fn load_reader<R: Read>(reader: R, schema: &Schema, out: &mut Vec<Record>) -> Result<()> {
    for rec in csv_reader(reader).records() {
        out.push(Record::from_csv(schema, &rec?)?);
    }
    Ok(())
}

/// Read one (uncompressed) record file
pub fn load_file(path: impl AsRef<Path>, schema: &Schema) -> anyhow::Result<Vec<Record>> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut out = Vec::new();
    load_reader(BufReader::new(f), schema, &mut out)
        .with_context(|| format!("parse {}", path.display()))?;
    Ok(out)
}

/// Read every partition under `dir`, one file at a time, into one vector
pub fn load_partitions(dir: impl AsRef<Path>, schema: &Schema) -> anyhow::Result<Vec<Record>> {
    let dir = dir.as_ref();
    let files = list_partitions(dir).with_context(|| format!("list {}", dir.display()))?;
    tracing::info!("Found {} partition files under {}", files.len(), dir.display());

    let mut out = Vec::new();
    for path in &files {
        let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
        load_reader(BufReader::new(f), schema, &mut out)
            .with_context(|| format!("parse {}", path.display()))?;
    }
    tracing::debug!("Loaded {} records from {} files", out.len(), files.len());
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    pub files: usize,
    pub bytes: u64,
}

/// Concatenate every partition under `dir`, in index order, into `output`
///
/// Refuses to overwrite an existing `output`.
pub fn merge_partitions(
    dir: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> anyhow::Result<MergeSummary> {
    let dir = dir.as_ref();
    let output = output.as_ref();
    let files = list_partitions(dir).with_context(|| format!("list {}", dir.display()))?;
    if files.is_empty() {
        anyhow::bail!("no partition files under {}", dir.display());
    }

    let f = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(output)
        .with_context(|| format!("create {}", output.display()))?;
    let mut w = BufWriter::new(f);
    let mut bytes = 0u64;
    for path in &files {
        let mut r = File::open(path).with_context(|| format!("open {}", path.display()))?;
        bytes += io::copy(&mut r, &mut w).with_context(|| format!("copy {}", path.display()))?;
    }
    w.flush()?;

    tracing::info!(
        "Merged {} partitions ({} bytes) into {}",
        files.len(),
        bytes,
        output.display()
    );
    Ok(MergeSummary {
        files: files.len(),
        bytes,
    })
}

/// Gzip `input` into `output`, returning the compressed size
pub fn compress_file(input: impl AsRef<Path>, output: impl AsRef<Path>) -> anyhow::Result<u64> {
    let input = input.as_ref();
    let output = output.as_ref();
    let mut r = BufReader::new(
        File::open(input).with_context(|| format!("open {}", input.display()))?,
    );
    let f = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(output)
        .with_context(|| format!("create {}", output.display()))?;
    let mut enc = GzEncoder::new(BufWriter::new(f), Compression::default());
    let raw = io::copy(&mut r, &mut enc).with_context(|| format!("compress {}", input.display()))?;
    enc.finish()?.flush()?;

    let compressed = std::fs::metadata(output)?.len();
    tracing::info!(
        "Compressed {} ({} bytes) -> {} ({} bytes)",
        input.display(),
        raw,
        output.display(),
        compressed
    );
    Ok(compressed)
}

/// Pick `n` random records and turn them into a filter query
///
/// The category is the most common one in the sample (ties go to the
/// alphabetically first name); the id set is every sampled id.
pub fn sample_query(records: &[Record], n: usize, seed: u64) -> Option<Query> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let sample: Vec<&Record> = records.choose_multiple(&mut rng, n).collect();

    let mut counts: HashMap<Category, usize> = HashMap::new();
    for rec in &sample {
        *counts.entry(rec.category).or_default() += 1;
    }
    let (category, _) = counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.as_str().cmp(a.0.as_str())))?;

    tracing::debug!(
        "Sampled {} records, most common category {}",
        sample.len(),
        category
    );
    Some(Query::new(category.as_str(), sample.iter().map(|r| r.id)))
}
