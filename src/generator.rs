// src/generator.rs
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Byte-budgeted, reproducible corpus generation
//!
//! Every random draw (calibration sample, id shuffle, category, timestamp,
//! item sample) goes through one [`RecordSampler`] seeded from the config, so
//! the same seed and config always produce byte-identical partitions.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, NaiveDateTime, Utc};
use rand::seq::{index, SliceRandom};
use rand::{Rng, RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::catalog::Category;
use crate::constants::*;
use crate::corpus::{list_partitions, partition_path};
use crate::error::{Error, Result};
use crate::schema::{id_width, Record, RecordId};

/// Configuration for corpus generation
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Approximate total corpus size in bytes
    pub target_bytes: u64,
    /// Number of partition files to write
    pub partitions: usize,
    /// Random seed for reproducible output (None = use time + urandom)
    pub seed: Option<u64>,
    /// Lower bound on items per record
    pub min_items: usize,
    /// Upper bound on items per record (also capped by the category pool size)
    pub max_items: usize,
    /// Id universe is `[0, max_id)`
    pub max_id: RecordId,
    /// Rows drawn to estimate mean bytes per row
    pub sample_size: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            target_bytes: TARGET_TOTAL_BYTES,
            partitions: NUM_PARTITIONS,
            seed: Some(DEFAULT_SEED),
            min_items: MIN_ITEMS_PER_ROW,
            max_items: MAX_ITEMS_PER_ROW,
            max_id: MAX_ID,
            sample_size: SAMPLE_ROWS,
        }
    }
}

impl GeneratorConfig {
    /// Reject configurations that can never produce a valid corpus
    pub fn validate(&self) -> Result<()> {
        if self.partitions == 0 {
            return Err(Error::InvalidConfig("partition count must be at least 1".into()));
        }
        if self.max_id == 0 {
            return Err(Error::InvalidConfig("id universe must not be empty".into()));
        }
        if self.sample_size == 0 {
            return Err(Error::InvalidConfig("calibration sample must not be empty".into()));
        }
        if self.min_items == 0 || self.min_items > self.max_items {
            return Err(Error::InvalidConfig(format!(
                "item bounds must satisfy 1 <= min ({}) <= max ({})",
                self.min_items, self.max_items
            )));
        }
        let smallest = Category::smallest_pool();
        if self.min_items > smallest {
            return Err(Error::InvalidConfig(format!(
                "min_items {} exceeds the smallest item pool ({})",
                self.min_items, smallest
            )));
        }
        Ok(())
    }
}

/// Seeded random context owning every draw made while generating
pub struct RecordSampler {
    rng: Xoshiro256PlusPlus,
    min_items: usize,
    max_items: usize,
}

impl RecordSampler {
    pub fn new(seed: u64, min_items: usize, max_items: usize) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            min_items,
            max_items,
        }
    }

    /// Uniform choice over the fixed category set
    pub fn category(&mut self) -> Category {
        Category::ALL[self.rng.random_range(0..Category::ALL.len())]
    }

    /// Uniform second in the historical window
    pub fn timestamp(&mut self) -> NaiveDateTime {
        let secs = self.rng.random_range(TIMESTAMP_START..TIMESTAMP_END);
        DateTime::<Utc>::from_timestamp(secs, 0)
            .unwrap_or_default()
            .naive_utc()
    }

    /// Items sampled without replacement from `category`'s pool
    pub fn items(&mut self, category: Category) -> Vec<String> {
        let pool = category.items();
        let hi = self.max_items.min(pool.len());
        let lo = self.min_items.min(hi);
        let k = self.rng.random_range(lo..=hi);
        index::sample(&mut self.rng, pool.len(), k)
            .into_iter()
            .map(|i| pool[i].to_string())
            .collect()
    }

    pub fn record(&mut self, id: RecordId) -> Record {
        let timestamp = self.timestamp();
        let category = self.category();
        let items = self.items(category);
        Record {
            id,
            timestamp,
            items,
            category,
        }
    }

    pub fn rng_mut(&mut self) -> &mut Xoshiro256PlusPlus {
        &mut self.rng
    }
}

/// One-shot sequence of unique, shuffled ids
///
/// The whole universe `[0, max_id)` is permuted before truncation, so for a
/// fixed seed and universe the allocation order is a prefix of the same
/// permutation whatever `count` is.
#[derive(Debug)]
pub struct IdAllocator {
    ids: std::vec::IntoIter<RecordId>,
}

impl IdAllocator {
    pub fn new<R: Rng + ?Sized>(max_id: RecordId, count: usize, rng: &mut R) -> Result<Self> {
        check_capacity(count, max_id)?;
        let mut universe: Vec<RecordId> = (0..max_id).collect();
        universe.shuffle(rng);
        universe.truncate(count);
        tracing::debug!("Allocated {} ids from a universe of {}", count, max_id);
        Ok(Self {
            ids: universe.into_iter(),
        })
    }

    /// Ids not yet handed out
    pub fn remaining(&self) -> usize {
        self.ids.len()
    }
}

impl Iterator for IdAllocator {
    type Item = RecordId;

    fn next(&mut self) -> Option<RecordId> {
        self.ids.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ids.size_hint()
    }
}

impl ExactSizeIterator for IdAllocator {}

fn check_capacity(requested: usize, universe: RecordId) -> Result<()> {
    if requested as u64 > universe as u64 {
        return Err(Error::CapacityExceeded { requested, universe });
    }
    Ok(())
}

/// Rows per partition: `total / partitions` each, plus one for the first
/// `total % partitions` partitions
pub fn plan_partitions(total_rows: usize, partitions: usize) -> Vec<usize> {
    if partitions == 0 {
        return Vec::new();
    }
    let base = total_rows / partitions;
    let remainder = total_rows - base * partitions;
    (0..partitions)
        .map(|i| base + usize::from(i < remainder))
        .collect()
}

/// Result of the calibration sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowEstimate {
    pub sample_rows: usize,
    pub avg_row_bytes: f64,
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSummary {
    /// 1-based partition number
    pub index: usize,
    pub path: PathBuf,
    pub rows: usize,
    pub bytes: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CorpusSummary {
    pub seed: u64,
    pub rows: usize,
    pub total_bytes: u64,
    pub estimate: Option<RowEstimate>,
    pub partitions: Vec<PartitionSummary>,
}

/// Stateful corpus generator (one random context per instance)
pub struct CorpusGenerator {
    config: GeneratorConfig,
    seed: u64,
    sampler: RecordSampler,
    id_width: usize,
}

impl CorpusGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        config.validate()?;

        // Use provided seed or generate entropy from time + urandom
        let seed = config.seed.unwrap_or_else(generate_call_entropy);
        let sampler = RecordSampler::new(seed, config.min_items, config.max_items);
        let id_width = id_width(config.max_id);

        tracing::info!(
            "Creating CorpusGenerator: target_bytes={}, partitions={}, max_id={}, seed={} ({})",
            config.target_bytes,
            config.partitions,
            config.max_id,
            seed,
            if config.seed.is_some() {
                "deterministic"
            } else {
                "non-deterministic"
            }
        );

        Ok(Self {
            config,
            seed,
            sampler,
            id_width,
        })
    }

    /// Effective seed (useful to replay a non-deterministic run)
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Estimate the row count that fills the byte budget
    ///
    /// Fails with [`Error::CapacityExceeded`] before any id shuffling or
    /// filesystem access when the estimate exceeds the id universe.
    pub fn estimate_rows(&mut self) -> Result<RowEstimate> {
        let n = self.config.sample_size;
        let max_id = self.config.max_id as usize;
        let sample_bytes: usize = (0..n)
            .map(|i| {
                let id = (i % max_id) as RecordId;
                self.sampler.record(id).to_line(self.id_width).len()
            })
            .sum();
        let avg_row_bytes = sample_bytes as f64 / n as f64;
        let rows = (self.config.target_bytes as f64 / avg_row_bytes).ceil() as usize;

        tracing::debug!(
            "Calibration: {} rows, {} bytes, avg {:.1} bytes/row -> {} rows",
            n,
            sample_bytes,
            avg_row_bytes,
            rows
        );

        check_capacity(rows, self.config.max_id)?;
        Ok(RowEstimate {
            sample_rows: n,
            avg_row_bytes,
            rows,
        })
    }

    /// Estimate the row count, then write the corpus into `dir`
    pub fn generate(&mut self, dir: impl AsRef<Path>) -> Result<CorpusSummary> {
        let estimate = self.estimate_rows()?;
        tracing::info!(
            "Estimated avg bytes/row: {:.1}, total rows needed: {}",
            estimate.avg_row_bytes,
            estimate.rows
        );
        let mut summary = self.write_rows(estimate.rows, dir)?;
        summary.estimate = Some(estimate);
        Ok(summary)
    }

    /// Write exactly `total_rows` records across the configured partitions
    pub fn write_rows(&mut self, total_rows: usize, dir: impl AsRef<Path>) -> Result<CorpusSummary> {
        let dir = dir.as_ref();
        check_capacity(total_rows, self.config.max_id)?;
        let counts = plan_partitions(total_rows, self.config.partitions);

        fs::create_dir_all(dir)?;
        let existing = list_partitions(dir)?;
        if !existing.is_empty() {
            return Err(Error::OutputNotEmpty {
                dir: dir.to_path_buf(),
                existing: existing.len(),
            });
        }

        tracing::info!(
            "Writing {} rows into {} partitions (base {}, {} with +1) under {}",
            total_rows,
            counts.len(),
            total_rows / counts.len().max(1),
            total_rows % counts.len().max(1),
            dir.display()
        );

        let mut ids = IdAllocator::new(self.config.max_id, total_rows, self.sampler.rng_mut())?;
        let mut partitions = Vec::with_capacity(counts.len());
        let mut total_bytes = 0u64;

        for (i, &rows) in counts.iter().enumerate() {
            let index = i + 1;
            let path = partition_path(dir, index);
            let file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)?;
            let mut out = BufWriter::new(file);
            let mut bytes = 0u64;
            for _ in 0..rows {
                let id = ids.next().ok_or(Error::IdsExhausted)?;
                let record = self.sampler.record(id);
                bytes += record.write_line(&mut out, self.id_width)? as u64;
            }
            out.flush()?;

            tracing::trace!("Partition {} flushed: {} rows, {} bytes", index, rows, bytes);
            total_bytes += bytes;
            partitions.push(PartitionSummary {
                index,
                path,
                rows,
                bytes,
            });
        }

        tracing::info!(
            "Corpus complete: {} rows, {:.1} MB",
            total_rows,
            total_bytes as f64 / 1_000_000.0
        );

        Ok(CorpusSummary {
            seed: self.seed,
            rows: total_rows,
            total_bytes,
            estimate: None,
            partitions,
        })
    }
}

/// Generate a full corpus with the given configuration
///
/// # Example
/// ```rust,no_run
/// use txgen::{generate_corpus, GeneratorConfig};
///
/// let config = GeneratorConfig {
///     target_bytes: 10 * 1024 * 1024,
///     partitions: 100,
///     ..Default::default()
/// };
/// let summary = generate_corpus(config, "generated_small_csvs")?;
/// println!("{} rows in {} files", summary.rows, summary.partitions.len());
/// # Ok::<(), txgen::Error>(())
/// ```
pub fn generate_corpus(config: GeneratorConfig, dir: impl AsRef<Path>) -> Result<CorpusSummary> {
    CorpusGenerator::new(config)?.generate(dir)
}

/// Generate per-call entropy from time + urandom
fn generate_call_entropy() -> u64 {
    let time_entropy = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;

    let urandom_entropy: u64 = {
        let mut rng = rand::rng();
        rng.next_u64()
    };

    time_entropy.wrapping_add(urandom_entropy)
}
