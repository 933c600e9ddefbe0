// src/bin/txgen.rs
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command-line front end: generate, merge, compress, filter, compare

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use txgen::constants::*;
use txgen::corpus::{compress_file, load_file, merge_partitions, sample_query};
use txgen::{compare_strategies, generate_corpus, GeneratorConfig, Query, Schema, Strategy};

#[derive(Parser)]
#[command(name = "txgen", version, about = "Synthetic transaction corpora and filtered reads")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a byte-budgeted corpus of partition files
    Generate {
        #[arg(long, default_value = "generated_small_csvs")]
        out: PathBuf,
        #[arg(long, default_value_t = TARGET_TOTAL_BYTES)]
        target_bytes: u64,
        #[arg(long, default_value_t = NUM_PARTITIONS)]
        partitions: usize,
        #[arg(long, default_value_t = DEFAULT_SEED, conflicts_with = "no_seed")]
        seed: u64,
        /// Draw the seed from time + urandom (non-reproducible)
        #[arg(long)]
        no_seed: bool,
        #[arg(long, default_value_t = MIN_ITEMS_PER_ROW)]
        min_items: usize,
        #[arg(long, default_value_t = MAX_ITEMS_PER_ROW)]
        max_items: usize,
        #[arg(long, default_value_t = MAX_ID)]
        max_id: u32,
        #[arg(long, default_value_t = SAMPLE_ROWS)]
        sample_size: usize,
    },
    /// Concatenate partitions into one file
    Merge {
        #[arg(long, default_value = "generated_small_csvs")]
        dir: PathBuf,
        #[arg(long, default_value = "transactions.csv")]
        output: PathBuf,
    },
    /// Gzip a record file
    Compress {
        #[arg(long, default_value = "transactions.csv")]
        input: PathBuf,
        #[arg(long, default_value = "transactions.csv.gz")]
        output: PathBuf,
    },
    /// Run one reader strategy over a gzip stream
    Filter {
        #[arg(long, default_value = "transactions.csv.gz")]
        input: PathBuf,
        #[arg(long, default_value = "raw-scan")]
        strategy: Strategy,
        #[arg(long)]
        category: String,
        #[arg(long, value_delimiter = ',', num_args = 1.., required = true)]
        ids: Vec<u32>,
    },
    /// Run every reader strategy and check they agree
    Compare {
        #[arg(long, default_value = "transactions.csv.gz")]
        input: PathBuf,
        /// Category to match; derived from a random sample when omitted
        #[arg(long, requires = "ids")]
        category: Option<String>,
        #[arg(long, value_delimiter = ',', num_args = 1.., requires = "category")]
        ids: Vec<u32>,
        /// Uncompressed file to sample a query from
        #[arg(long, default_value = "transactions.csv")]
        sample_from: PathBuf,
        #[arg(long, default_value_t = 10)]
        sample: usize,
        #[arg(long, default_value_t = DEFAULT_SEED)]
        sample_seed: u64,
        #[arg(long)]
        max_threads: Option<usize>,
    },
}

fn main() -> anyhow::Result<()> {
    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();

    let cli = Cli::parse();
    let schema = Schema::transactions();

    match cli.command {
        Command::Generate {
            out,
            target_bytes,
            partitions,
            seed,
            no_seed,
            min_items,
            max_items,
            max_id,
            sample_size,
        } => {
            let config = GeneratorConfig {
                target_bytes,
                partitions,
                seed: (!no_seed).then_some(seed),
                min_items,
                max_items,
                max_id,
                sample_size,
            };
            let summary = generate_corpus(config, &out)?;
            if let Some(est) = summary.estimate {
                println!("Estimated avg bytes/row: {:.1}", est.avg_row_bytes);
            }
            println!("Seed:                    {}", summary.seed);
            println!("Total rows:              {}", summary.rows);
            println!("Partitions:              {}", summary.partitions.len());
            println!("Final size:              {:.1} MB", summary.total_bytes as f64 / 1_000_000.0);
        }
        Command::Merge { dir, output } => {
            let summary = merge_partitions(&dir, &output)?;
            println!(
                "Merged {} files ({} bytes) into {}",
                summary.files,
                summary.bytes,
                output.display()
            );
        }
        Command::Compress { input, output } => {
            let bytes = compress_file(&input, &output)?;
            println!("Wrote {} ({} bytes)", output.display(), bytes);
        }
        Command::Filter {
            input,
            strategy,
            category,
            ids,
        } => {
            let query = Query::new(category, ids);
            let records = strategy
                .reader(schema)
                .filter_path(&input, &query)
                .with_context(|| format!("{strategy} read of {}", input.display()))?;
            for rec in &records {
                println!("{} {:?}", rec.id, rec.fields);
            }
            println!("{}: {} records", strategy, records.len());
        }
        Command::Compare {
            input,
            category,
            ids,
            sample_from,
            sample,
            sample_seed,
            max_threads,
        } => {
            let query = match category {
                Some(category) => Query::new(category, ids),
                None => {
                    let records = load_file(&sample_from, &schema)?;
                    sample_query(&records, sample, sample_seed)
                        .with_context(|| format!("{} holds no records", sample_from.display()))?
                }
            };
            println!("Category: {}", query.category());
            println!("Ids:      {:?}", query.ids());

            let cmp = compare_strategies(&input, &schema, &query, max_threads)?;
            for outcome in &cmp.outcomes {
                println!("{:<12} {} records", outcome.strategy, outcome.records.len());
            }
            println!("Counts match:  {}", cmp.counts_agree());
            println!("All ids match: {}", cmp.ids_agree());
            if !cmp.records_agree() {
                anyhow::bail!("reader strategies disagree on {}", input.display());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_query_needs_both_category_and_ids() {
        assert!(Cli::try_parse_from(["txgen", "compare", "--ids", "1,2"]).is_err());
        assert!(Cli::try_parse_from(["txgen", "compare", "--category", "Toys"]).is_err());

        let cli = Cli::try_parse_from(["txgen", "compare", "--category", "Toys", "--ids", "1,2"])
            .unwrap();
        match cli.command {
            Command::Compare { category, ids, .. } => {
                assert_eq!(category.as_deref(), Some("Toys"));
                assert_eq!(ids, vec![1, 2]);
            }
            _ => panic!("expected compare"),
        }
        assert!(Cli::try_parse_from(["txgen", "compare"]).is_ok());
    }
}
