// src/lib.rs
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reproducible synthetic transaction corpora and filtered-read strategies
//!
//! This library provides:
//! - Byte-budgeted corpus generation with corpus-wide unique, shuffled ids
//! - Deterministic partitioning across many small files (seeded Xoshiro256++)
//! - Three interchangeable filtered readers over a gzip record stream
//! - A harness that runs every reader and checks they agree
//! - Merge/compress/load helpers for the generated corpus

// Core modules
pub mod catalog;
pub mod constants;
pub mod corpus;
pub mod error;
pub mod generator;
pub mod reader;
pub mod schema;

// Re-export main API
pub use catalog::Category;
pub use error::{Error, Result};
pub use generator::{
    generate_corpus, plan_partitions, CorpusGenerator, CorpusSummary, GeneratorConfig,
    IdAllocator, PartitionSummary, RecordSampler, RowEstimate,
};
pub use reader::{
    compare_strategies, open_gzip, FilteredRecordReader, MatchedRecord, Query, Strategy,
    StrategyComparison, StrategyOutcome,
};
pub use schema::{Record, RecordId, Schema};
