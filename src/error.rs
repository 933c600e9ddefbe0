// src/error.rs
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::schema::RecordId;

/// Error type for corpus generation and filtered reads.
#[derive(Debug, Error)]
pub enum Error {
    #[error(
        "requested ~{requested} rows, but only {universe} unique ids are possible; \
         lower the byte target or raise the id universe"
    )]
    CapacityExceeded { requested: usize, universe: RecordId },
    #[error("output directory {} already holds {existing} partition file(s); clear it first", dir.display())]
    OutputNotEmpty { dir: PathBuf, existing: usize },
    #[error("malformed record on line {line}: expected {expected} fields, found {found}")]
    MalformedRecord {
        line: u64,
        expected: usize,
        found: usize,
    },
    #[error("line {line}: id field {value:?} is not an integer")]
    DecodeError { line: u64, value: String },
    #[error("line {line}: timestamp {value:?} does not match the record layout")]
    InvalidTimestamp { line: u64, value: String },
    #[error("unknown category '{0}'")]
    UnknownCategory(String),
    #[error("schema has no column named '{0}'")]
    UnknownColumn(String),
    #[error("configuration error: {0}")]
    InvalidConfig(String),
    #[error("id allocator exhausted before all partitions were filled")]
    IdsExhausted,
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
