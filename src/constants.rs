// src/constants.rs
//
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Default corpus size target (~1 GB on disk)
pub const TARGET_TOTAL_BYTES: u64 = 1_000_000_000;

/// Default number of partition files
pub const NUM_PARTITIONS: usize = 50_000;

/// Default seed; `None` in the config means time + urandom entropy
pub const DEFAULT_SEED: u64 = 42;

/// Item count bounds per record (upper bound is also capped by the pool size)
pub const MIN_ITEMS_PER_ROW: usize = 1;
pub const MAX_ITEMS_PER_ROW: usize = 12;

/// Size of the unique id universe `[0, MAX_ID)`
pub const MAX_ID: u32 = 10_000_000;

/// Rows drawn to calibrate the bytes-per-row estimate
pub const SAMPLE_ROWS: usize = 1000;

/// Timestamp window, unix seconds: [2010-01-01 00:00:00, 2020-01-01 00:00:00)
pub const TIMESTAMP_START: i64 = 1_262_304_000;
pub const TIMESTAMP_END: i64 = 1_577_836_800;

/// Serialized timestamp layout
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Partition file naming: `part_000001.csv`, ...
pub const PARTITION_PREFIX: &str = "part_";
pub const PARTITION_SUFFIX: &str = ".csv";
pub const PARTITION_INDEX_WIDTH: usize = 6;
