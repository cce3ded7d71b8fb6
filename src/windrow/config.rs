//! Scan configuration
//!
//! All tunables the core consumes live here: block and partition sizing, the
//! read mode, the sampling policy for type inference, and the window hop
//! sizes. Configs are plain structs with defaults, and can also be assembled
//! from a flat string property map (`scan.block.rows`, `scan.read.mode`, ...)
//! for callers that thread configuration through generic key/value channels.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::{ScanError, ScanResult};

/// Strategy for ending a raw block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ReadMode {
    /// Stop a block strictly at the row limit regardless of content
    #[default]
    Exact,
    /// After filling a block, keep reading while rows share the last row's
    /// timestamp, so a block never ends mid-group
    Grouped,
}

impl fmt::Display for ReadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadMode::Exact => write!(f, "exact"),
            ReadMode::Grouped => write!(f, "grouped"),
        }
    }
}

impl FromStr for ReadMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exact" => Ok(ReadMode::Exact),
            "grouped" | "full" => Ok(ReadMode::Grouped),
            _ => Err(format!("unknown read mode: {}", s)),
        }
    }
}

/// Sampling policy for type inference
///
/// The target sample size is the whole partition when it is small, otherwise
/// the larger of `sample_floor` and `sample_fraction` of the cell count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplePolicy {
    /// Partitions below this many cells are sampled exhaustively
    pub small_partition_cutoff: u64,
    /// Minimum sample size for large partitions
    pub sample_floor: u64,
    /// Fraction of cells sampled for large partitions
    pub sample_fraction: f64,
    /// A type must cover at least this fraction of a column's observations
    /// to win prediction; otherwise the column is undetermined
    pub prediction_threshold: f64,
    /// Worker threads classifying disjoint coordinate subsets
    pub workers: usize,
    /// Fixed RNG seed for reproducible sampling; `None` seeds from entropy
    pub seed: Option<u64>,
}

impl Default for SamplePolicy {
    fn default() -> Self {
        Self {
            small_partition_cutoff: 1_000,
            sample_floor: 10_000,
            sample_fraction: 0.1,
            prediction_threshold: 0.9,
            workers: 1,
            seed: None,
        }
    }
}

impl SamplePolicy {
    /// Target number of unique coordinates for a partition of `cells` cells
    pub fn target_sample_size(&self, cells: u64) -> u64 {
        if cells < self.small_partition_cutoff {
            cells
        } else {
            let fractional = (cells as f64 * self.sample_fraction) as u64;
            fractional.max(self.sample_floor)
        }
    }
}

/// Configuration for a partitioned sliding-window scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Maximum rows per raw block (grouped mode may exceed this to finish a
    /// timestamp run)
    pub block_row_limit: usize,
    /// Cumulative cell count at which a partition stops accepting blocks
    pub partition_cell_budget: u64,
    /// Block boundary strategy
    pub read_mode: ReadMode,
    /// Name of the timestamp column used by grouped reads
    pub timestamp_column: String,
    /// Rows in the window before a captured timestamp
    pub prior_hop: usize,
    /// Rows in the window after a captured timestamp
    pub post_hop: usize,
    /// Type-inference sampling policy
    pub sampling: SamplePolicy,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            block_row_limit: 1_000,
            partition_cell_budget: 10_000,
            read_mode: ReadMode::default(),
            timestamp_column: "time".to_string(),
            prior_hop: 1,
            post_hop: 1,
            sampling: SamplePolicy::default(),
        }
    }
}

impl ScanConfig {
    /// Build a config from a flat string property map.
    ///
    /// Unknown keys are ignored; known keys with unusable values fail with
    /// [`ScanError::InvalidProperty`].
    pub fn from_properties(props: &HashMap<String, String>) -> ScanResult<Self> {
        let mut config = Self::default();

        if let Some(v) = props.get("scan.block.rows") {
            config.block_row_limit = parse_prop("scan.block.rows", v)?;
        }
        if let Some(v) = props.get("scan.partition.cells") {
            config.partition_cell_budget = parse_prop("scan.partition.cells", v)?;
        }
        if let Some(v) = props.get("scan.read.mode") {
            config.read_mode = v.parse().map_err(|reason| ScanError::InvalidProperty {
                key: "scan.read.mode".to_string(),
                reason,
            })?;
        }
        if let Some(v) = props.get("scan.timestamp.column") {
            config.timestamp_column = v.clone();
        }
        if let Some(v) = props.get("scan.prior.hop") {
            config.prior_hop = parse_prop("scan.prior.hop", v)?;
        }
        if let Some(v) = props.get("scan.post.hop") {
            config.post_hop = parse_prop("scan.post.hop", v)?;
        }
        if let Some(v) = props.get("scan.sample.threshold") {
            config.sampling.prediction_threshold = parse_prop("scan.sample.threshold", v)?;
        }
        if let Some(v) = props.get("scan.sample.workers") {
            config.sampling.workers = parse_prop::<usize>("scan.sample.workers", v)?.max(1);
        }
        if let Some(v) = props.get("scan.sample.seed") {
            config.sampling.seed = Some(parse_prop("scan.sample.seed", v)?);
        }

        Ok(config)
    }
}

fn parse_prop<T: FromStr>(key: &str, value: &str) -> ScanResult<T>
where
    T::Err: fmt::Display,
{
    value.parse().map_err(|e: T::Err| ScanError::InvalidProperty {
        key: key.to_string(),
        reason: e.to_string(),
    })
}
