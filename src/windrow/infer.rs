//! Statistical column-type inference
//!
//! Samples unique (block, row, column) coordinates from a buffered partition
//! under a termination-bounded random search, classifies every cell of each
//! sampled row, and predicts one type per column with a threshold rule over
//! the tallies. Sampling cost is capped by a stall bound: when a run of
//! consecutive draws adds no new unique coordinate, the search stops even if
//! the target size was not reached, which keeps inference cheap on partitions
//! with little room for distinct coordinates.
//!
//! Classification of one coordinate is independent of every other, so the
//! workload splits across worker threads over disjoint coordinate subsets.
//! Each worker owns a local tally; the finalized tally is the additive merge
//! of the workers' results, never a shared mutable structure. A worker panic
//! surfaces after the join as [`ScanError::SamplerPanicked`].

use std::collections::HashSet;
use std::thread;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::config::ReadMode;
use super::error::{ScanError, ScanResult};
use super::reader::{PartitionedReader, RawBlock};
use super::schema::{ColumnType, TypeMap};

/// Stall-bound ceiling; partitions never get more slack than this
const STALL_CAP: u64 = 10_000_000_000;

/// How the sampling pass went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleReport {
    /// Unique coordinates actually collected
    pub unique: usize,
    /// Total random draws spent, including rejected duplicates
    pub attempts: u64,
    /// Whether the stall bound ended the search before the target was met
    pub stalled: bool,
}

/// Per-column classification counts for one type tally
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ClassCounts {
    text: u64,
    integer: u64,
    float: u64,
    vector: u64,
}

impl ClassCounts {
    fn add(&mut self, class: ColumnType) {
        match class {
            ColumnType::Text => self.text += 1,
            ColumnType::Integer => self.integer += 1,
            ColumnType::Float => self.float += 1,
            ColumnType::Vector => self.vector += 1,
            ColumnType::Undetermined => {}
        }
    }

    fn total(&self) -> u64 {
        self.text + self.integer + self.float + self.vector
    }

    /// Winning class and its count, ties broken in a fixed order so
    /// prediction is deterministic for a given tally
    fn leader(&self) -> (ColumnType, u64) {
        let candidates = [
            (ColumnType::Integer, self.integer),
            (ColumnType::Float, self.float),
            (ColumnType::Vector, self.vector),
            (ColumnType::Text, self.text),
        ];
        candidates
            .into_iter()
            .max_by_key(|&(_, count)| count)
            .unwrap_or((ColumnType::Undetermined, 0))
    }
}

/// Immutable-once-finalized classification tally, one slot per column.
///
/// Built from per-worker local accumulators merged by simple addition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeTally {
    columns: Vec<ClassCounts>,
}

impl TypeTally {
    pub fn new(column_count: usize) -> Self {
        Self {
            columns: vec![ClassCounts::default(); column_count],
        }
    }

    fn add(&mut self, column: usize, class: ColumnType) {
        if let Some(counts) = self.columns.get_mut(column) {
            counts.add(class);
        }
    }

    /// Fold another worker's counts into this one
    pub fn merge(&mut self, other: &TypeTally) {
        debug_assert_eq!(self.columns.len(), other.columns.len());
        for (mine, theirs) in self.columns.iter_mut().zip(&other.columns) {
            mine.text += theirs.text;
            mine.integer += theirs.integer;
            mine.float += theirs.float;
            mine.vector += theirs.vector;
        }
    }

    /// Predict one type per column: a class wins when its share of the
    /// column's observations reaches `threshold`, otherwise undetermined
    pub fn predict(&self, threshold: f64) -> TypeMap {
        let mut types = std::collections::HashMap::with_capacity(self.columns.len());
        for (column, counts) in self.columns.iter().enumerate() {
            let total = counts.total();
            let predicted = if total == 0 {
                ColumnType::Undetermined
            } else {
                let (class, count) = counts.leader();
                if count as f64 / total as f64 >= threshold {
                    class
                } else {
                    ColumnType::Undetermined
                }
            };
            types.insert(column, predicted);
        }
        TypeMap::new(types)
    }
}

/// Classify a single raw cell value.
///
/// Integer and float parses are attempted first; a bracketed list whose
/// elements all parse as numbers classifies as a vector; anything else is
/// text. Never returns `Undetermined` — that is a prediction outcome, not an
/// observation.
pub fn classify_cell(cell: &str) -> ColumnType {
    let trimmed = cell.trim();
    if trimmed.parse::<i64>().is_ok() {
        return ColumnType::Integer;
    }
    if trimmed.parse::<f64>().is_ok() {
        return ColumnType::Float;
    }
    if let Some(inner) = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    {
        let inner = inner.trim();
        if inner.is_empty() || inner.split(',').all(|e| e.trim().parse::<f64>().is_ok()) {
            return ColumnType::Vector;
        }
    }
    ColumnType::Text
}

/// Infer column types from the reader's buffered partition and install the
/// resulting map on the reader.
///
/// Reads one exact-mode partition first when none is buffered; fails with
/// [`ScanError::NoPartition`] when the file holds no data at all. The
/// resolved map is cached on the reader for the rest of the file's scan.
pub fn infer_types(reader: &mut PartitionedReader) -> ScanResult<SampleReport> {
    if reader.blocks().is_empty() {
        reader.read_partition(ReadMode::Exact)?;
    }
    if reader.blocks().is_empty() {
        return Err(ScanError::NoPartition);
    }

    let policy = reader.config().sampling.clone();
    let columns = reader.schema().len();
    let target = policy.target_sample_size(reader.partition_cells());

    let mut rng = match policy.seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_entropy(),
    };

    let (coordinates, report) = sample_coordinates(reader.blocks(), columns, target, &mut rng);
    let tally = classify_sampled_rows(reader.blocks(), columns, &coordinates, policy.workers)?;
    let types = tally.predict(policy.prediction_threshold);

    log::debug!(
        "inferred types from {} coordinates ({} attempts, stalled: {})",
        report.unique,
        report.attempts,
        report.stalled
    );
    reader.set_types(types);
    Ok(report)
}

/// Bounded rejection sampling of unique coordinates.
///
/// Stops at `target` unique coordinates or after a stall: a run of
/// consecutive draws, `blocks * 100` long (capped), that adds nothing new.
fn sample_coordinates(
    blocks: &[RawBlock],
    columns: usize,
    target: u64,
    rng: &mut SmallRng,
) -> (Vec<(usize, usize, usize)>, SampleReport) {
    let stall_bound = (blocks.len() as u64 * 100).min(STALL_CAP);

    let mut seen: HashSet<(usize, usize, usize)> = HashSet::new();
    let mut attempts = 0u64;
    let mut stall_run = 0u64;
    let mut stalled = false;

    while (seen.len() as u64) < target {
        if stall_run >= stall_bound {
            stalled = true;
            break;
        }

        let block = rng.gen_range(0..blocks.len());
        let row = rng.gen_range(0..blocks[block].len());
        let column = rng.gen_range(0..columns);
        attempts += 1;

        if seen.insert((block, row, column)) {
            stall_run = 0;
        } else {
            stall_run += 1;
        }
    }

    let report = SampleReport {
        unique: seen.len(),
        attempts,
        stalled,
    };
    (seen.into_iter().collect(), report)
}

/// Classify every column of every sampled row, split across workers over
/// disjoint coordinate subsets with per-worker tallies merged at the end
fn classify_sampled_rows(
    blocks: &[RawBlock],
    columns: usize,
    coordinates: &[(usize, usize, usize)],
    workers: usize,
) -> ScanResult<TypeTally> {
    let workers = workers.max(1);
    let chunk_size = coordinates.len().div_ceil(workers).max(1);

    let mut merged = TypeTally::new(columns);
    let worker_tallies = thread::scope(|scope| -> ScanResult<Vec<TypeTally>> {
        let handles: Vec<_> = coordinates
            .chunks(chunk_size)
            .map(|chunk| scope.spawn(move || classify_chunk(blocks, columns, chunk)))
            .collect();

        let mut tallies = Vec::with_capacity(handles.len());
        for handle in handles {
            tallies.push(handle.join().map_err(|_| ScanError::SamplerPanicked)?);
        }
        Ok(tallies)
    })?;

    for tally in &worker_tallies {
        merged.merge(tally);
    }
    Ok(merged)
}

fn classify_chunk(
    blocks: &[RawBlock],
    columns: usize,
    coordinates: &[(usize, usize, usize)],
) -> TypeTally {
    let mut tally = TypeTally::new(columns);
    for &(block, row, _) in coordinates {
        // the sampled column picks the row; every cell of that row feeds
        // the tally
        for column in 0..columns {
            if let Some(cell) = blocks[block].cell(row, column) {
                tally.add(column, classify_cell(cell));
            }
        }
    }
    tally
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_of(rows: &[&[&str]]) -> RawBlock {
        let mut b = RawBlock::new();
        for row in rows {
            b.push_row(row.iter().map(|s| s.to_string()).collect());
        }
        b
    }

    #[test]
    fn test_classify_cell() {
        assert_eq!(classify_cell("42"), ColumnType::Integer);
        assert_eq!(classify_cell("-7"), ColumnType::Integer);
        assert_eq!(classify_cell("3.25"), ColumnType::Float);
        assert_eq!(classify_cell("1e-3"), ColumnType::Float);
        assert_eq!(classify_cell("[1,2.5,3]"), ColumnType::Vector);
        assert_eq!(classify_cell("[]"), ColumnType::Vector);
        assert_eq!(classify_cell("[a,b]"), ColumnType::Text);
        assert_eq!(classify_cell("hello"), ColumnType::Text);
    }

    #[test]
    fn test_tally_threshold_prediction() {
        let mut tally = TypeTally::new(2);
        // column 0: 9 ints, 1 text -> integer at 0.9
        for _ in 0..9 {
            tally.add(0, ColumnType::Integer);
        }
        tally.add(0, ColumnType::Text);
        // column 1: evenly split -> undetermined
        for _ in 0..5 {
            tally.add(1, ColumnType::Float);
            tally.add(1, ColumnType::Text);
        }

        let types = tally.predict(0.9);
        assert_eq!(types.get(0), ColumnType::Integer);
        assert_eq!(types.get(1), ColumnType::Undetermined);
    }

    #[test]
    fn test_tally_merge_is_additive() {
        let mut a = TypeTally::new(1);
        let mut b = TypeTally::new(1);
        for _ in 0..3 {
            a.add(0, ColumnType::Float);
            b.add(0, ColumnType::Float);
        }
        b.add(0, ColumnType::Text);

        a.merge(&b);
        // 6 floats vs 1 text: float wins at 6/7
        assert_eq!(a.predict(0.8).get(0), ColumnType::Float);
        assert_eq!(a.predict(0.95).get(0), ColumnType::Undetermined);
    }

    #[test]
    fn test_sampling_terminates_on_tiny_partition() {
        // one block, one row, two columns: only 2 distinct coordinates exist
        let blocks = vec![block_of(&[&["1", "x"]])];
        let mut rng = SmallRng::seed_from_u64(7);

        let (coords, report) = sample_coordinates(&blocks, 2, 1_000, &mut rng);
        assert!(coords.len() <= 2);
        // stall bound for one block is 100 consecutive duplicate draws
        assert!(report.stalled);
        assert!(report.attempts <= coords.len() as u64 + 100 * (coords.len() as u64 + 1));
    }

    #[test]
    fn test_sampling_reaches_target_when_room_exists() {
        let rows: Vec<Vec<&str>> = (0..50).map(|_| vec!["1", "2.0", "x"]).collect();
        let row_refs: Vec<&[&str]> = rows.iter().map(|r| r.as_slice()).collect();
        let blocks = vec![block_of(&row_refs)];
        let mut rng = SmallRng::seed_from_u64(7);

        let (coords, report) = sample_coordinates(&blocks, 3, 100, &mut rng);
        assert_eq!(coords.len(), 100);
        assert!(!report.stalled);
        assert!(report.attempts >= 100);
    }

    #[test]
    fn test_prediction_is_idempotent_for_fixed_sample() {
        let rows: Vec<Vec<&str>> = (0..20).map(|_| vec!["3", "2.5", "abc"]).collect();
        let row_refs: Vec<&[&str]> = rows.iter().map(|r| r.as_slice()).collect();
        let blocks = vec![block_of(&row_refs)];

        let mut rng = SmallRng::seed_from_u64(11);
        let (coords, _) = sample_coordinates(&blocks, 3, 30, &mut rng);

        let first = classify_sampled_rows(&blocks, 3, &coords, 2).unwrap();
        let second = classify_sampled_rows(&blocks, 3, &coords, 4).unwrap();
        assert_eq!(first.predict(0.9), second.predict(0.9));
        assert_eq!(first, second);
    }

    #[test]
    fn test_worker_split_matches_single_worker() {
        let rows: Vec<Vec<&str>> = (0..40)
            .map(|i| {
                if i % 2 == 0 {
                    vec!["1", "2.0", "[1,2]"]
                } else {
                    vec!["2", "3.0", "[3]"]
                }
            })
            .collect();
        let row_refs: Vec<&[&str]> = rows.iter().map(|r| r.as_slice()).collect();
        let blocks = vec![block_of(&row_refs)];

        let mut rng = SmallRng::seed_from_u64(3);
        let (coords, _) = sample_coordinates(&blocks, 3, 60, &mut rng);

        let solo = classify_sampled_rows(&blocks, 3, &coords, 1).unwrap();
        let split = classify_sampled_rows(&blocks, 3, &coords, 3).unwrap();
        assert_eq!(solo, split);

        let types = solo.predict(0.9);
        assert_eq!(types.get(0), ColumnType::Integer);
        assert_eq!(types.get(1), ColumnType::Float);
        assert_eq!(types.get(2), ColumnType::Vector);
    }
}
