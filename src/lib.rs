//! # windrow
//!
//! Sliding-window capture engine for large, sorted, timestamp-indexed
//! tabular files. Files too big to hold in memory are read in bounded
//! partitions of raw blocks, column types are inferred from a random sample,
//! and a leftover-carrying accumulator stitches consecutive blocks together
//! so that every timestamp's prior and post windows stay intact across read
//! boundaries.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use windrow::windrow::{
//!     CaptureDriver, CaptureSink, DeltaCalculator, NamedValue, ReadMode, ScanConfig,
//!     ScanResult, TypedMatrix, WindowCapture,
//! };
//!
//! struct Snapshot;
//!
//! impl DeltaCalculator for Snapshot {
//!     fn prepare(&mut self, _matrix: &TypedMatrix) -> ScanResult<()> {
//!         Ok(())
//!     }
//!     fn at(&self, matrix: &TypedMatrix, row: usize) -> Vec<NamedValue> {
//!         matrix
//!             .float_labels()
//!             .iter()
//!             .enumerate()
//!             .map(|(i, l)| NamedValue::number(l.clone(), matrix.float_row(row)[i]))
//!             .collect()
//!     }
//!     fn delta(&self, matrix: &TypedMatrix, _op: &str, start: usize, _end: usize) -> Vec<NamedValue> {
//!         self.at(matrix, start)
//!     }
//! }
//!
//! struct Print;
//!
//! impl CaptureSink for Print {
//!     fn record(&mut self, capture: WindowCapture) -> ScanResult<()> {
//!         println!("captured t={}", capture.sample.at);
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> ScanResult<()> {
//!     let config = ScanConfig {
//!         prior_hop: 2,
//!         post_hop: 1,
//!         ..ScanConfig::default()
//!     };
//!     let mut driver = CaptureDriver::open("metrics.csv", config)?;
//!     let partitions =
//!         driver.capture_all(ReadMode::Grouped, "snapshot", &mut Snapshot, &mut Print)?;
//!     println!("processed {} partitions", partitions);
//!     Ok(())
//! }
//! ```

pub mod windrow;
