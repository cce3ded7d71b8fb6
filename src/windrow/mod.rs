//! Partitioned sliding-window scan core
//!
//! Turns a large, sorted, timestamp-indexed delimited file into a continuous
//! sliding-window view with bounded memory:
//!
//! - **Partitioned Reader**: owns the file cursor; yields bounded runs of
//!   raw blocks, optionally respecting timestamp-group boundaries
//! - **Type Inferencer**: predicts one type per column from a bounded random
//!   sample of the first partition
//! - **Typed Partition Matrix**: a block re-projected into per-type column
//!   containers, row order preserved
//! - **Window Accumulator**: stitches consecutive matrices with a carried
//!   leftover tail so no window is truncated at a block edge
//! - **Capture Driver**: walks the whole file, invoking the collaborator
//!   seams once per eligible timestamp
//!
//! Data flow: file → reader (raw blocks) → inferencer (column types, once)
//! → typed matrix → accumulator (merge with leftovers) → driver
//! (per-timestamp windows) → collaborator.

pub mod capture;
pub mod config;
pub mod error;
pub mod infer;
pub mod matrix;
pub mod reader;
pub mod schema;
pub mod slide;

// Re-export the core surface
pub use capture::{
    CancelToken, CaptureDriver, CaptureSink, DeltaCalculator, NamedValue, VarValue, WindowCapture,
    WindowSample,
};
pub use config::{ReadMode, SamplePolicy, ScanConfig};
pub use error::{ScanError, ScanResult};
pub use infer::{classify_cell, infer_types, SampleReport, TypeTally};
pub use matrix::TypedMatrix;
pub use reader::{PartitionedReader, RawBlock};
pub use schema::{ColumnSchema, ColumnType, TypeLayout, TypeMap};
pub use slide::{LeftoverTail, LoadStatus, SlideOutcome, SlidingWindow};
