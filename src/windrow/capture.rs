//! Capture driver
//!
//! Drives the read → type → stitch loop across the whole file and invokes
//! the collaborator seams once per eligible timestamp. A timestamp `t` is
//! eligible only when both its full prior window `[t - prior_hop, t)` and its
//! full post window `[t + 1, t + post_hop + 1)` lie within the currently
//! materialized rows; the accumulator's leftover-carrying merge guarantees
//! that no eligible window is truncated at a block or partition edge.
//!
//! The delta/variable computation and the record formatting both live behind
//! traits: the driver hands row ranges over a typed matrix to a
//! [`DeltaCalculator`] and the resulting value triples to a [`CaptureSink`],
//! with no opinion on how either side does its work.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::config::{ReadMode, ScanConfig};
use super::error::{ScanError, ScanResult};
use super::matrix::TypedMatrix;
use super::reader::PartitionedReader;
use super::slide::{LeftoverTail, LoadStatus, SlideOutcome, SlidingWindow};

/// One computed value with its label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedValue {
    pub name: String,
    pub value: VarValue,
}

impl NamedValue {
    pub fn number(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value: VarValue::Number(value),
        }
    }

    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: VarValue::Text(value.into()),
        }
    }
}

/// Value payload of a [`NamedValue`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VarValue {
    Number(f64),
    Text(String),
}

/// The three row ranges computed for one captured timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSample {
    pub prior: Range<usize>,
    pub at: usize,
    pub post: Range<usize>,
}

/// One output record: the sample ranges plus the collaborator's values for
/// the before, at, and after windows
#[derive(Debug, Clone, PartialEq)]
pub struct WindowCapture {
    pub sample: WindowSample,
    pub before: Vec<NamedValue>,
    pub at: Vec<NamedValue>,
    pub after: Vec<NamedValue>,
}

/// Collaborator computing deltas or snapshots over a row range.
///
/// `prepare` is invoked once for every newly materialized matrix (after each
/// load and each successful slide), before any range is requested from it.
pub trait DeltaCalculator {
    fn prepare(&mut self, matrix: &TypedMatrix) -> ScanResult<()>;

    /// Values at a single timestamp row
    fn at(&self, matrix: &TypedMatrix, row: usize) -> Vec<NamedValue>;

    /// Values computed over the row range `[start, end)` under `op`
    fn delta(&self, matrix: &TypedMatrix, op: &str, start: usize, end: usize) -> Vec<NamedValue>;
}

/// Collaborator persisting or forwarding one capture record
pub trait CaptureSink {
    fn record(&mut self, capture: WindowCapture) -> ScanResult<()>;
}

/// Cancellation flag shared between the driver and its controller.
///
/// Checked between partitions and between block slides; an abort never
/// leaves a partially merged matrix as current.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Drives capture across the whole file, one partition at a time
pub struct CaptureDriver {
    window: SlidingWindow,
    prior_hop: usize,
    post_hop: usize,
    cancel: CancelToken,
}

impl CaptureDriver {
    /// Build a driver over an already opened reader; hop sizes come from the
    /// reader's configuration
    pub fn new(reader: PartitionedReader) -> Self {
        let prior_hop = reader.config().prior_hop;
        let post_hop = reader.config().post_hop;
        Self {
            window: SlidingWindow::new(reader),
            prior_hop,
            post_hop,
            cancel: CancelToken::new(),
        }
    }

    /// Open `path` and build a driver from `config`
    pub fn open(path: impl AsRef<std::path::Path>, config: ScanConfig) -> ScanResult<Self> {
        Ok(Self::new(PartitionedReader::open(path, config)?))
    }

    /// Token that aborts the scan when cancelled
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn window(&self) -> &SlidingWindow {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut SlidingWindow {
        &mut self.window
    }

    /// Scan the whole file, capturing every eligible timestamp.
    ///
    /// Returns the number of partitions processed. Stops cleanly on
    /// exhausted input or cancellation; a `HopTooLarge` slide outcome
    /// abandons the partition (already reported by the accumulator) and
    /// moves on to the next.
    pub fn capture_all<C, S>(
        &mut self,
        mode: ReadMode,
        op: &str,
        calculator: &mut C,
        sink: &mut S,
    ) -> ScanResult<usize>
    where
        C: DeltaCalculator,
        S: CaptureSink,
    {
        let mut partitions = 0usize;
        let mut tail: Option<LeftoverTail> = None;

        loop {
            if self.cancel.is_cancelled() {
                log::info!("capture cancelled after {} partitions", partitions);
                break;
            }

            match self.window.load_partition(mode, tail.take())? {
                LoadStatus::Exhausted(_) => break,
                LoadStatus::Loaded => {}
            }
            self.prepare_current(calculator)?;

            loop {
                {
                    let matrix = self.window.current().ok_or(ScanError::SlideBeforeLoad)?;
                    self.capture_matrix(matrix, op, calculator, sink)?;
                }

                if self.cancel.is_cancelled() {
                    break;
                }
                // carve prior + post rows: the rows whose windows straddle
                // the block edge need both sides materialized after the swap
                match self.window.slide_forward(self.prior_hop + self.post_hop)? {
                    SlideOutcome::Advanced => self.prepare_current(calculator)?,
                    SlideOutcome::PartitionDone(carried) => {
                        tail = carried;
                        break;
                    }
                    SlideOutcome::HopTooLarge { .. } => {
                        tail = None;
                        break;
                    }
                }
            }

            partitions += 1;
        }

        Ok(partitions)
    }

    fn prepare_current<C: DeltaCalculator>(&self, calculator: &mut C) -> ScanResult<()> {
        let matrix = self.window.current().ok_or(ScanError::SlideBeforeLoad)?;
        calculator.prepare(matrix)
    }

    /// Capture every eligible timestamp of one materialized matrix
    fn capture_matrix<C, S>(
        &self,
        matrix: &TypedMatrix,
        op: &str,
        calculator: &mut C,
        sink: &mut S,
    ) -> ScanResult<()>
    where
        C: DeltaCalculator,
        S: CaptureSink,
    {
        let rows = matrix.rows();
        let upper = rows.saturating_sub(self.post_hop);

        for t in self.prior_hop..upper {
            let sample = WindowSample {
                prior: (t - self.prior_hop)..t,
                at: t,
                post: (t + 1)..(t + self.post_hop + 1),
            };
            let before = calculator.delta(matrix, op, sample.prior.start, sample.prior.end);
            let after = calculator.delta(matrix, op, sample.post.start, sample.post.end);
            let at = calculator.at(matrix, t);

            sink.record(WindowCapture {
                sample,
                before,
                at,
                after,
            })?;
        }
        Ok(())
    }
}
