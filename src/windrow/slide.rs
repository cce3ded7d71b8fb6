//! Sliding-window accumulator
//!
//! Stitches consecutive typed matrices together so a prior/post window never
//! crosses a block or partition boundary. Between matrix swaps the trailing
//! `hop` rows of the current matrix are carved into a [`LeftoverTail`] and
//! prepended to the next matrix; the fixed order is carve → merge → clear.
//! The tail is an owned move-only value: merging consumes it, so a consumed
//! tail can never be reused, and the tail that outlives a partition is
//! returned to the caller to pass into the next load.

use super::config::ReadMode;
use super::error::{ScanError, ScanResult};
use super::infer;
use super::matrix::TypedMatrix;
use super::reader::PartitionedReader;

/// Rows carried from one matrix to the next; consumed exactly once
#[derive(Debug)]
pub struct LeftoverTail(TypedMatrix);

impl LeftoverTail {
    pub fn rows(&self) -> usize {
        self.0.rows()
    }

    fn into_matrix(self) -> TypedMatrix {
        self.0
    }
}

/// Result of loading a partition
#[derive(Debug)]
pub enum LoadStatus {
    /// First block projected and merged; sliding may begin
    Loaded,
    /// The reader reported exhausted input; any unconsumed tail is handed
    /// back untouched
    Exhausted(Option<LeftoverTail>),
}

/// Result of one slide step
#[derive(Debug)]
pub enum SlideOutcome {
    /// Advanced to the next block; the tail was merged in front of it
    Advanced,
    /// No blocks remain in this partition; the carved tail carries over to
    /// the next load
    PartitionDone(Option<LeftoverTail>),
    /// Configuration error: the hop is not smaller than the current
    /// matrix's row count. The partition is abandoned with no tail.
    HopTooLarge { hop: usize, rows: usize },
}

/// Sliding engine over one partitioned reader
pub struct SlidingWindow {
    reader: PartitionedReader,
    current: Option<TypedMatrix>,
    block_cursor: usize,
}

impl SlidingWindow {
    pub fn new(reader: PartitionedReader) -> Self {
        Self {
            reader,
            current: None,
            block_cursor: 0,
        }
    }

    pub fn reader(&self) -> &PartitionedReader {
        &self.reader
    }

    pub fn reader_mut(&mut self) -> &mut PartitionedReader {
        &mut self.reader
    }

    /// Matrix currently materialized, if any
    pub fn current(&self) -> Option<&TypedMatrix> {
        self.current.as_ref()
    }

    /// Read the next partition and materialize its first block, prepending
    /// `tail` (tail rows first). Resolves column types by inference on the
    /// freshly buffered partition when none are installed yet.
    pub fn load_partition(
        &mut self,
        mode: ReadMode,
        tail: Option<LeftoverTail>,
    ) -> ScanResult<LoadStatus> {
        let cells = self.reader.read_partition(mode)?;
        if cells == 0 {
            self.current = None;
            return Ok(LoadStatus::Exhausted(tail));
        }

        if self.reader.layout().is_none() {
            infer::infer_types(&mut self.reader)?;
        }

        let block = match self.reader.block_matrix(0) {
            Some(m) => m,
            None => {
                self.current = None;
                return Ok(LoadStatus::Exhausted(tail));
            }
        };

        let matrix = match tail {
            Some(tail) => {
                let mut merged = tail.into_matrix();
                merged.stack(block);
                merged
            }
            None => block,
        };

        self.current = Some(matrix);
        self.block_cursor = 1;
        Ok(LoadStatus::Loaded)
    }

    /// Advance to the next block of the current partition.
    ///
    /// Carves the trailing `hop` rows of the current matrix into a new tail,
    /// then merges it in front of the next block if one remains. The driver
    /// passes prior + post as the hop so both window sides survive the swap.
    /// Calling this with no matrix loaded is a caller error surfaced as
    /// [`ScanError::SlideBeforeLoad`].
    pub fn slide_forward(&mut self, hop: usize) -> ScanResult<SlideOutcome> {
        let current = self.current.as_ref().ok_or(ScanError::SlideBeforeLoad)?;
        let rows = current.rows();

        // checked against the current matrix only, not the whole remaining
        // partition
        if hop >= rows {
            log::warn!(
                "hop {} must be less than current row count {}; abandoning partition",
                hop,
                rows
            );
            return Ok(SlideOutcome::HopTooLarge { hop, rows });
        }

        let tail = LeftoverTail(current.tail(hop));

        if self.reader.blocks().len() <= self.block_cursor {
            return Ok(SlideOutcome::PartitionDone(Some(tail)));
        }

        let block = match self.reader.block_matrix(self.block_cursor) {
            Some(m) => m,
            None => return Ok(SlideOutcome::PartitionDone(Some(tail))),
        };

        let mut merged = tail.into_matrix();
        merged.stack(block);
        self.current = Some(merged);
        self.block_cursor += 1;
        Ok(SlideOutcome::Advanced)
    }
}
