//! Partitioned file reader
//!
//! Owns the file cursor and turns raw delimited text into bounded raw blocks.
//! A partition is a run of blocks read in one call, stopped when the
//! cumulative cell count reaches the configured budget or the file ends.
//! End of file is a normal terminal signal carried in the return value, never
//! an error; malformed rows are a hard error that aborts the partition.
//!
//! Grouped read mode extends a full block while subsequent rows share the
//! last row's timestamp, so a same-timestamp run never straddles a block
//! boundary. The row that first breaks the run is pushed back and becomes the
//! first row of the next block.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::config::{ReadMode, ScanConfig};
use super::error::{ScanError, ScanResult};
use super::matrix::TypedMatrix;
use super::schema::{ColumnSchema, ColumnType, TypeLayout, TypeMap};

/// Ordered batch of raw rows; the atomic unit of I/O
#[derive(Debug, Clone, Default)]
pub struct RawBlock {
    rows: Vec<Vec<String>>,
}

impl RawBlock {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row).and_then(|r| r.get(column)).map(String::as_str)
    }
}

/// Outcome of one block read
struct BlockRead {
    block: RawBlock,
    cells: u64,
    eof: bool,
}

/// Reader that produces bounded partitions of raw blocks from one file
#[derive(Debug)]
pub struct PartitionedReader {
    path: String,
    reader: BufReader<File>,
    schema: ColumnSchema,
    timestamp_position: Option<usize>,
    config: ScanConfig,
    line_number: usize,
    pending_row: Option<Vec<String>>,
    exhausted: bool,

    blocks: Vec<RawBlock>,
    partition_cells: u64,

    types: Option<TypeMap>,
    layout: Option<TypeLayout>,
}

impl PartitionedReader {
    /// Open a file and parse its header row as the column schema
    pub fn open(path: impl AsRef<Path>, config: ScanConfig) -> ScanResult<Self> {
        let path_str = path.as_ref().display().to_string();
        let file = File::open(path.as_ref()).map_err(|e| ScanError::io(&path_str, e))?;
        let mut reader = BufReader::new(file);

        let mut header = String::new();
        let read = reader
            .read_line(&mut header)
            .map_err(|e| ScanError::io(&path_str, e))?;
        if read == 0 || header.trim().is_empty() {
            return Err(ScanError::MalformedHeader { path: path_str });
        }

        let names = parse_delimited_fields(header.trim());
        if names.iter().all(|n| n.is_empty()) {
            return Err(ScanError::MalformedHeader { path: path_str });
        }

        let schema = ColumnSchema::new(names);
        let timestamp_position = schema.position(&config.timestamp_column);

        Ok(Self {
            path: path_str,
            reader,
            schema,
            timestamp_position,
            config,
            line_number: 1,
            pending_row: None,
            exhausted: false,
            blocks: Vec::new(),
            partition_cells: 0,
            types: None,
            layout: None,
        })
    }

    pub fn schema(&self) -> &ColumnSchema {
        &self.schema
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Blocks buffered by the most recent `read_partition`
    pub fn blocks(&self) -> &[RawBlock] {
        &self.blocks
    }

    pub fn block(&self, index: usize) -> Option<&RawBlock> {
        self.blocks.get(index)
    }

    /// Cumulative cell count of the buffered partition
    pub fn partition_cells(&self) -> u64 {
        self.partition_cells
    }

    /// Column types resolved for this file, if any
    pub fn types(&self) -> Option<&TypeMap> {
        self.types.as_ref()
    }

    pub fn layout(&self) -> Option<&TypeLayout> {
        self.layout.as_ref()
    }

    /// Install a resolved type map; assigned once and reused for every later
    /// read of this file
    pub fn set_types(&mut self, types: TypeMap) {
        self.layout = Some(TypeLayout::build(&self.schema, &types));
        self.types = Some(types);
    }

    /// Install column types from a name-keyed map, skipping inference.
    ///
    /// Fails with [`ScanError::MissingTypeMapping`] when any schema column is
    /// absent from the supplied map.
    pub fn set_manual_types(
        &mut self,
        by_name: &std::collections::HashMap<String, ColumnType>,
    ) -> ScanResult<()> {
        let types = TypeMap::from_manual(&self.schema, by_name)?;
        self.set_types(types);
        Ok(())
    }

    /// Project one buffered block through the resolved type layout.
    ///
    /// Returns `None` when the index is past the buffered partition or when
    /// no types have been resolved yet.
    pub fn block_matrix(&self, index: usize) -> Option<TypedMatrix> {
        let layout = self.layout.as_ref()?;
        let block = self.blocks.get(index)?;
        Some(TypedMatrix::from_block(block, layout))
    }

    /// Read one partition's worth of blocks from the current cursor.
    ///
    /// Returns the total cell count read; 0 signals exhausted input.
    pub fn read_partition(&mut self, mode: ReadMode) -> ScanResult<u64> {
        self.blocks = Vec::new();
        self.partition_cells = 0;

        loop {
            let read = match mode {
                ReadMode::Exact => self.read_block(self.config.block_row_limit)?,
                ReadMode::Grouped => self.read_block_grouped(self.config.block_row_limit)?,
            };

            self.partition_cells += read.cells;
            if !read.block.is_empty() {
                self.blocks.push(read.block);
            }
            if read.eof {
                break;
            }
            if self.partition_cells >= self.config.partition_cell_budget {
                break;
            }
        }

        log::debug!(
            "read partition: {} blocks, {} cells from '{}'",
            self.blocks.len(),
            self.partition_cells,
            self.path
        );
        Ok(self.partition_cells)
    }

    /// Read the next data row, honoring the pushback slot.
    ///
    /// Blank lines are skipped; a row whose width differs from the schema is
    /// a hard error.
    fn read_row(&mut self) -> ScanResult<Option<Vec<String>>> {
        if let Some(row) = self.pending_row.take() {
            return Ok(Some(row));
        }
        if self.exhausted {
            return Ok(None);
        }

        loop {
            let mut line = String::new();
            let read = self
                .reader
                .read_line(&mut line)
                .map_err(|e| ScanError::io(&self.path, e))?;
            if read == 0 {
                self.exhausted = true;
                return Ok(None);
            }
            self.line_number += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let cells = parse_delimited_fields(trimmed);
            if cells.len() != self.schema.len() {
                return Err(ScanError::MalformedRow {
                    line: self.line_number,
                    expected: self.schema.len(),
                    found: cells.len(),
                });
            }
            return Ok(Some(cells));
        }
    }

    /// Read a block of at most `limit` rows at the current cursor
    fn read_block(&mut self, limit: usize) -> ScanResult<BlockRead> {
        let mut block = RawBlock::new();
        let mut cells = 0u64;

        for _ in 0..limit {
            match self.read_row()? {
                Some(row) => {
                    block.push_row(row);
                    cells += self.schema.len() as u64;
                }
                None => {
                    return Ok(BlockRead {
                        block,
                        cells,
                        eof: true,
                    })
                }
            }
        }

        Ok(BlockRead {
            block,
            cells,
            eof: false,
        })
    }

    /// Read a block, then keep absorbing rows while they share the last
    /// row's timestamp
    fn read_block_grouped(&mut self, limit: usize) -> ScanResult<BlockRead> {
        let mut read = self.read_block(limit)?;
        if read.eof || read.block.is_empty() {
            return Ok(read);
        }

        let ts_col = self.timestamp_position()?;
        let last_row = read.block.len() - 1;
        let run_ts = self.parse_timestamp(read.block.cell(last_row, ts_col).unwrap_or(""))?;

        loop {
            match self.read_row()? {
                Some(row) => {
                    let ts = self.parse_timestamp(&row[ts_col])?;
                    if ts != run_ts {
                        // first row of the next group; push back for the next block
                        self.pending_row = Some(row);
                        break;
                    }
                    read.block.push_row(row);
                    read.cells += self.schema.len() as u64;
                }
                None => {
                    read.eof = true;
                    break;
                }
            }
        }

        Ok(read)
    }

    fn timestamp_position(&self) -> ScanResult<usize> {
        self.timestamp_position
            .ok_or_else(|| ScanError::TimestampColumnMissing {
                column: self.config.timestamp_column.clone(),
            })
    }

    fn parse_timestamp(&self, value: &str) -> ScanResult<i64> {
        value
            .parse::<i64>()
            .map_err(|_| ScanError::MalformedTimestamp {
                line: self.line_number,
                column: self.config.timestamp_column.clone(),
                value: value.to_string(),
            })
    }
}

/// RFC 4180 style field splitting: quoted fields, doubled-quote escapes,
/// whitespace trimmed around each field
pub(crate) fn parse_delimited_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes {
                    if chars.peek() == Some(&'"') {
                        current.push('"');
                        chars.next();
                    } else {
                        in_quotes = false;
                    }
                } else {
                    in_quotes = true;
                }
            }
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            c => current.push(c),
        }
    }
    fields.push(current.trim().to_string());

    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn fixture(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn config(block_rows: usize, partition_cells: u64) -> ScanConfig {
        ScanConfig {
            block_row_limit: block_rows,
            partition_cell_budget: partition_cells,
            ..ScanConfig::default()
        }
    }

    #[test]
    fn test_header_parsed_on_open() {
        let file = fixture("time,a,b\n0,1.0,x\n");
        let reader = PartitionedReader::open(file.path(), ScanConfig::default()).unwrap();
        assert_eq!(reader.schema().names(), &["time", "a", "b"]);
        // readers show up in error paths and test failure output
        assert!(format!("{:?}", reader).contains("PartitionedReader"));
    }

    #[test]
    fn test_empty_file_is_malformed_header() {
        let file = fixture("");
        let err = PartitionedReader::open(file.path(), ScanConfig::default()).unwrap_err();
        assert!(matches!(err, ScanError::MalformedHeader { .. }));
    }

    #[test]
    fn test_exact_partition_blocks_and_cells() {
        let mut data = String::from("time,a,b\n");
        for t in 0..10 {
            data.push_str(&format!("{},{},{}\n", t, t * 2, t * 3));
        }
        let file = fixture(&data);

        let mut reader = PartitionedReader::open(file.path(), config(4, 100)).unwrap();
        let cells = reader.read_partition(ReadMode::Exact).unwrap();

        // 10 rows x 3 columns
        assert_eq!(cells, 30);
        // blocks of 4, 4, 2
        assert_eq!(reader.blocks().len(), 3);
        assert_eq!(reader.block(0).unwrap().len(), 4);
        assert_eq!(reader.block(1).unwrap().len(), 4);
        assert_eq!(reader.block(2).unwrap().len(), 2);
    }

    #[test]
    fn test_partition_stops_at_cell_budget() {
        let mut data = String::from("time,a,b\n");
        for t in 0..100 {
            data.push_str(&format!("{},{},{}\n", t, t, t));
        }
        let file = fixture(&data);

        // budget of 30 cells = 10 rows; blocks of 5 rows = 15 cells each
        let mut reader = PartitionedReader::open(file.path(), config(5, 30)).unwrap();
        let cells = reader.read_partition(ReadMode::Exact).unwrap();
        assert_eq!(cells, 30);
        assert_eq!(reader.blocks().len(), 2);

        // the next partition resumes where the last stopped
        let cells = reader.read_partition(ReadMode::Exact).unwrap();
        assert_eq!(cells, 30);
        assert_eq!(reader.block(0).unwrap().cell(0, 0), Some("10"));
    }

    #[test]
    fn test_exhausted_reader_returns_zero() {
        let file = fixture("time,a\n0,1\n1,2\n");
        let mut reader = PartitionedReader::open(file.path(), config(10, 100)).unwrap();
        assert_eq!(reader.read_partition(ReadMode::Exact).unwrap(), 4);
        assert_eq!(reader.read_partition(ReadMode::Exact).unwrap(), 0);
        assert!(reader.blocks().is_empty());
    }

    #[test]
    fn test_malformed_row_aborts_partition() {
        let file = fixture("time,a,b\n0,1,2\n1,2\n");
        let mut reader = PartitionedReader::open(file.path(), config(10, 100)).unwrap();
        let err = reader.read_partition(ReadMode::Exact).unwrap_err();
        assert!(matches!(
            err,
            ScanError::MalformedRow {
                line: 3,
                expected: 3,
                found: 2
            }
        ));
    }

    #[test]
    fn test_grouped_block_never_splits_timestamp_run() {
        // timestamp runs: 0 0 0, 1 1, 2 2 2 2
        let file = fixture("time,a\n0,a\n0,b\n0,c\n1,d\n1,e\n2,f\n2,g\n2,h\n2,i\n");
        let mut reader = PartitionedReader::open(file.path(), config(2, 100)).unwrap();
        reader.read_partition(ReadMode::Grouped).unwrap();

        // block 1 fills at 2 rows then extends to the end of run 0;
        // block 2 holds run 1; block 3 extends through run 2
        let runs: Vec<Vec<&str>> = reader
            .blocks()
            .iter()
            .map(|b| b.rows().iter().map(|r| r[0].as_str()).collect())
            .collect();
        assert_eq!(runs[0], vec!["0", "0", "0"]);
        assert_eq!(runs[1], vec!["1", "1"]);
        assert_eq!(runs[2], vec!["2", "2", "2", "2"]);
    }

    #[test]
    fn test_grouped_requires_integer_timestamps() {
        let file = fixture("time,a\n0,x\n0,y\nnoon,z\n");
        let mut reader = PartitionedReader::open(file.path(), config(2, 100)).unwrap();
        let err = reader.read_partition(ReadMode::Grouped).unwrap_err();
        assert!(matches!(err, ScanError::MalformedTimestamp { .. }));
    }

    #[test]
    fn test_grouped_missing_timestamp_column() {
        let file = fixture("when,a\n0,x\n1,y\n2,z\n");
        let mut reader = PartitionedReader::open(file.path(), config(2, 100)).unwrap();
        let err = reader.read_partition(ReadMode::Grouped).unwrap_err();
        assert!(matches!(
            err,
            ScanError::TimestampColumnMissing { column } if column == "time"
        ));
    }

    #[test]
    fn test_quoted_fields() {
        let fields = parse_delimited_fields(r#"1,"hello, world","say ""hi""""#);
        assert_eq!(fields, vec!["1", "hello, world", r#"say "hi""#]);
    }
}
