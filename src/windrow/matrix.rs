//! Typed partition matrix
//!
//! A raw block re-projected into four independent rectangular containers
//! (float, integer, text, vector) once column types are known. Row order is
//! identical across containers and identical to the source block, so row `i`
//! of every container refers to the same source row. Projection is a pure
//! transform; type resolution happens once per file and is cached upstream.
//!
//! Cell-level type mismatches are expected statistical noise, not
//! malformation (row width was already validated by the reader): a float
//! cell that fails to parse becomes NaN, an integer cell falls back to a
//! truncated float parse and then 0. Undetermined columns land in the vector
//! container as raw text.

use super::reader::RawBlock;
use super::schema::TypeLayout;

/// Block re-projected into per-type column groups
#[derive(Debug, Clone, Default)]
pub struct TypedMatrix {
    rows: usize,
    floats: Vec<Vec<f64>>,
    ints: Vec<Vec<i64>>,
    texts: Vec<Vec<String>>,
    vectors: Vec<Vec<String>>,
    layout: TypeLayout,
}

impl TypedMatrix {
    /// Project a raw block through a resolved type layout
    pub fn from_block(block: &RawBlock, layout: &TypeLayout) -> Self {
        let rows = block.len();
        let mut floats = Vec::with_capacity(rows);
        let mut ints = Vec::with_capacity(rows);
        let mut texts = Vec::with_capacity(rows);
        let mut vectors = Vec::with_capacity(rows);

        for row in block.rows() {
            floats.push(
                layout
                    .float_cols
                    .iter()
                    .map(|&c| parse_float_cell(&row[c]))
                    .collect(),
            );
            ints.push(
                layout
                    .int_cols
                    .iter()
                    .map(|&c| parse_int_cell(&row[c]))
                    .collect(),
            );
            texts.push(layout.text_cols.iter().map(|&c| row[c].clone()).collect());
            vectors.push(layout.vector_cols.iter().map(|&c| row[c].clone()).collect());
        }

        Self {
            rows,
            floats,
            ints,
            texts,
            vectors,
            layout: layout.clone(),
        }
    }

    /// Number of rows (identical across all four containers)
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn layout(&self) -> &TypeLayout {
        &self.layout
    }

    pub fn float_labels(&self) -> &[String] {
        &self.layout.float_labels
    }

    pub fn int_labels(&self) -> &[String] {
        &self.layout.int_labels
    }

    pub fn text_labels(&self) -> &[String] {
        &self.layout.text_labels
    }

    pub fn vector_labels(&self) -> &[String] {
        &self.layout.vector_labels
    }

    pub fn float_row(&self, row: usize) -> &[f64] {
        &self.floats[row]
    }

    pub fn int_row(&self, row: usize) -> &[i64] {
        &self.ints[row]
    }

    pub fn text_row(&self, row: usize) -> &[String] {
        &self.texts[row]
    }

    pub fn vector_row(&self, row: usize) -> &[String] {
        &self.vectors[row]
    }

    /// Append another matrix's rows after this one's.
    ///
    /// Both matrices must come from the same file, so their layouts match;
    /// this is the merge step that stitches a leftover tail to the next block.
    pub fn stack(&mut self, other: TypedMatrix) {
        debug_assert_eq!(self.layout, other.layout, "stacking mismatched layouts");
        self.rows += other.rows;
        self.floats.extend(other.floats);
        self.ints.extend(other.ints);
        self.texts.extend(other.texts);
        self.vectors.extend(other.vectors);
    }

    /// Copy of the row range `[start, end)` across all containers
    pub fn index_range(&self, start: usize, end: usize) -> TypedMatrix {
        let end = end.min(self.rows);
        let start = start.min(end);
        TypedMatrix {
            rows: end - start,
            floats: self.floats[start..end].to_vec(),
            ints: self.ints[start..end].to_vec(),
            texts: self.texts[start..end].to_vec(),
            vectors: self.vectors[start..end].to_vec(),
            layout: self.layout.clone(),
        }
    }

    /// Copy of the trailing `n` rows
    pub fn tail(&self, n: usize) -> TypedMatrix {
        self.index_range(self.rows.saturating_sub(n), self.rows)
    }
}

fn parse_float_cell(cell: &str) -> f64 {
    cell.parse::<f64>().unwrap_or(f64::NAN)
}

fn parse_int_cell(cell: &str) -> i64 {
    cell.parse::<i64>()
        .unwrap_or_else(|_| cell.parse::<f64>().map(|f| f as i64).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::windrow::schema::{ColumnSchema, ColumnType, TypeLayout, TypeMap};
    use std::collections::HashMap;

    fn layout() -> TypeLayout {
        let schema = ColumnSchema::new(vec![
            "time".to_string(),
            "a".to_string(),
            "name".to_string(),
            "vec".to_string(),
        ]);
        let mut types = HashMap::new();
        types.insert(0, ColumnType::Integer);
        types.insert(1, ColumnType::Float);
        types.insert(2, ColumnType::Text);
        types.insert(3, ColumnType::Vector);
        TypeLayout::build(&schema, &TypeMap::new(types))
    }

    fn block(rows: &[[&str; 4]]) -> RawBlock {
        let mut b = RawBlock::new();
        for row in rows {
            b.push_row(row.iter().map(|s| s.to_string()).collect());
        }
        b
    }

    #[test]
    fn test_projection_preserves_row_order() {
        let b = block(&[
            ["0", "1.5", "x", "[1,2]"],
            ["1", "2.5", "y", "[3,4]"],
            ["2", "3.5", "z", "[5,6]"],
        ]);
        let m = TypedMatrix::from_block(&b, &layout());

        assert_eq!(m.rows(), 3);
        assert_eq!(m.int_row(1), &[1]);
        assert_eq!(m.float_row(1), &[2.5]);
        assert_eq!(m.text_row(1), &["y".to_string()]);
        assert_eq!(m.vector_row(1), &["[3,4]".to_string()]);
        assert_eq!(m.float_labels(), &["a".to_string()]);
    }

    #[test]
    fn test_unparseable_cells_fall_back() {
        let b = block(&[["0", "oops", "x", "[]"], ["1.9", "2.0", "y", "[]"]]);
        let m = TypedMatrix::from_block(&b, &layout());

        assert!(m.float_row(0)[0].is_nan());
        // integer cell "1.9" truncates through the float fallback
        assert_eq!(m.int_row(1), &[1]);
    }

    #[test]
    fn test_stack_appends_rows_in_order() {
        let mut m = TypedMatrix::from_block(&block(&[["0", "0.0", "a", "[]"]]), &layout());
        let n = TypedMatrix::from_block(
            &block(&[["1", "1.0", "b", "[]"], ["2", "2.0", "c", "[]"]]),
            &layout(),
        );
        m.stack(n);

        assert_eq!(m.rows(), 3);
        assert_eq!(m.int_row(0), &[0]);
        assert_eq!(m.int_row(2), &[2]);
    }

    #[test]
    fn test_tail_and_index_range() {
        let m = TypedMatrix::from_block(
            &block(&[
                ["0", "0.0", "a", "[]"],
                ["1", "1.0", "b", "[]"],
                ["2", "2.0", "c", "[]"],
                ["3", "3.0", "d", "[]"],
            ]),
            &layout(),
        );

        let t = m.tail(2);
        assert_eq!(t.rows(), 2);
        assert_eq!(t.int_row(0), &[2]);

        let r = m.index_range(1, 3);
        assert_eq!(r.rows(), 2);
        assert_eq!(r.int_row(0), &[1]);

        // out-of-bounds ranges clamp instead of panicking
        assert_eq!(m.index_range(3, 10).rows(), 1);
    }
}
